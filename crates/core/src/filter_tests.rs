// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

#[test]
fn empty_set_includes_everything() {
    let set = FilterSet::default();
    assert!(set.includes("anything/at/all.txt"));
}

#[test]
fn first_match_wins() {
    let set = FilterSet::parse(&["+ docs/keep.txt", "- docs", "+ docs/other.txt"]);
    assert!(set.includes("docs/keep.txt"));
    assert!(!set.includes("docs/other.txt"));
    assert!(!set.includes("docs/readme.md"));
}

#[parameterized(
    exact = { "tmp", "tmp", false },
    child = { "tmp", "tmp/a.txt", false },
    deep_child = { "tmp", "tmp/a/b/c", false },
    sibling_prefix = { "tmp", "tmpfile", true },
    unrelated = { "tmp", "src/main.rs", true },
)]
fn exclude_is_segment_aware(pattern: &str, path: &str, included: bool) {
    let set = FilterSet::parse(&[format!("- {pattern}")]);
    assert_eq!(set.includes(path), included, "pattern={pattern} path={path}");
}

#[test]
fn trailing_slash_matches_contents_only() {
    let set = FilterSet::parse(&["- cache/"]);
    assert!(set.includes("cache"));
    assert!(!set.includes("cache/blob.bin"));
}

#[test]
fn bare_pattern_is_include() {
    let rule = FilterRule::parse("src").unwrap();
    assert_eq!(rule.action, FilterAction::Include);
    assert_eq!(rule.pattern, "src");
}

#[test]
fn comments_and_blanks_are_dropped() {
    let set = FilterSet::parse(&["# a comment", "", "   ", "- secret"]);
    assert_eq!(set.rules().len(), 1);
}

#[test]
fn leading_slashes_are_normalized() {
    let set = FilterSet::parse(&["- /logs"]);
    assert!(!set.includes("/logs/today.log"));
    assert!(!set.includes("logs/today.log"));
}

proptest! {
    #[test]
    fn default_include_for_unmatched(path in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
        let set = FilterSet::parse(&["- zzzz-never-matches"]);
        prop_assert!(set.includes(&path));
    }

    #[test]
    fn exclude_rule_always_excludes_own_pattern(seg in "[a-z]{1,10}") {
        let set = FilterSet::parse(&[format!("- {seg}")]);
        prop_assert!(!set.includes(&seg));
        let child = format!("{}/child", seg);
        prop_assert!(!set.includes(&child));
    }
}
