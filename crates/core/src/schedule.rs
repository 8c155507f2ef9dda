// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron schedule parsing.
//!
//! Tasks carry standard 5-field cron expressions (minute hour day month
//! weekday, UTC). The `cron` crate parses 6/7-field expressions with a
//! leading seconds field, so a `0` seconds field is prepended here.

use cron::Schedule;
use std::str::FromStr;

/// A cron expression that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cron expression {expr:?}: {reason}")]
pub struct InvalidSchedule {
    pub expr: String,
    pub reason: String,
}

/// Parse a standard 5-field cron expression.
pub fn parse_schedule(expr: &str) -> Result<Schedule, InvalidSchedule> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(InvalidSchedule {
            expr: expr.to_string(),
            reason: format!("expected 5 fields, got {fields}"),
        });
    }
    let with_seconds = format!("0 {}", expr.trim());
    Schedule::from_str(&with_seconds).map_err(|e| InvalidSchedule {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
