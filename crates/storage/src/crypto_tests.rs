// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn config(pairs: &[(&str, &str)]) -> ConnectionConfig {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn round_trip_with_passphrase() {
    let secrets = SecretBox::new("correct horse battery staple");
    let original = config(&[("type", "s3"), ("access_key", "AKIA"), ("secret", "shhh")]);
    let sealed = secrets.encrypt(&original).unwrap();
    assert_ne!(sealed, serde_json::to_vec(&original).unwrap());
    assert_eq!(secrets.decrypt(&sealed).unwrap(), original);
}

#[test]
fn plaintext_mode_round_trip() {
    let secrets = SecretBox::new("");
    assert!(secrets.is_plaintext());
    let original = config(&[("type", "local")]);
    let sealed = secrets.encrypt(&original).unwrap();
    // Plaintext mode stores verbatim JSON.
    assert_eq!(sealed, serde_json::to_vec(&original).unwrap());
    assert_eq!(secrets.decrypt(&sealed).unwrap(), original);
}

#[test]
fn wrong_key_fails() {
    let sealed = SecretBox::new("key-one").encrypt(&config(&[("a", "b")])).unwrap();
    let err = SecretBox::new("key-two").decrypt(&sealed).unwrap_err();
    assert!(matches!(err, CryptoError::Decryption));
}

#[test]
fn tampered_ciphertext_fails() {
    let secrets = SecretBox::new("key");
    let mut sealed = secrets.encrypt(&config(&[("a", "b")])).unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;
    assert!(matches!(secrets.decrypt(&sealed).unwrap_err(), CryptoError::Decryption));
}

#[test]
fn short_input_fails() {
    let secrets = SecretBox::new("key");
    assert!(matches!(secrets.decrypt(&[0u8; 5]).unwrap_err(), CryptoError::Decryption));
    assert!(matches!(secrets.decrypt(&[]).unwrap_err(), CryptoError::Decryption));
}

#[test]
fn nonce_is_fresh_per_record() {
    let secrets = SecretBox::new("key");
    let cfg = config(&[("a", "b")]);
    let one = secrets.encrypt(&cfg).unwrap();
    let two = secrets.encrypt(&cfg).unwrap();
    assert_ne!(one, two);
    assert_ne!(one[..12], two[..12]);
}

#[test]
fn plaintext_garbage_fails() {
    let secrets = SecretBox::new("");
    assert!(matches!(secrets.decrypt(b"not json").unwrap_err(), CryptoError::Decryption));
}

proptest! {
    #[test]
    fn round_trip_any_map_any_key(
        pairs in proptest::collection::btree_map("[a-z_]{1,12}", ".*", 0..8),
        passphrase in ".{0,24}",
    ) {
        let map: BTreeMap<String, String> = pairs;
        let cfg: ConnectionConfig = map.into_iter().collect();
        let secrets = SecretBox::new(&passphrase);
        let sealed = secrets.encrypt(&cfg).unwrap();
        prop_assert_eq!(secrets.decrypt(&sealed).unwrap(), cfg);
    }
}
