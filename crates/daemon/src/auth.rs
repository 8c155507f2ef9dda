// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static single-credential gate.
//!
//! The HTTP transport (external) asks this module to verify Basic-auth
//! pairs. Comparison happens over SHA-256 digests so the check is
//! constant-time in both length and content. With no credentials
//! configured the gate is disabled; one-sided configuration is rejected
//! at config validation.

use crate::config::AuthConfig;
use sha2::{Digest, Sha256};

/// `WWW-Authenticate` header value for 401 responses.
pub const CHALLENGE: &str = "Basic realm=\"Login Required\"";

type Fingerprint = [u8; 32];

fn fingerprint(value: &str) -> Fingerprint {
    Sha256::digest(value.as_bytes()).into()
}

/// Constant-time equality over fixed-length digests.
fn fingerprint_eq(a: &Fingerprint, b: &Fingerprint) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub enum AuthGate {
    /// No credentials configured: every request passes.
    Disabled,
    Enabled { username: Fingerprint, password: Fingerprint },
}

impl AuthGate {
    pub fn from_config(auth: &AuthConfig) -> Self {
        match (&auth.username, &auth.password) {
            (Some(username), Some(password)) => AuthGate::Enabled {
                username: fingerprint(username),
                password: fingerprint(password),
            },
            _ => AuthGate::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, AuthGate::Enabled { .. })
    }

    /// Verify a presented credential pair. Always evaluates both digests
    /// so a username mismatch costs the same as a password mismatch.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self {
            AuthGate::Disabled => true,
            AuthGate::Enabled { username: want_user, password: want_pass } => {
                let user_ok = fingerprint_eq(&fingerprint(username), want_user);
                let pass_ok = fingerprint_eq(&fingerprint(password), want_pass);
                user_ok & pass_ok
            }
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
