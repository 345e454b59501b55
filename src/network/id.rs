// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Identifiers used by the interception registry

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque id of one logical request, stable across its redirect chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterceptionId(String);

impl InterceptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterceptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterceptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InterceptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Monotonic id source, scoped to one registry
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    /// Mint the next id. Ids are never handed out twice.
    pub fn mint(&mut self) -> InterceptionId {
        self.next += 1;
        InterceptionId(format!("{}{}", self.prefix, self.next))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new("")
    }
}

static NEXT_REQUEST_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of one transport request object.
///
/// A request keeps its key across redirect legs; that is what lets the
/// registry hand the follow-up leg the same interception id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey(u64);

impl RequestKey {
    /// Allocate a fresh, process-unique key
    pub fn next() -> Self {
        Self(NEXT_REQUEST_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.mint().as_str(), "1");
        assert_eq!(ids.mint().as_str(), "2");
    }

    #[test]
    fn test_id_prefix() {
        let mut ids = IdGenerator::new("id-");
        assert_eq!(ids.mint(), InterceptionId::from("id-1"));
    }

    #[test]
    fn test_request_keys_unique() {
        let a = RequestKey::next();
        let b = RequestKey::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }
}
