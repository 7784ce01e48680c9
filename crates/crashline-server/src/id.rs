//! Server identity
//!
//! Identifiers look like `3fa85f64-1`: eight lowercase hex characters
//! followed by a sequence number that increments with every server
//! started in this process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a server instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerId {
    value: String,
    sequence: u64,
}

impl ServerId {
    /// Assigns the identity of the next server instance.
    pub fn next() -> Self {
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let random = Uuid::new_v4().simple().to_string();
        Self {
            value: format!("{}-{sequence}", &random[..8]),
            sequence,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Position of this instance among servers started in the process.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let id = ServerId::next();
        let (prefix, sequence) = id.as_str().split_once('-').unwrap();
        assert_eq!(prefix.len(), 8);
        assert!(prefix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(sequence, id.sequence().to_string());
    }

    #[test]
    fn test_sequence_increments() {
        let first = ServerId::next();
        let second = ServerId::next();
        assert!(second.sequence() > first.sequence());
        assert_ne!(first, second);
    }

    #[test]
    fn test_display_matches_as_str() {
        let id = ServerId::next();
        assert_eq!(id.to_string(), id.as_str());
    }
}
