//! Receipt-time ID Generator
//!
//! Snowflake-style identifiers for notifications the server delivered
//! without an id. Layout: 42 bits of milliseconds since the store epoch,
//! 22 bits of sequence. IDs are strictly increasing within one generator
//! even when the wall clock stalls or steps backwards.

use std::time::{SystemTime, UNIX_EPOCH};

/// Store epoch (2024-01-01T00:00:00.000Z)
const STORE_EPOCH: u64 = 1704067200000;

const SEQUENCE_BITS: u64 = 22;

/// Monotonic receipt-time ID generator
#[derive(Debug, Default)]
pub struct ReceiptIdGenerator {
    last: u64,
}

impl ReceiptIdGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Generate the next ID
    pub fn generate(&mut self) -> u64 {
        self.generate_at(current_timestamp())
    }

    /// Generate an ID for a given wall-clock millisecond timestamp
    pub fn generate_at(&mut self, timestamp_ms: u64) -> u64 {
        let candidate = timestamp_ms.saturating_sub(STORE_EPOCH) << SEQUENCE_BITS;
        let id = if candidate > self.last {
            candidate
        } else {
            self.last + 1
        };
        self.last = id;
        id
    }
}

/// Extract the millisecond timestamp from a receipt ID
pub fn extract_timestamp(id: u64) -> u64 {
    (id >> SEQUENCE_BITS) + STORE_EPOCH
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(STORE_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        let mut gen = ReceiptIdGenerator::new();
        let id1 = gen.generate();
        let id2 = gen.generate();
        assert!(id2 > id1);
    }

    #[test]
    fn test_monotonic_when_clock_steps_back() {
        let mut gen = ReceiptIdGenerator::new();
        let id1 = gen.generate_at(STORE_EPOCH + 5_000);
        let id2 = gen.generate_at(STORE_EPOCH + 1_000);
        let id3 = gen.generate_at(STORE_EPOCH + 1_000);
        assert!(id1 < id2 && id2 < id3);
    }

    #[test]
    fn test_extract_timestamp() {
        let mut gen = ReceiptIdGenerator::new();
        let id = gen.generate_at(STORE_EPOCH + 42_000);
        assert_eq!(extract_timestamp(id), STORE_EPOCH + 42_000);
    }
}
