//! # Order Numbers
//!
//! Human-readable, unique order numbers: `ORD-20250301143005-000042`.
//!
//! ```text
//!   prefix    timestamp (UTC)     sequence
//!   ──┬──   ───────┬────────    ───┬───
//!    ORD  - 20250301143005   -  000042
//! ```
//!
//! The sequence is a process-wide atomic counter, so numbers handed out
//! within one process never repeat. Across restarts the counter starts
//! from a clock-derived offset; the UNIQUE constraint on
//! `orders.order_number` catches the rare remaining collision and the
//! checkout service asks for another number.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Sequence values wrap at this modulus (six digits).
const SEQUENCE_MODULUS: u64 = 1_000_000;

/// Generates order numbers for one store.
#[derive(Debug)]
pub struct OrderNumberGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl OrderNumberGenerator {
    /// Creates a generator whose counter starts at a clock-derived offset.
    pub fn new(prefix: impl Into<String>) -> Self {
        let start = u64::from(Utc::now().timestamp_subsec_micros()) % SEQUENCE_MODULUS;
        Self::with_start(prefix, start)
    }

    /// Creates a generator with an explicit first sequence value.
    pub fn with_start(prefix: impl Into<String>, start: u64) -> Self {
        OrderNumberGenerator {
            prefix: prefix.into(),
            sequence: AtomicU64::new(start),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the next order number stamped with `now`.
    ///
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use meridian_core::order_number::OrderNumberGenerator;
    ///
    /// let gen = OrderNumberGenerator::with_start("ORD", 41);
    /// let now = Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 5).unwrap();
    /// assert_eq!(gen.next_at(now), "ORD-20250301143005-000041");
    /// assert_eq!(gen.next_at(now), "ORD-20250301143005-000042");
    /// ```
    pub fn next_at(&self, now: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) % SEQUENCE_MODULUS;
        format!("{}-{}-{:06}", self.prefix, now.format("%Y%m%d%H%M%S"), seq)
    }

    /// Returns the next order number stamped with the current time.
    pub fn next(&self) -> String {
        self.next_at(Utc::now())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_format() {
        let gen = OrderNumberGenerator::with_start("SHOP", 7);
        let number = gen.next();
        assert!(number.starts_with("SHOP-"));
        assert!(number.ends_with("-000007"));
        // SHOP- + 14 digits + - + 6 digits
        assert_eq!(number.len(), 5 + 14 + 1 + 6);
    }

    #[test]
    fn test_sequence_wraps_at_six_digits() {
        let gen = OrderNumberGenerator::with_start("ORD", SEQUENCE_MODULUS - 1);
        let now = Utc::now();
        assert!(gen.next_at(now).ends_with("-999999"));
        assert!(gen.next_at(now).ends_with("-000000"));
    }

    #[test]
    fn test_ten_thousand_concurrent_numbers_unique() {
        // Same timestamp for every call so only the sequence differentiates
        let gen = Arc::new(OrderNumberGenerator::new("ORD"));
        let now = Utc::now();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let gen = Arc::clone(&gen);
                thread::spawn(move || (0..1_000).map(|_| gen.next_at(now)).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(all.insert(number), "duplicate order number");
            }
        }
        assert_eq!(all.len(), 10_000);
    }
}
