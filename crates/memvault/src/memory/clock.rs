//! Per-process monotonic timestamp source
//!
//! `created_at` values must be non-decreasing in insertion order even when
//! many store requests race. A raw `Utc::now()` cannot promise that (NTP
//! steps, coarse clock granularity), so readings are clamped: a call that
//! would not advance past the previous one gets the previous value plus one
//! microsecond.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Strictly increasing wall-clock timestamps.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    /// Create a clock starting at the current wall time
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Utc::now()),
        }
    }

    /// Create a clock that will never emit a value at or before `floor`.
    /// Used at startup so timestamps stay ahead of every stored record.
    pub fn starting_after(floor: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            last: Mutex::new(now.max(floor)),
        }
    }

    /// Next timestamp; strictly greater than every earlier return value.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().expect("clock mutex poisoned");
        let mut now = Utc::now();
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
