//! Atomic counters for the "drop silently, increment counter" data-error
//! cases in the error taxonomy, plus a throttle so the operator gets one log
//! line per counter per minute instead of log spam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct DropCounters {
    pub out_of_order_reports: AtomicU64,
    pub non_finite_coordinates: AtomicU64,
    pub malformed_sbs1_lines: AtomicU64,
    pub malformed_rpc_replies: AtomicU64,
    pub rate_rejections: AtomicU64,
    pub protocol_timeouts: AtomicU64,

    last_logged: Mutex<Option<Instant>>,
}

const LOG_INTERVAL: Duration = Duration::from_secs(60);

impl DropCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump_out_of_order(&self) {
        self.out_of_order_reports.fetch_add(1, Ordering::Relaxed);
        self.maybe_log();
    }

    pub fn bump_non_finite(&self) {
        self.non_finite_coordinates.fetch_add(1, Ordering::Relaxed);
        self.maybe_log();
    }

    pub fn bump_malformed_sbs1(&self) {
        self.malformed_sbs1_lines.fetch_add(1, Ordering::Relaxed);
        self.maybe_log();
    }

    pub fn bump_malformed_rpc(&self) {
        self.malformed_rpc_replies.fetch_add(1, Ordering::Relaxed);
        self.maybe_log();
    }

    pub fn bump_rate_rejection(&self) {
        self.rate_rejections.fetch_add(1, Ordering::Relaxed);
        self.maybe_log();
    }

    pub fn bump_protocol_timeout(&self) {
        self.protocol_timeouts.fetch_add(1, Ordering::Relaxed);
        self.maybe_log();
    }

    fn maybe_log(&self) {
        let mut last = self.last_logged.lock().unwrap();
        let now = Instant::now();
        if last.map(|t| now.duration_since(t) >= LOG_INTERVAL).unwrap_or(true) {
            *last = Some(now);
            tracing::warn!(
                out_of_order = self.out_of_order_reports.load(Ordering::Relaxed),
                non_finite = self.non_finite_coordinates.load(Ordering::Relaxed),
                malformed_sbs1 = self.malformed_sbs1_lines.load(Ordering::Relaxed),
                malformed_rpc = self.malformed_rpc_replies.load(Ordering::Relaxed),
                rate_rejections = self.rate_rejections.load(Ordering::Relaxed),
                protocol_timeouts = self.protocol_timeouts.load(Ordering::Relaxed),
                "data/protocol drop counters"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let c = DropCounters::new();
        assert_eq!(c.out_of_order_reports.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn bump_increments() {
        let c = DropCounters::new();
        c.bump_non_finite();
        c.bump_non_finite();
        assert_eq!(c.non_finite_coordinates.load(Ordering::Relaxed), 2);
    }
}
