//! Core fixed-window rate limiter implementation.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Result, TurnstileError};

use super::window::{window_start, WindowState, WindowStatus};

/// A per-identity request throttle using fixed time windows.
///
/// One `(limit, window)` policy applies identically to every identity. Each
/// identity's admitted-request count lives in a window-aligned state entry
/// that resets whenever a request falls into a different window than the one
/// on record.
///
/// This struct is thread-safe and can be shared across multiple tasks. The
/// lookup-and-increment in [`is_allowed`](Self::is_allowed) runs under the
/// map's write lock, so concurrent requests for the same identity can never
/// race past the limit.
#[derive(Debug)]
pub struct WindowLimiter {
    /// Maximum admitted requests per window
    limit: u32,
    /// Window duration in seconds
    window_secs: f64,
    /// Per-identity window state
    states: RwLock<HashMap<String, WindowState>>,
}

impl WindowLimiter {
    /// Create a new limiter enforcing `limit` requests per `window_secs`.
    ///
    /// Fails with [`TurnstileError::Config`] if `limit` is zero or
    /// `window_secs` is not a positive finite number.
    pub fn new(limit: u32, window_secs: f64) -> Result<Self> {
        if limit < 1 {
            return Err(TurnstileError::Config(
                "limit must be a positive integer".to_string(),
            ));
        }
        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(TurnstileError::Config(format!(
                "window duration must be a positive number of seconds, got {}",
                window_secs
            )));
        }

        Ok(Self {
            limit,
            window_secs,
            states: RwLock::new(HashMap::new()),
        })
    }

    /// Decide whether a request from `identity` at `timestamp` is admitted.
    ///
    /// `timestamp` is seconds since an epoch and may carry a fractional
    /// part. Admitted requests increment the identity's counter for the
    /// window containing `timestamp`; rejected requests leave state
    /// untouched and are reported through the `Ok(false)` return value, not
    /// as an error.
    ///
    /// A timestamp whose window differs from the one on record replaces the
    /// state outright, including timestamps earlier than previously seen
    /// ones. Callers must therefore source timestamps from a trusted clock,
    /// not from client input, or an identity can reset its own counter.
    pub fn is_allowed(&self, identity: &str, timestamp: f64) -> Result<bool> {
        Self::validate_identity(identity)?;
        Self::validate_timestamp(timestamp)?;

        let computed_start = window_start(timestamp, self.window_secs);
        let mut states = self.states.write();

        let state = states.entry(identity.to_owned()).or_insert_with(|| {
            debug!(
                identity = %identity,
                window_start = computed_start,
                "Tracking new identity"
            );
            WindowState::new(computed_start)
        });

        // Covers both rollover into a later window and time moving backward:
        // any mismatch discards the old count before this request is judged.
        if state.window_start != computed_start {
            *state = WindowState::new(computed_start);
        }

        if state.count < self.limit {
            state.count += 1;
            trace!(
                identity = %identity,
                count = state.count,
                limit = self.limit,
                "Request admitted"
            );
            Ok(true)
        } else {
            debug!(
                identity = %identity,
                limit = self.limit,
                "Rate limit exceeded"
            );
            Ok(false)
        }
    }

    /// Report `identity`'s standing within the window containing
    /// `timestamp`, without mutating or creating any state.
    ///
    /// An unknown identity, or one whose stored window differs from the
    /// computed one, reports zero requests made.
    pub fn status(&self, identity: &str, timestamp: f64) -> Result<WindowStatus> {
        Self::validate_identity(identity)?;
        Self::validate_timestamp(timestamp)?;

        let computed_start = window_start(timestamp, self.window_secs);
        let states = self.states.read();

        let requests_made = states
            .get(identity)
            .filter(|state| state.window_start == computed_start)
            .map(|state| state.count)
            .unwrap_or(0);

        Ok(WindowStatus {
            window_start: computed_start,
            window_end: computed_start + self.window_secs,
            requests_made,
            requests_remaining: self.limit.saturating_sub(requests_made),
        })
    }

    /// Remove state for every identity whose window ended more than one full
    /// window before the window containing `reference_timestamp`.
    ///
    /// The immediately preceding window is retained to tolerate minor clock
    /// skew and out-of-order calls; the current window is never touched.
    /// Returns the number of entries removed. Skipping cleanup never affects
    /// admission decisions, only memory growth.
    pub fn cleanup(&self, reference_timestamp: f64) -> Result<usize> {
        Self::validate_timestamp(reference_timestamp)?;

        let current_start = window_start(reference_timestamp, self.window_secs);
        let horizon = current_start - self.window_secs;

        let mut states = self.states.write();
        let before = states.len();
        states.retain(|_, state| state.window_start >= horizon);
        let removed = before - states.len();

        if removed > 0 {
            debug!(
                removed = removed,
                remaining = states.len(),
                "Evicted stale window state"
            );
        }

        Ok(removed)
    }

    /// Get the configured per-window request limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Get the configured window duration in seconds.
    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Get the number of identities currently holding state.
    pub fn tracked_identities(&self) -> usize {
        let states = self.states.read();
        states.len()
    }

    /// Drop all per-identity state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        let mut states = self.states.write();
        states.clear();
    }

    fn validate_identity(identity: &str) -> Result<()> {
        if identity.is_empty() {
            return Err(TurnstileError::InvalidArgument(
                "identity must be a non-empty string".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_timestamp(timestamp: f64) -> Result<()> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(TurnstileError::InvalidArgument(format!(
                "timestamp must be a finite, non-negative number of seconds, got {}",
                timestamp
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_limiter_creation() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        assert_eq!(limiter.limit(), 5);
        assert_eq!(limiter.window_secs(), 60.0);
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_rejects_zero_limit() {
        let err = WindowLimiter::new(0, 60.0).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_window_duration() {
        assert!(matches!(
            WindowLimiter::new(5, 0.0).unwrap_err(),
            TurnstileError::Config(_)
        ));
        assert!(matches!(
            WindowLimiter::new(5, -30.0).unwrap_err(),
            TurnstileError::Config(_)
        ));
        assert!(matches!(
            WindowLimiter::new(5, f64::NAN).unwrap_err(),
            TurnstileError::Config(_)
        ));
        assert!(matches!(
            WindowLimiter::new(5, f64::INFINITY).unwrap_err(),
            TurnstileError::Config(_)
        ));
    }

    #[test]
    fn test_first_request_admitted() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        assert!(limiter.is_allowed("user_123", 100.0).unwrap());
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_limit_enforced_within_window() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();

        for i in 0..5 {
            assert!(limiter.is_allowed("user_123", 100.0 + i as f64).unwrap());
        }

        // 6th request in the same window is rejected
        assert!(!limiter.is_allowed("user_123", 110.0).unwrap());
        // Rejections do not consume quota, so the answer stays the same
        assert!(!limiter.is_allowed("user_123", 119.0).unwrap());
    }

    #[test]
    fn test_identities_are_isolated() {
        let limiter = WindowLimiter::new(2, 60.0).unwrap();

        assert!(limiter.is_allowed("alice", 100.0).unwrap());
        assert!(limiter.is_allowed("alice", 101.0).unwrap());
        assert!(!limiter.is_allowed("alice", 102.0).unwrap());

        // Exhausting alice's quota never affects bob at the same timestamps
        assert!(limiter.is_allowed("bob", 102.0).unwrap());
        assert!(limiter.is_allowed("bob", 103.0).unwrap());
    }

    #[test]
    fn test_new_window_resets_count() {
        let limiter = WindowLimiter::new(3, 30.0).unwrap();

        assert!(limiter.is_allowed("u", 60.0).unwrap());
        assert!(limiter.is_allowed("u", 70.0).unwrap());
        assert!(limiter.is_allowed("u", 80.0).unwrap());
        assert!(!limiter.is_allowed("u", 85.0).unwrap());

        // 90.0 opens the window [90, 120)
        assert!(limiter.is_allowed("u", 90.0).unwrap());
    }

    #[test]
    fn test_boundary_timestamp_opens_new_window() {
        let limiter = WindowLimiter::new(2, 60.0).unwrap();

        assert!(limiter.is_allowed("u", 60.0).unwrap());
        assert!(limiter.is_allowed("u", 119.9).unwrap());
        assert!(!limiter.is_allowed("u", 119.99).unwrap());

        // Exactly 120.0 belongs to [120, 180), not to the prior window,
        // even immediately after a rejection
        assert!(limiter.is_allowed("u", 120.0).unwrap());
    }

    #[test]
    fn test_burst_across_boundary_is_expected() {
        // Documented fixed-window limitation: up to 2 * limit admissions can
        // land within an arbitrarily small interval straddling a boundary.
        let limiter = WindowLimiter::new(3, 10.0).unwrap();

        for _ in 0..3 {
            assert!(limiter.is_allowed("u", 9.9).unwrap());
        }
        for _ in 0..3 {
            assert!(limiter.is_allowed("u", 10.0).unwrap());
        }
    }

    #[test]
    fn test_backward_time_replaces_window() {
        let limiter = WindowLimiter::new(3, 30.0).unwrap();

        assert!(limiter.is_allowed("u", 60.0).unwrap());
        assert!(limiter.is_allowed("u", 70.0).unwrap());
        assert!(limiter.is_allowed("u", 80.0).unwrap());
        assert!(!limiter.is_allowed("u", 85.0).unwrap());

        // An earlier timestamp computes a different window start and resets
        // the counter; accepted, documented behavior
        assert!(limiter.is_allowed("u", 30.0).unwrap());
        assert_eq!(limiter.status("u", 30.0).unwrap().requests_made, 1);
    }

    #[test]
    fn test_fractional_window_duration() {
        let limiter = WindowLimiter::new(2, 0.5).unwrap();

        assert!(limiter.is_allowed("u", 1.0).unwrap());
        assert!(limiter.is_allowed("u", 1.4).unwrap());
        assert!(!limiter.is_allowed("u", 1.49).unwrap());
        assert!(limiter.is_allowed("u", 1.5).unwrap());
    }

    #[test]
    fn test_invalid_identity_rejected() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        assert!(matches!(
            limiter.is_allowed("", 10.0).unwrap_err(),
            TurnstileError::InvalidArgument(_)
        ));
        assert!(matches!(
            limiter.status("", 10.0).unwrap_err(),
            TurnstileError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -1.0] {
            assert!(matches!(
                limiter.is_allowed("u", bad).unwrap_err(),
                TurnstileError::InvalidArgument(_)
            ));
            assert!(matches!(
                limiter.status("u", bad).unwrap_err(),
                TurnstileError::InvalidArgument(_)
            ));
            assert!(matches!(
                limiter.cleanup(bad).unwrap_err(),
                TurnstileError::InvalidArgument(_)
            ));
        }
    }

    #[test]
    fn test_status_reports_window_and_quota() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();

        limiter.is_allowed("u", 100.0).unwrap();
        limiter.is_allowed("u", 101.0).unwrap();

        let status = limiter.status("u", 110.0).unwrap();
        assert_eq!(status.window_start, 60.0);
        assert_eq!(status.window_end, 120.0);
        assert_eq!(status.requests_made, 2);
        assert_eq!(status.requests_remaining, 3);
    }

    #[test]
    fn test_status_is_idempotent() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        limiter.is_allowed("u", 100.0).unwrap();

        let first = limiter.status("u", 100.0).unwrap();
        let second = limiter.status("u", 100.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.requests_made, 1);
    }

    #[test]
    fn test_status_never_creates_state() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();

        let status = limiter.status("ghost", 100.0).unwrap();
        assert_eq!(status.requests_made, 0);
        assert_eq!(status.requests_remaining, 5);
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_status_for_stale_window_reports_zero() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        limiter.is_allowed("u", 100.0).unwrap();

        // The stored window is [60, 120); asking about [120, 180) reports
        // a fresh window without touching the stored state
        let status = limiter.status("u", 150.0).unwrap();
        assert_eq!(status.requests_made, 0);
        assert_eq!(limiter.status("u", 110.0).unwrap().requests_made, 1);
    }

    #[test]
    fn test_cleanup_removes_only_stale_entries() {
        let limiter = WindowLimiter::new(5, 30.0).unwrap();

        limiter.is_allowed("ancient", 0.0).unwrap(); // window [0, 30)
        limiter.is_allowed("old", 30.0).unwrap(); // window [30, 60)
        limiter.is_allowed("previous", 60.0).unwrap(); // window [60, 90)
        limiter.is_allowed("current", 90.0).unwrap(); // window [90, 120)

        // Reference 100.0 -> current window [90, 120); entries older than
        // the preceding window [60, 90) are stale
        let removed = limiter.cleanup(100.0).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(limiter.tracked_identities(), 2);

        // The survivors keep their counts
        assert_eq!(limiter.status("previous", 60.0).unwrap().requests_made, 1);
        assert_eq!(limiter.status("current", 100.0).unwrap().requests_made, 1);
    }

    #[test]
    fn test_cleanup_never_removes_current_window() {
        let limiter = WindowLimiter::new(5, 30.0).unwrap();
        limiter.is_allowed("u", 95.0).unwrap();

        assert_eq!(limiter.cleanup(95.0).unwrap(), 0);
        assert_eq!(limiter.cleanup(119.0).unwrap(), 0);
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_cleaned_identity_behaves_brand_new() {
        let limiter = WindowLimiter::new(2, 30.0).unwrap();

        assert!(limiter.is_allowed("u", 0.0).unwrap());
        assert!(limiter.is_allowed("u", 1.0).unwrap());
        assert!(!limiter.is_allowed("u", 2.0).unwrap());

        limiter.cleanup(100.0).unwrap();
        assert_eq!(limiter.tracked_identities(), 0);

        // Fresh start after eviction, same as a never-seen identity
        assert!(limiter.is_allowed("u", 100.0).unwrap());
        assert_eq!(limiter.status("u", 100.0).unwrap().requests_made, 1);
    }

    #[test]
    fn test_clear_drops_all_state() {
        let limiter = WindowLimiter::new(5, 60.0).unwrap();
        limiter.is_allowed("a", 10.0).unwrap();
        limiter.is_allowed("b", 10.0).unwrap();
        assert_eq!(limiter.tracked_identities(), 2);

        limiter.clear();
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_concurrent_requests_admit_exactly_limit() {
        let limiter = Arc::new(WindowLimiter::new(64, 60.0).unwrap());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..32 {
                    if limiter.is_allowed("shared", 30.0).unwrap() {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 64);
    }
}
