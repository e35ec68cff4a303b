//! Window assignment and per-identity window state.

use serde::Serialize;

/// Compute the start of the fixed window containing `timestamp`.
///
/// Windows are half-open intervals `[start, start + window_secs)` aligned to
/// multiples of the window duration, so a timestamp landing exactly on a
/// boundary belongs to the window that begins at that instant.
pub fn window_start(timestamp: f64, window_secs: f64) -> f64 {
    (timestamp / window_secs).floor() * window_secs
}

/// Counter state for a single identity within a single fixed window.
///
/// The state is replaced wholesale whenever a request's computed window
/// start differs from the stored one; it never carries over between windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    /// Start of the window this count belongs to
    pub window_start: f64,
    /// Admitted requests recorded since `window_start`
    pub count: u32,
}

impl WindowState {
    /// Create an empty state for the window starting at `window_start`.
    pub fn new(window_start: f64) -> Self {
        Self {
            window_start,
            count: 0,
        }
    }
}

/// Read-only snapshot of an identity's standing within a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStatus {
    /// Start of the window containing the queried timestamp
    pub window_start: f64,
    /// End of that window (`window_start + window_secs`)
    pub window_end: f64,
    /// Admitted requests recorded in that window
    pub requests_made: u32,
    /// Admissions left before the limit is reached
    pub requests_remaining: u32,
}
