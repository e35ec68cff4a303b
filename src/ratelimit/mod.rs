//! Rate limiting logic and state management.

mod limiter;
mod window;

pub use limiter::WindowLimiter;
pub use window::{window_start, WindowState, WindowStatus};
