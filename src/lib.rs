//! Turnstile - Fixed-Window Request Throttle
//!
//! This crate implements a per-identity request throttle using the fixed
//! window algorithm: a configured number of requests is admitted per aligned
//! time window, and everything beyond that is rejected until the next window
//! begins. The core limiter is a plain in-process component driven entirely
//! by caller-supplied timestamps; a thin HTTP surface wires it into a
//! request pipeline.

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
