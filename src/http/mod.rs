//! HTTP admission surface around the core limiter.

mod server;
mod service;

pub use server::HttpServer;
pub use service::{router, AppState};
