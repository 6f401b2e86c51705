//! Process supervision
//!
//! Every long-running component (scheduler, email worker, HTTP server) is a
//! [`Worker`]; the [`Service`] starts them together and stops them together.

pub mod service;

pub use service::{Service, Worker};
