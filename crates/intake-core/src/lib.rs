//! Configuration loading and shared HTTP client construction.

pub mod config;
pub mod http;
