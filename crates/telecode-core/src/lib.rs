//! Core domain + application logic for telecode (Rust port).
//!
//! This crate is intentionally runtime-light. The actual child-process work
//! lives behind the `EnginePort` trait, implemented in `telecode-engine`.

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod sessions;

pub use errors::{Error, Result};
