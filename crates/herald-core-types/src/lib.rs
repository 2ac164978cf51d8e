//! Core types shared across Herald facilities
//!
//! This crate provides foundational types used by the error, logging and
//! dispatch facilities:
//!
//! - **Correlation types**: InvocationId, TraceId, Correlation
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{Correlation, InvocationId, TraceId};
