//! Error type definitions for the channel validation engine
//!
//! This module defines the hierarchical error system used throughout the
//! crate. Only input-invalid errors (spec error kind 1) ever propagate to a
//! caller as `Err`; transient probe failures are reported as `Ok(false)` and
//! orchestrator/persistence failures are recorded on the task record instead
//! of being raised.

pub mod types;

pub use types::*;
