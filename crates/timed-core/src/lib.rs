//! Core types and trait definitions for Timed.
//!
//! Employment intervals and their point-in-time resolution, the access policy
//! that scopes every request, and the store abstraction. This crate is free
//! of HTTP and database dependencies.

pub mod access;
pub mod assignment;
pub mod error;
pub mod interval;
pub mod principal;
pub mod record;
pub mod resolver;
pub mod store;

pub use error::{Error, Result};
