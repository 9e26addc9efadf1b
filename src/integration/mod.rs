//! Integration tests
//!
//! Exercise the whole server against fake external tools.

#[cfg(unix)]
pub mod fixtures;

#[cfg(unix)]
mod e2e;
