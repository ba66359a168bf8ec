//! udsd driver/transport ABI types
//!
//! This crate provides the canonical definitions for everything shared between
//! the socket driver core, its backing store and the transport that carries
//! requests in and replies out. Having a single source of truth eliminates:
//! - Duplicate limit constants between driver and store
//! - Error-code mismatches between driver and callers
//! - Ad-hoc integer encodings for socket types and ioctl commands

#![no_std]
#![forbid(unsafe_code)]

pub mod error;
pub mod ioctl;
pub mod uds;

#[cfg(test)]
extern crate std;

pub use error::*;
pub use ioctl::IoctlCode;
pub use uds::*;
