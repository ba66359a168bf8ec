#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod memfs;
pub mod store;

#[cfg(test)]
extern crate std;

pub use memfs::MemPipeFs;
pub use store::{NodeId, NodeMode, NodeStat, PipeStore};
