#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod ancillary;
mod cancel;
mod dgram;
mod dispatch;
pub mod driver;
mod lifecycle;
pub mod proto;
mod revive;
mod select;
pub mod server;
mod stream;
pub mod table;
mod transfer;

#[cfg(test)]
mod testkit;

#[cfg(test)]
mod dgram_tests;
#[cfg(test)]
mod lifecycle_tests;

pub use ancillary::{ControlMsg, DescriptorBroker, FdRef, MemBroker, NoPassing};
pub use driver::UdsDriver;
pub use proto::{Dispatch, Ioctl, Operation, Reply, ReplyValue, Request};
pub use server::{Event, Transport, serve};
pub use table::{CallKind, SlotState, Suspended, UdsFd};
