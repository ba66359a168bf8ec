#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod klog;
pub mod testing;

#[doc(hidden)]
pub use paste;

pub use config::{UdsConfig, config_from_cmdline};
pub use klog::{
    KlogLevel, klog_clear_backend, klog_get_level, klog_init, klog_is_enabled,
    klog_register_backend, klog_set_level,
};
