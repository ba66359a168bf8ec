//! Driver logging subsystem.
//!
//! All log output funnels through a single **backend** function.  Until an
//! embedder registers one, output is discarded, so the driver core can log
//! freely on hosts and in tests without any sink configured.
//!
//! # Backend contract
//!
//! The backend receives the pre-formatted arguments for a **single log line**
//! and is responsible for appending the trailing newline.  Callers never
//! include one in their format string.
//!
//! # Registration
//!
//! ```ignore
//! udsd_lib::klog::klog_register_backend(my_backend_fn);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::RwLock;

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl KlogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => KlogLevel::Error,
            1 => KlogLevel::Warn,
            2 => KlogLevel::Info,
            3 => KlogLevel::Debug,
            _ => KlogLevel::Trace,
        }
    }

    /// Parse a level name as written on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        const NAMES: [(&str, KlogLevel); 5] = [
            ("error", KlogLevel::Error),
            ("warn", KlogLevel::Warn),
            ("info", KlogLevel::Info),
            ("debug", KlogLevel::Debug),
            ("trace", KlogLevel::Trace),
        ];
        NAMES
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map(|&(_, level)| level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KlogLevel::Error => "error",
            KlogLevel::Warn => "warn",
            KlogLevel::Info => "info",
            KlogLevel::Debug => "debug",
            KlogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for KlogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(KlogLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: KlogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// Signature of a klog backend.
///
/// The backend must write the formatted text **and** a trailing newline in
/// one go so that lines from different callers do not interleave.
pub type KlogBackend = fn(KlogLevel, fmt::Arguments<'_>);

static BACKEND: RwLock<Option<KlogBackend>> = RwLock::new(None);

#[inline]
fn dispatch(level: KlogLevel, args: fmt::Arguments<'_>) {
    let backend = *BACKEND.read();
    if let Some(backend) = backend {
        backend(level, args);
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Register the backend all subsequent log lines go through.
pub fn klog_register_backend(backend: KlogBackend) {
    *BACKEND.write() = Some(backend);
}

/// Drop the registered backend; output is discarded again.
pub fn klog_clear_backend() {
    *BACKEND.write() = None;
}

/// Reset the level to its default.
pub fn klog_init() {
    CURRENT_LEVEL.store(KlogLevel::Info as u8, Ordering::Relaxed);
}

pub fn klog_set_level(level: KlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn klog_get_level() -> KlogLevel {
    KlogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

pub fn klog_is_enabled(level: KlogLevel) -> bool {
    is_enabled(level)
}

/// Emit a formatted log line at the given level.
pub fn log_args(level: KlogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    dispatch(level, args);
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::klog::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! klog_error {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_info {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_trace {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Trace, ::core::format_args!($($arg)*))
    };
}
