//! Error codes surfaced to socket callers.
//!
//! Every variant maps onto a POSIX errno through [`UdsError::errno`]; the
//! transport encodes replies with that value.

use core::fmt;

pub const ERRNO_ENOENT: i32 = 2;
pub const ERRNO_EIO: i32 = 5;
pub const ERRNO_EINTR: i32 = 4;
pub const ERRNO_EBADF: i32 = 9;
pub const ERRNO_EINVAL: i32 = 22;
pub const ERRNO_ENFILE: i32 = 23;
pub const ERRNO_ENOTTY: i32 = 25;
pub const ERRNO_ENOSPC: i32 = 28;
pub const ERRNO_EPIPE: i32 = 32;
pub const ERRNO_ENOSYS: i32 = 38;
pub const ERRNO_EOVERFLOW: i32 = 75;
pub const ERRNO_EMSGSIZE: i32 = 90;
pub const ERRNO_EPROTOTYPE: i32 = 91;
pub const ERRNO_EOPNOTSUPP: i32 = 95;
pub const ERRNO_EAFNOSUPPORT: i32 = 97;
pub const ERRNO_EADDRINUSE: i32 = 98;
pub const ERRNO_ECONNRESET: i32 = 104;
pub const ERRNO_EISCONN: i32 = 106;
pub const ERRNO_ENOTCONN: i32 = 107;
pub const ERRNO_ECONNREFUSED: i32 = 111;

/// Failure reported by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// No room for another node (ENOSPC)
    NoSpace,
    /// Node does not exist (ENOENT)
    NotFound,
    /// Grant is unknown, revoked or too small (EINVAL)
    BadGrant,
    /// Offset/length outside the node (EINVAL)
    OutOfRange,
    /// Underlying I/O failure (EIO)
    Io,
}

impl StoreError {
    pub const fn errno(self) -> i32 {
        match self {
            Self::NoSpace => ERRNO_ENOSPC,
            Self::NotFound => ERRNO_ENOENT,
            Self::BadGrant | Self::OutOfRange => ERRNO_EINVAL,
            Self::Io => ERRNO_EIO,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoSpace => "no space for node",
            Self::NotFound => "no such node",
            Self::BadGrant => "bad grant",
            Self::OutOfRange => "range outside node",
            Self::Io => "i/o error",
        };
        f.write_str(s)
    }
}

/// Errors produced by socket operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdsError {
    /// Slot is free, out of range or the control slot
    InvalidHandle,
    /// Descriptor table full (ENFILE)
    OutOfSlots,
    /// No socket bound on the address (ENOENT)
    AddrNotFound,
    /// Address already bound (EADDRINUSE)
    AddrInUse,
    /// Listener backlog full (ECONNREFUSED)
    ConnRefused,
    /// Peer went away (ECONNRESET)
    ConnReset,
    /// No peer (ENOTCONN)
    NotConnected,
    /// Already has a peer (EISCONN)
    AlreadyConnected,
    /// Direction shut down (EPIPE)
    BrokenPipe,
    /// Write exceeds the pipe capacity (EMSGSIZE)
    MessageTooLarge,
    /// Unknown ioctl (ENOTTY)
    BadOperation,
    /// Call cancelled (EINTR)
    Interrupted,
    /// Wrong state or malformed argument (EINVAL)
    InvalidArgument,
    /// Operation not supported by this socket type (EOPNOTSUPP)
    NotSupported,
    /// Address family other than AF_UNIX (EAFNOSUPPORT)
    AfNotSupported,
    /// Socket types of both ends differ (EPROTOTYPE)
    ProtocolType,
    /// Too many descriptors in flight (EOVERFLOW)
    Overflow,
    /// Request cannot be honoured by this implementation (ENOSYS)
    NoSys,
    /// Backing store failure, passed through verbatim
    Store(StoreError),
}

pub type UdsResult<T> = Result<T, UdsError>;

impl UdsError {
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidHandle => ERRNO_EBADF,
            Self::OutOfSlots => ERRNO_ENFILE,
            Self::AddrNotFound => ERRNO_ENOENT,
            Self::AddrInUse => ERRNO_EADDRINUSE,
            Self::ConnRefused => ERRNO_ECONNREFUSED,
            Self::ConnReset => ERRNO_ECONNRESET,
            Self::NotConnected => ERRNO_ENOTCONN,
            Self::AlreadyConnected => ERRNO_EISCONN,
            Self::BrokenPipe => ERRNO_EPIPE,
            Self::MessageTooLarge => ERRNO_EMSGSIZE,
            Self::BadOperation => ERRNO_ENOTTY,
            Self::Interrupted => ERRNO_EINTR,
            Self::InvalidArgument => ERRNO_EINVAL,
            Self::NotSupported => ERRNO_EOPNOTSUPP,
            Self::AfNotSupported => ERRNO_EAFNOSUPPORT,
            Self::ProtocolType => ERRNO_EPROTOTYPE,
            Self::Overflow => ERRNO_EOVERFLOW,
            Self::NoSys => ERRNO_ENOSYS,
            Self::Store(e) => e.errno(),
        }
    }

    /// Negated errno, the encoding used in reply status words.
    #[inline]
    pub const fn status(self) -> i32 {
        -self.errno()
    }
}

impl From<StoreError> for UdsError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl fmt::Display for UdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => f.write_str("invalid socket handle"),
            Self::OutOfSlots => f.write_str("descriptor table full"),
            Self::AddrNotFound => f.write_str("address not found"),
            Self::AddrInUse => f.write_str("address in use"),
            Self::ConnRefused => f.write_str("connection refused"),
            Self::ConnReset => f.write_str("connection reset"),
            Self::NotConnected => f.write_str("not connected"),
            Self::AlreadyConnected => f.write_str("already connected"),
            Self::BrokenPipe => f.write_str("broken pipe"),
            Self::MessageTooLarge => f.write_str("message too large"),
            Self::BadOperation => f.write_str("bad ioctl"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::NotSupported => f.write_str("operation not supported"),
            Self::AfNotSupported => f.write_str("address family not supported"),
            Self::ProtocolType => f.write_str("protocol wrong type for socket"),
            Self::Overflow => f.write_str("ancillary data overflow"),
            Self::NoSys => f.write_str("not implemented"),
            Self::Store(e) => write!(f, "store: {e}"),
        }
    }
}
