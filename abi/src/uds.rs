//! Unix-domain socket ABI types: limits, identities, addresses and flags.

use core::fmt;

use bitflags::bitflags;

// =============================================================================
// Limits
// =============================================================================

/// Number of descriptor slots, including the control slot 0.
pub const NR_FDS: usize = 256;

/// Capacity of the pipe buffer behind every socket.  A single write never
/// exceeds this and is never split.
pub const PIPE_BUF: usize = 32768;

/// Upper bound on a listening socket's backlog.
pub const UDS_SOMAXCONN: usize = 64;

/// Maximum number of descriptors in flight to one socket.
pub const OPEN_MAX: usize = 255;

/// Size of `sun_path`.
pub const UNIX_PATH_MAX: usize = 104;

/// Address family: local (Unix-domain) sockets.
pub const AF_UNIX: u16 = 1;
/// Address family: unspecified.
pub const AF_UNSPEC: u16 = 0;

/// Raw socket type values as carried by the set-type ioctl.
pub const SOCK_STREAM: i32 = 1;
pub const SOCK_DGRAM: i32 = 2;
pub const SOCK_SEQPACKET: i32 = 5;

/// `shutdown(2)` directions.
pub const SHUT_RD: i32 = 0;
pub const SHUT_WR: i32 = 1;
pub const SHUT_RDWR: i32 = 2;

// =============================================================================
// Identities
// =============================================================================

/// Index of a socket descriptor in the driver's table.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SlotId(pub usize);

impl SlotId {
    /// Slot 0 belongs to the control device that open requests address.
    pub const CONTROL: Self = Self(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_control(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uds{}", self.0)
    }
}

/// Process endpoint a request came from and a reply is addressed to.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Endpoint(pub i32);

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep:{}", self.0)
    }
}

/// Caller-supplied memory region the backing store copies to or from.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct IoGrant(pub u32);

impl IoGrant {
    pub const NONE: Self = Self(0);
}

/// Process credentials, as returned by `SO_PEERCRED`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Ucred {
    pub pid: i32,
    pub uid: u32,
    pub gid: u32,
}

/// Identity attached to every request.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Caller {
    pub endpoint: Endpoint,
    pub cred: Ucred,
}

impl Caller {
    pub const fn new(endpoint: Endpoint, cred: Ucred) -> Self {
        Self { endpoint, cred }
    }
}

// =============================================================================
// Socket types
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SockType {
    Stream,
    Dgram,
    SeqPacket,
}

impl SockType {
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            SOCK_STREAM => Some(Self::Stream),
            SOCK_DGRAM => Some(Self::Dgram),
            SOCK_SEQPACKET => Some(Self::SeqPacket),
            _ => None,
        }
    }

    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Stream => SOCK_STREAM,
            Self::Dgram => SOCK_DGRAM,
            Self::SeqPacket => SOCK_SEQPACKET,
        }
    }

    /// Stream and seqpacket sockets require a peer link.
    #[inline]
    pub const fn is_connection_oriented(self) -> bool {
        matches!(self, Self::Stream | Self::SeqPacket)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShutdownHow {
    Read,
    Write,
    Both,
}

impl ShutdownHow {
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            SHUT_RD => Some(Self::Read),
            SHUT_WR => Some(Self::Write),
            SHUT_RDWR => Some(Self::Both),
            _ => None,
        }
    }

    /// Mode bits removed by this shutdown.
    pub const fn cleared(self) -> SockMode {
        match self {
            Self::Read => SockMode::READ,
            Self::Write => SockMode::WRITE,
            Self::Both => SockMode::READ.union(SockMode::WRITE),
        }
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Unix-domain socket address, laid out like POSIX `sockaddr_un`.
///
/// Paths are NUL-padded; equality compares at most [`UNIX_PATH_MAX`] bytes,
/// stopping at the first NUL.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SockAddrUn {
    pub family: u16,
    pub path: [u8; UNIX_PATH_MAX],
}

impl SockAddrUn {
    /// An all-zero address, returned for unbound sockets.
    pub const fn unspecified() -> Self {
        Self {
            family: AF_UNSPEC,
            path: [0; UNIX_PATH_MAX],
        }
    }

    /// Build an `AF_UNIX` address.  Returns `None` if `path` does not fit.
    pub fn new(path: &[u8]) -> Option<Self> {
        Self::with_family(AF_UNIX, path)
    }

    pub fn with_family(family: u16, path: &[u8]) -> Option<Self> {
        if path.len() > UNIX_PATH_MAX {
            return None;
        }
        let mut addr = Self::unspecified();
        addr.family = family;
        addr.path[..path.len()].copy_from_slice(path);
        Some(addr)
    }

    /// Path bytes up to (excluding) the first NUL.
    pub fn path_bytes(&self) -> &[u8] {
        let end = self.path.iter().position(|&b| b == 0).unwrap_or(UNIX_PATH_MAX);
        &self.path[..end]
    }

    #[inline]
    pub fn is_unix(&self) -> bool {
        self.family == AF_UNIX
    }

    #[inline]
    pub fn has_path(&self) -> bool {
        self.path[0] != 0
    }
}

impl PartialEq for SockAddrUn {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.path_bytes() == other.path_bytes()
    }
}

impl Eq for SockAddrUn {}

impl fmt::Debug for SockAddrUn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SockAddrUn")
            .field("family", &self.family)
            .field("path", &PathDisplay(self.path_bytes()))
            .finish()
    }
}

impl fmt::Display for SockAddrUn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_unix() {
            return write!(f, "(unnamed)");
        }
        write!(f, "{}", PathDisplay(self.path_bytes()))
    }
}

struct PathDisplay<'a>(&'a [u8]);

impl fmt::Debug for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Flags
// =============================================================================

bitflags! {
    /// Directions a socket may still be used in; `shutdown(2)` clears bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SockMode: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
    }
}

impl Default for SockMode {
    fn default() -> Self {
        Self::READ | Self::WRITE
    }
}

bitflags! {
    /// Readiness classes for `select(2)`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SelectOps: u32 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
    }
}

impl Default for SelectOps {
    fn default() -> Self {
        Self::empty()
    }
}
