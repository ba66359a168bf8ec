//! Backing-store abstraction for socket buffers.
//!
//! Every socket owns one named-pipe node.  The driver addresses bytes inside
//! that node by offset and moves them to or from a caller-supplied region
//! named by an [`IoGrant`].  The store never interprets socket state.

use core::fmt;

use udsd_abi::{IoGrant, StoreError};

/// Identifier for a node within a store.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Unix file mode of a node: type bits plus permissions.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMode(pub u16);

impl NodeMode {
    pub const S_IFMT: u16 = 0o170000;
    pub const S_IFIFO: u16 = 0o010000;

    /// A named pipe with the given permission bits.
    pub const fn named_pipe(perms: u16) -> Self {
        Self(Self::S_IFIFO | (perms & 0o7777))
    }

    #[inline]
    pub const fn is_pipe(self) -> bool {
        self.0 & Self::S_IFMT == Self::S_IFIFO
    }

    #[inline]
    pub const fn perms(self) -> u16 {
        self.0 & 0o7777
    }
}

/// Metadata about a live node, as reported by stores that can inspect one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    pub node: NodeId,
    pub mode: NodeMode,
    pub uid: u32,
    pub gid: u32,
    /// Highest byte offset ever written.
    pub size: usize,
}

/// Byte storage behind socket buffers.
///
/// All operations are synchronous and either complete or fail; there is no
/// partial-failure state the caller has to unwind.
pub trait PipeStore: Send + Sync {
    fn create_node(&self, mode: NodeMode, uid: u32, gid: u32) -> Result<NodeId, StoreError>;

    fn remove_node(&self, node: NodeId) -> Result<(), StoreError>;

    /// Copy `len` bytes at `offset` of `node` into the region named by
    /// `grant`.  Returns the number of bytes copied.
    fn read_bytes(
        &self,
        node: NodeId,
        offset: usize,
        grant: IoGrant,
        len: usize,
    ) -> Result<usize, StoreError>;

    /// Copy `len` bytes from the region named by `grant` into `node` at
    /// `offset`.  Returns the number of bytes copied.
    fn write_bytes(
        &self,
        node: NodeId,
        offset: usize,
        grant: IoGrant,
        len: usize,
    ) -> Result<usize, StoreError>;
}
