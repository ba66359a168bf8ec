//! In-memory pipe filesystem with a grant table.
//!
//! Nodes hold at most [`PIPE_BUF`] bytes.  Grants stand in for the caller
//! memory a real transport would expose: a *source* grant is read by
//! `write_bytes`, a *sink* grant is filled by `read_bytes`.

use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;
use udsd_abi::{IoGrant, PIPE_BUF, StoreError};
use udsd_lib::klog_debug;

use crate::store::{NodeId, NodeMode, NodeStat, PipeStore};

const DEFAULT_MAX_NODES: usize = 1024;

struct PipeNode {
    mode: NodeMode,
    uid: u32,
    gid: u32,
    data: Vec<u8>,
}

impl PipeNode {
    fn new(mode: NodeMode, uid: u32, gid: u32) -> Self {
        Self {
            mode,
            uid,
            gid,
            data: Vec::new(),
        }
    }
}

struct GrantRegion {
    data: Vec<u8>,
    /// Bytes the store has written so far (sink grants only).
    filled: usize,
}

struct MemPipeFsInner {
    nodes: Vec<Option<PipeNode>>,
    max_nodes: usize,
    /// Slot 0 is never used so that `IoGrant::NONE` stays invalid.
    grants: Vec<Option<GrantRegion>>,
    fail_next_io: bool,
}

impl MemPipeFsInner {
    fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_nodes,
            grants: vec![None],
            fail_next_io: false,
        }
    }

    fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    fn alloc_node(&mut self, node: PipeNode) -> Result<NodeId, StoreError> {
        if self.live_nodes() >= self.max_nodes {
            return Err(StoreError::NoSpace);
        }
        if let Some(idx) = self.nodes.iter().position(|n| n.is_none()) {
            self.nodes[idx] = Some(node);
            return Ok(NodeId(idx as u64));
        }
        self.nodes.push(Some(node));
        Ok(NodeId((self.nodes.len() - 1) as u64))
    }

    fn node(&self, id: NodeId) -> Result<&PipeNode, StoreError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(StoreError::NotFound)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut PipeNode, StoreError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(StoreError::NotFound)
    }

    fn grant_mut(&mut self, grant: IoGrant) -> Result<&mut GrantRegion, StoreError> {
        if grant == IoGrant::NONE {
            return Err(StoreError::BadGrant);
        }
        self.grants
            .get_mut(grant.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(StoreError::BadGrant)
    }

    fn take_fault(&mut self) -> Result<(), StoreError> {
        if self.fail_next_io {
            self.fail_next_io = false;
            return Err(StoreError::Io);
        }
        Ok(())
    }

    fn add_grant(&mut self, data: Vec<u8>, filled: usize) -> IoGrant {
        let region = GrantRegion { data, filled };
        if let Some(idx) = self.grants.iter().skip(1).position(|g| g.is_none()) {
            self.grants[idx + 1] = Some(region);
            return IoGrant((idx + 1) as u32);
        }
        self.grants.push(Some(region));
        IoGrant((self.grants.len() - 1) as u32)
    }
}

fn check_range(offset: usize, len: usize) -> Result<usize, StoreError> {
    match offset.checked_add(len) {
        Some(end) if end <= PIPE_BUF => Ok(end),
        _ => Err(StoreError::OutOfRange),
    }
}

pub struct MemPipeFs {
    inner: Mutex<MemPipeFsInner>,
}

impl MemPipeFs {
    pub fn new() -> Self {
        Self::with_max_nodes(DEFAULT_MAX_NODES)
    }

    pub fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            inner: Mutex::new(MemPipeFsInner::new(max_nodes)),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&MemPipeFsInner) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner)
    }

    fn with_inner_mut<R>(&self, f: impl FnOnce(&mut MemPipeFsInner) -> R) -> R {
        let mut inner = self.inner.lock();
        f(&mut inner)
    }

    /// Expose `bytes` for the store to read from.
    pub fn grant_source(&self, bytes: &[u8]) -> IoGrant {
        self.with_inner_mut(|inner| inner.add_grant(bytes.to_vec(), bytes.len()))
    }

    /// Expose an empty region of `len` bytes for the store to fill.
    pub fn grant_sink(&self, len: usize) -> IoGrant {
        self.with_inner_mut(|inner| inner.add_grant(vec![0; len], 0))
    }

    /// Bytes written into a sink grant so far.
    pub fn grant_contents(&self, grant: IoGrant) -> Option<Vec<u8>> {
        self.with_inner_mut(|inner| {
            let region = inner.grant_mut(grant).ok()?;
            Some(region.data[..region.filled].to_vec())
        })
    }

    pub fn revoke(&self, grant: IoGrant) {
        self.with_inner_mut(|inner| {
            if let Some(slot) = inner.grants.get_mut(grant.0 as usize) {
                *slot = None;
            }
        });
    }

    /// Cap the number of live nodes; later creations fail with `NoSpace`.
    pub fn set_node_quota(&self, max_nodes: usize) {
        self.with_inner_mut(|inner| inner.max_nodes = max_nodes);
    }

    /// Make the next `read_bytes` or `write_bytes` fail with `Io`.
    pub fn inject_io_fault(&self) {
        self.with_inner_mut(|inner| inner.fail_next_io = true);
    }

    pub fn live_nodes(&self) -> usize {
        self.with_inner(MemPipeFsInner::live_nodes)
    }

    /// Owner and mode of a live node.
    pub fn stat(&self, node: NodeId) -> Result<NodeStat, StoreError> {
        self.with_inner(|inner| {
            let n = inner.node(node)?;
            Ok(NodeStat {
                node,
                mode: n.mode,
                uid: n.uid,
                gid: n.gid,
                size: n.data.len(),
            })
        })
    }
}

impl Default for MemPipeFs {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeStore for MemPipeFs {
    fn create_node(&self, mode: NodeMode, uid: u32, gid: u32) -> Result<NodeId, StoreError> {
        let node = self.with_inner_mut(|inner| inner.alloc_node(PipeNode::new(mode, uid, gid)))?;
        klog_debug!("pipefs: created {} mode {:o} uid {} gid {}", node, mode.0, uid, gid);
        Ok(node)
    }

    fn remove_node(&self, node: NodeId) -> Result<(), StoreError> {
        self.with_inner_mut(|inner| {
            inner.node(node)?;
            inner.nodes[node.0 as usize] = None;
            Ok(())
        })
    }

    fn read_bytes(
        &self,
        node: NodeId,
        offset: usize,
        grant: IoGrant,
        len: usize,
    ) -> Result<usize, StoreError> {
        self.with_inner_mut(|inner| {
            let end = check_range(offset, len)?;
            inner.take_fault()?;
            let bytes = {
                let src = inner.node(node)?;
                if end > src.data.len() {
                    return Err(StoreError::OutOfRange);
                }
                src.data[offset..end].to_vec()
            };
            let dst = inner.grant_mut(grant)?;
            if len > dst.data.len() {
                return Err(StoreError::BadGrant);
            }
            dst.data[..len].copy_from_slice(&bytes);
            dst.filled = dst.filled.max(len);
            Ok(len)
        })
    }

    fn write_bytes(
        &self,
        node: NodeId,
        offset: usize,
        grant: IoGrant,
        len: usize,
    ) -> Result<usize, StoreError> {
        self.with_inner_mut(|inner| {
            let end = check_range(offset, len)?;
            inner.take_fault()?;
            let bytes = {
                let src = inner.grant_mut(grant)?;
                if len > src.data.len() {
                    return Err(StoreError::BadGrant);
                }
                src.data[..len].to_vec()
            };
            let dst = inner.node_mut(node)?;
            if dst.data.len() < end {
                dst.data.resize(end, 0);
            }
            dst.data[offset..end].copy_from_slice(&bytes);
            Ok(len)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> NodeMode {
        NodeMode::named_pipe(0o777)
    }

    #[test]
    fn test_write_then_read_through_grants() {
        let fs = MemPipeFs::new();
        let node = fs.create_node(pipe(), 10, 20).unwrap();
        let src = fs.grant_source(b"hello world");
        assert_eq!(fs.write_bytes(node, 4, src, 11), Ok(11));

        let sink = fs.grant_sink(5);
        assert_eq!(fs.read_bytes(node, 10, sink, 5), Ok(5));
        assert_eq!(fs.grant_contents(sink).unwrap(), b"world");

        let stat = fs.stat(node).unwrap();
        assert_eq!((stat.uid, stat.gid, stat.size), (10, 20, 15));
        assert!(stat.mode.is_pipe());
    }

    #[test]
    fn test_ranges_past_capacity_are_rejected() {
        let fs = MemPipeFs::new();
        let node = fs.create_node(pipe(), 0, 0).unwrap();
        let src = fs.grant_source(&[1u8; 8]);
        assert_eq!(
            fs.write_bytes(node, PIPE_BUF - 4, src, 8),
            Err(StoreError::OutOfRange)
        );
        let sink = fs.grant_sink(8);
        // Nothing written there yet.
        assert_eq!(fs.read_bytes(node, 0, sink, 8), Err(StoreError::OutOfRange));
    }

    #[test]
    fn test_bad_and_revoked_grants() {
        let fs = MemPipeFs::new();
        let node = fs.create_node(pipe(), 0, 0).unwrap();
        assert_eq!(
            fs.write_bytes(node, 0, IoGrant::NONE, 1),
            Err(StoreError::BadGrant)
        );
        let src = fs.grant_source(b"ab");
        assert_eq!(fs.write_bytes(node, 0, src, 3), Err(StoreError::BadGrant));
        fs.revoke(src);
        assert_eq!(fs.write_bytes(node, 0, src, 1), Err(StoreError::BadGrant));
        assert!(fs.grant_contents(src).is_none());
    }

    #[test]
    fn test_quota_and_removal() {
        let fs = MemPipeFs::with_max_nodes(2);
        let a = fs.create_node(pipe(), 0, 0).unwrap();
        let _b = fs.create_node(pipe(), 0, 0).unwrap();
        assert_eq!(fs.create_node(pipe(), 0, 0), Err(StoreError::NoSpace));
        assert_eq!(fs.remove_node(a), Ok(()));
        assert_eq!(fs.remove_node(a), Err(StoreError::NotFound));
        assert_eq!(fs.live_nodes(), 1);
        // The freed id is reused.
        assert_eq!(fs.create_node(pipe(), 0, 0), Ok(a));
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let fs = MemPipeFs::new();
        let node = fs.create_node(pipe(), 0, 0).unwrap();
        let src = fs.grant_source(b"x");
        fs.inject_io_fault();
        assert_eq!(fs.write_bytes(node, 0, src, 1), Err(StoreError::Io));
        assert_eq!(fs.write_bytes(node, 0, src, 1), Ok(1));
    }
}
