//! The socket driver: descriptor table plus its collaborators.
//!
//! Operations are spread over sibling modules as `impl` blocks on
//! [`UdsDriver`]; this module only owns construction and inspection.

use alloc::collections::VecDeque;

use udsd_abi::SlotId;
use udsd_lib::{UdsConfig, klog_info, klog_set_level};
use udsd_pipefs::PipeStore;

use crate::ancillary::{DescriptorBroker, NoPassing};
use crate::table::{SlotTable, UdsFd};

pub struct UdsDriver<S: PipeStore, B: DescriptorBroker = NoPassing> {
    pub(crate) table: SlotTable,
    pub(crate) store: S,
    pub(crate) broker: B,
    /// Slots whose state changed in a way a parked call or selector cares
    /// about, oldest first, without duplicates.
    pub(crate) wakeups: VecDeque<SlotId>,
    pub(crate) config: UdsConfig,
}

impl<S: PipeStore> UdsDriver<S, NoPassing> {
    pub fn without_passing(store: S, config: UdsConfig) -> Self {
        Self::new(store, NoPassing, config)
    }
}

impl<S: PipeStore, B: DescriptorBroker> UdsDriver<S, B> {
    pub fn new(store: S, broker: B, config: UdsConfig) -> Self {
        klog_set_level(config.log_level);
        let config = config.with_slots(config.slots);
        klog_info!(
            "udsd: {} slots, log level {}, tracing {}",
            config.slots,
            config.log_level,
            if config.trace { "on" } else { "off" }
        );
        Self {
            table: SlotTable::new(config.slots),
            store,
            broker,
            wakeups: VecDeque::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn config(&self) -> &UdsConfig {
        &self.config
    }

    /// Read-only view of a slot, free or not.
    pub fn slot(&self, slot: SlotId) -> Option<&UdsFd> {
        self.table.get(slot)
    }

    pub fn in_use_count(&self) -> usize {
        self.table.in_use_count()
    }

    /// True when every slot is free and carries no residual state.
    pub fn is_pristine(&self) -> bool {
        self.table.is_pristine()
    }

    pub fn pending_wakeups(&self) -> usize {
        self.wakeups.len()
    }
}
