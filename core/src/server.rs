//! Driver main loop over an abstract message transport.
//!
//! The transport delivers requests and revive notifications and carries
//! replies back.  Every wake the driver queues is handed to the transport
//! as a revive to schedule, so parked calls finish on a later turn of the
//! loop rather than re-entrantly.

use udsd_abi::SlotId;
use udsd_lib::{klog_debug, klog_info};
use udsd_pipefs::PipeStore;

use crate::ancillary::DescriptorBroker;
use crate::driver::UdsDriver;
use crate::proto::{Dispatch, Reply, Request};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Request(Request),
    /// Revive notification for a slot the driver asked to be revived.
    Revive(SlotId),
}

pub trait Transport {
    /// Next event, or `None` once the transport is shut down.
    fn next_event(&mut self) -> Option<Event>;

    fn send_reply(&mut self, reply: Reply);

    /// Arrange for `Event::Revive(slot)` to be delivered later.
    fn schedule_revive(&mut self, slot: SlotId);
}

/// Serve `transport` until it runs dry.  Returns the number of events
/// handled.
pub fn serve<S, B, T>(driver: &mut UdsDriver<S, B>, transport: &mut T) -> usize
where
    S: PipeStore,
    B: DescriptorBroker,
    T: Transport,
{
    klog_info!("udsd: serving");
    let mut handled = 0;

    while let Some(event) = transport.next_event() {
        handled += 1;
        let reply = match event {
            Event::Request(req) => match driver.handle(req) {
                Dispatch::Reply(reply) => Some(reply),
                Dispatch::Suspended => None,
            },
            Event::Revive(slot) => driver.revive(slot),
        };
        if let Some(reply) = reply {
            transport.send_reply(reply);
        }
        while let Some(slot) = driver.next_wakeup() {
            transport.schedule_revive(slot);
        }
    }

    klog_debug!("udsd: transport closed after {} events", handled);
    handled
}
