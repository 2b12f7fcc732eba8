//! Data bus implementations.

use crossbeam_channel::{Receiver, Sender};

use marlin_core::{DataBus, Publication};

/// Forwards every publication into an unbounded channel.
///
/// Never blocks the simulation thread. Publications are dropped once the
/// receiving side is gone.
#[derive(Clone, Debug)]
pub struct ChannelBus {
    tx: Sender<Publication>,
}

impl ChannelBus {
    /// Create a bus and the receiver subscribers read from.
    pub fn channel() -> (Self, Receiver<Publication>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl DataBus for ChannelBus {
    fn publish(&self, publication: Publication) {
        let _ = self.tx.send(publication);
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBus;

impl DataBus for NullBus {
    fn publish(&self, _publication: Publication) {}
}
