//! Events emitted by the reader monitor

use crate::roster::{ReaderId, ReaderRoster};

/// A classified reader transition.
///
/// Events are delivered in order on a single channel. A
/// [`MonitorEvent::ReaderListChanged`] always precedes any card event whose
/// [`ReaderId`] belongs to the roster it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A card was inserted into a reader
    CardInserted(ReaderId),
    /// A card was removed from a reader, or the reader became unavailable
    CardRemoved(ReaderId),
    /// Readers were added or removed; carries the rebuilt roster
    ReaderListChanged(ReaderRoster),
}

impl MonitorEvent {
    /// Reader the event refers to, if it is a card event
    pub const fn reader(&self) -> Option<ReaderId> {
        match self {
            Self::CardInserted(id) | Self::CardRemoved(id) => Some(*id),
            Self::ReaderListChanged(_) => None,
        }
    }
}
