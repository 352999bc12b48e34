//! Seam between the monitor engine and the PC/SC system library
//!
//! The engine only needs a handful of PC/SC calls. They are collected here in
//! [`CardBackend`] and [`CardHandle`] so that the monitor and the session logic
//! run unchanged against `pcsc::Context` or an in-memory backend.

use std::ffi::{CStr, CString};
use std::fmt;
use std::time::Duration;

use pcsc::{Card, Context, Disposition, Error, Protocol, Protocols, ReaderState, State};

use crate::config::ShareMode;

/// One entry of a status-change wait: a reader (or the PnP notification
/// target) with the state we believe it is in and the state reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSlot {
    name: CString,
    current: State,
    event: State,
}

impl WaitSlot {
    /// Slot for a named reader, starting from an unaware state
    pub const fn new(name: CString) -> Self {
        Self {
            name,
            current: State::UNAWARE,
            event: State::UNAWARE,
        }
    }

    /// Slot for the reader-topology notification target
    pub fn pnp() -> Self {
        Self::new(pcsc::PNP_NOTIFICATION().to_owned())
    }

    /// Whether this is the topology notification slot
    pub fn is_pnp(&self) -> bool {
        self.name.as_c_str() == pcsc::PNP_NOTIFICATION()
    }

    /// Reader name
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// State the caller believes the slot is in
    pub const fn current_state(&self) -> State {
        self.current
    }

    /// State reported by the last wait
    pub const fn event_state(&self) -> State {
        self.event
    }

    /// Record the reported state; called by backends
    pub const fn set_event_state(&mut self, state: State) {
        self.event = state;
    }

    /// Adopt the reported state as the new baseline
    pub const fn sync_current_state(&mut self) {
        self.current = self.event;
    }
}

/// I/O framing used for transmits, derived from the negotiated protocol
///
/// Backends that choose the send PCI themselves may ignore it. The
/// `pcsc::Card` implementation does: pcsc derives the PCI from the card's
/// active protocol, which is the protocol the framing was selected from, so
/// the two always agree. The mock backend records it for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Character-oriented T=0 framing
    T0,
    /// Block-oriented T=1 framing
    T1,
    /// Generic raw framing when neither standard protocol was negotiated
    Raw,
}

impl Framing {
    /// Select the framing for a negotiated protocol
    pub const fn for_protocol(protocol: Option<Protocol>) -> Self {
        match protocol {
            Some(Protocol::T0) => Self::T0,
            Some(Protocol::T1) => Self::T1,
            _ => Self::Raw,
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T0 => write!(f, "T=0"),
            Self::T1 => write!(f, "T=1"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// The PC/SC context operations used by the engine
pub trait CardBackend {
    /// Connected card type
    type Card: CardHandle;

    /// Enumerate reader names
    fn list_readers(&self) -> Result<Vec<CString>, Error>;

    /// Block until any slot's state differs from its current state, or until
    /// `timeout` elapses (`None` waits indefinitely)
    fn get_status_change(
        &self,
        timeout: Option<Duration>,
        slots: &mut [WaitSlot],
    ) -> Result<(), Error>;

    /// Open a session with the card in `reader`
    fn connect(
        &self,
        reader: &CStr,
        share_mode: ShareMode,
        protocols: Protocols,
    ) -> Result<Self::Card, Error>;

    /// Abort any wait currently blocked on this context
    fn cancel(&self) -> Result<(), Error>;
}

/// An open card session
pub trait CardHandle {
    /// Protocol negotiated when the session was opened
    fn active_protocol(&self) -> Option<Protocol>;

    /// Send one command and return the card's reply.
    ///
    /// `framing` is advisory, see [`Framing`].
    fn transmit<'buf>(
        &mut self,
        framing: Framing,
        command: &[u8],
        buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], Error>;

    /// Release the session, leaving the card powered and in place
    fn disconnect(self) -> Result<(), Error>;
}

impl CardBackend for Context {
    type Card = Card;

    fn list_readers(&self) -> Result<Vec<CString>, Error> {
        self.list_readers_owned()
    }

    fn get_status_change(
        &self,
        timeout: Option<Duration>,
        slots: &mut [WaitSlot],
    ) -> Result<(), Error> {
        let mut states: Vec<ReaderState> = slots
            .iter()
            .map(|slot| ReaderState::new(slot.name.clone(), slot.current))
            .collect();

        Self::get_status_change(self, timeout, &mut states)?;

        for (slot, state) in slots.iter_mut().zip(&states) {
            slot.set_event_state(state.event_state());
        }
        Ok(())
    }

    fn connect(
        &self,
        reader: &CStr,
        share_mode: ShareMode,
        protocols: Protocols,
    ) -> Result<Card, Error> {
        Self::connect(self, reader, share_mode.into(), protocols)
    }

    fn cancel(&self) -> Result<(), Error> {
        Self::cancel(self)
    }
}

impl CardHandle for Card {
    fn active_protocol(&self) -> Option<Protocol> {
        self.status2_owned().ok().and_then(|status| status.protocol2())
    }

    fn transmit<'buf>(
        &mut self,
        _framing: Framing,
        command: &[u8],
        buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], Error> {
        // pcsc picks the send PCI from the card's active protocol, which is
        // the same protocol `_framing` was derived from
        Self::transmit(self, command, buffer)
    }

    fn disconnect(self) -> Result<(), Error> {
        Self::disconnect(self, Disposition::LeaveCard).map_err(|(_, e)| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_for_protocol() {
        assert_eq!(Framing::for_protocol(Some(Protocol::T0)), Framing::T0);
        assert_eq!(Framing::for_protocol(Some(Protocol::T1)), Framing::T1);
        assert_eq!(Framing::for_protocol(Some(Protocol::RAW)), Framing::Raw);
        assert_eq!(Framing::for_protocol(None), Framing::Raw);
    }

    #[test]
    fn test_slot_sync() {
        let mut slot = WaitSlot::new(CString::new("Reader").unwrap());
        assert_eq!(slot.current_state(), State::UNAWARE);

        slot.set_event_state(State::PRESENT | State::CHANGED);
        slot.sync_current_state();
        assert_eq!(slot.current_state(), State::PRESENT | State::CHANGED);
        assert!(!slot.is_pnp());
        assert!(WaitSlot::pnp().is_pnp());
    }
}
