//! In-memory [`CardBackend`] for exercising the engine without hardware
//!
//! Readers, cards and status-change outcomes are scripted up front. Every
//! connect, transmit and disconnect is recorded so tests can assert on the
//! exact exchange.

use std::collections::{HashMap, VecDeque};
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use pcsc::{Error, Protocol, Protocols, State};

use crate::backend::{CardBackend, CardHandle, Framing, WaitSlot};
use crate::config::ShareMode;

const IDLE_POLL: Duration = Duration::from_millis(5);

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `connect` on a reader with a sharing mode
    Connect(String, ShareMode),
    /// `transmit` of a command on a reader, with the framing used
    Transmit(String, Framing, Vec<u8>),
    /// `disconnect` from a reader
    Disconnect(String),
}

/// A scripted card sitting in a reader
#[derive(Debug, Clone)]
pub struct MockCard {
    protocol: Option<Protocol>,
    connect_error: Option<Error>,
    responses: VecDeque<Result<Vec<u8>, Error>>,
}

impl Default for MockCard {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCard {
    /// A T=1 card that answers `9000` to anything not scripted
    pub const fn new() -> Self {
        Self {
            protocol: Some(Protocol::T1),
            connect_error: None,
            responses: VecDeque::new(),
        }
    }

    /// Set the protocol reported after connecting
    pub fn with_protocol(mut self, protocol: Option<Protocol>) -> Self {
        self.protocol = protocol;
        self
    }

    /// Make every connect attempt fail
    pub fn with_connect_error(mut self, error: Error) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Queue a successful reply
    pub fn respond(mut self, reply: &[u8]) -> Self {
        self.responses.push_back(Ok(reply.to_vec()));
        self
    }

    /// Queue a failed transmit
    pub fn fail(mut self, error: Error) -> Self {
        self.responses.push_back(Err(error));
        self
    }
}

/// One scripted outcome of a blocking status-change wait
#[derive(Debug, Clone)]
pub struct WaitStep {
    outcome: Result<Vec<(Option<String>, State)>, Error>,
    readers: Option<Vec<String>>,
}

impl WaitStep {
    /// A reader changes to `state`
    pub fn reader(name: &str, state: State) -> Self {
        Self {
            outcome: Ok(vec![(Some(name.to_string()), state)]),
            readers: None,
        }
    }

    /// The reader topology notification fires
    pub fn pnp() -> Self {
        Self {
            outcome: Ok(vec![(None, State::empty())]),
            readers: None,
        }
    }

    /// The wait times out with nothing changed
    pub const fn timeout() -> Self {
        Self {
            outcome: Err(Error::Timeout),
            readers: None,
        }
    }

    /// The wait fails
    pub const fn fail(error: Error) -> Self {
        Self {
            outcome: Err(error),
            readers: None,
        }
    }

    /// Another reader changes in the same wait
    pub fn and_reader(mut self, name: &str, state: State) -> Self {
        if let Ok(changes) = &mut self.outcome {
            changes.push((Some(name.to_string()), state));
        }
        self
    }

    /// Replace the enumerated readers when this step fires
    pub fn with_readers(mut self, names: &[&str]) -> Self {
        self.readers = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    readers: Vec<String>,
    list_results: VecDeque<Result<Vec<String>, Error>>,
    states: HashMap<String, State>,
    cards: HashMap<String, MockCard>,
    waits: VecDeque<WaitStep>,
    query_failures: VecDeque<Error>,
    calls: Vec<Call>,
    stop_when_idle: Option<Arc<AtomicBool>>,
}

/// Scriptable in-memory PC/SC backend
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    pending_cancel: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl MockBackend {
    /// Create a backend with no readers
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the readers returned by enumeration
    pub fn set_readers(&self, names: &[&str]) {
        self.lock().readers = names.iter().map(|s| s.to_string()).collect();
    }

    /// Queue a one-off enumeration result, consumed before the reader list
    pub fn push_list_result(&self, result: Result<Vec<&str>, Error>) {
        let result = result.map(|v| v.into_iter().map(str::to_string).collect());
        self.lock().list_results.push_back(result);
    }

    /// Set the state a reader reports to an immediate query
    pub fn set_state(&self, reader: &str, state: State) {
        self.lock().states.insert(reader.to_string(), state);
    }

    /// Put a card in a reader
    pub fn insert_card(&self, reader: &str, card: MockCard) {
        self.lock().cards.insert(reader.to_string(), card);
    }

    /// Take the card out of a reader
    pub fn remove_card(&self, reader: &str) {
        self.lock().cards.remove(reader);
    }

    /// Queue the outcome of the next blocking wait
    pub fn push_wait(&self, step: WaitStep) {
        self.lock().waits.push_back(step);
    }

    /// Fail the next immediate (zero-timeout) status query
    pub fn fail_next_query(&self, error: Error) {
        self.lock().query_failures.push_back(error);
    }

    /// Raise `flag` once the wait script has run out
    pub fn stop_when_idle(&self, flag: Arc<AtomicBool>) {
        self.lock().stop_when_idle = Some(flag);
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Whether `cancel` has been called
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn apply(&self, step: WaitStep, slots: &mut [WaitSlot]) -> Result<(), Error> {
        let mut state = self.lock();
        if let Some(readers) = step.readers {
            state.readers = readers;
        }
        let changes = step.outcome?;

        for slot in slots.iter_mut() {
            let name = (!slot.is_pnp()).then(|| slot.name().to_string_lossy().into_owned());
            match changes.iter().find(|(target, _)| *target == name) {
                Some((_, new_state)) => {
                    if let Some(name) = name {
                        state.states.insert(name, *new_state);
                    }
                    slot.set_event_state(*new_state | State::CHANGED);
                }
                None => slot.set_event_state(slot.current_state() - State::CHANGED),
            }
        }
        Ok(())
    }
}

impl CardBackend for MockBackend {
    type Card = MockCardHandle;

    fn list_readers(&self) -> Result<Vec<CString>, Error> {
        let mut state = self.lock();
        let names = match state.list_results.pop_front() {
            Some(result) => result?,
            None => state.readers.clone(),
        };
        if names.is_empty() {
            return Err(Error::NoReadersAvailable);
        }
        Ok(names
            .into_iter()
            .filter_map(|n| CString::new(n).ok())
            .collect())
    }

    fn get_status_change(
        &self,
        timeout: Option<Duration>,
        slots: &mut [WaitSlot],
    ) -> Result<(), Error> {
        if timeout == Some(Duration::ZERO) {
            let mut state = self.lock();
            if let Some(error) = state.query_failures.pop_front() {
                return Err(error);
            }
            for slot in slots.iter_mut() {
                let current = if slot.is_pnp() {
                    State::empty()
                } else {
                    let name = slot.name().to_string_lossy();
                    state.states.get(name.as_ref()).copied().unwrap_or(State::EMPTY)
                };
                slot.set_event_state(current);
            }
            return Ok(());
        }

        loop {
            if self.pending_cancel.swap(false, Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }
            let (step, stop) = {
                let mut state = self.lock();
                (state.waits.pop_front(), state.stop_when_idle.clone())
            };
            if let Some(step) = step {
                return self.apply(step, slots);
            }
            if let Some(stop) = stop {
                stop.store(true, Ordering::SeqCst);
            }
            thread::sleep(IDLE_POLL);
            if timeout.is_some() {
                return Err(Error::Timeout);
            }
        }
    }

    fn connect(
        &self,
        reader: &CStr,
        share_mode: ShareMode,
        _protocols: Protocols,
    ) -> Result<MockCardHandle, Error> {
        let name = reader.to_string_lossy().into_owned();
        let mut state = self.lock();
        state.calls.push(Call::Connect(name.clone(), share_mode));

        let card = state.cards.get(&name).ok_or(Error::NoSmartcard)?;
        if let Some(error) = card.connect_error {
            return Err(error);
        }
        Ok(MockCardHandle {
            reader: name,
            protocol: card.protocol,
            state: Arc::clone(&self.state),
        })
    }

    fn cancel(&self) -> Result<(), Error> {
        self.pending_cancel.store(true, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Session handle returned by [`MockBackend::connect`]
#[derive(Debug)]
pub struct MockCardHandle {
    reader: String,
    protocol: Option<Protocol>,
    state: Arc<Mutex<MockState>>,
}

impl CardHandle for MockCardHandle {
    fn active_protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    fn transmit<'buf>(
        &mut self,
        framing: Framing,
        command: &[u8],
        buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], Error> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .calls
            .push(Call::Transmit(self.reader.clone(), framing, command.to_vec()));

        let reply = state
            .cards
            .get_mut(&self.reader)
            .ok_or(Error::RemovedCard)?
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(vec![0x90, 0x00]))?;
        if reply.len() > buffer.len() {
            return Err(Error::InsufficientBuffer);
        }
        buffer[..reply.len()].copy_from_slice(&reply);
        Ok(&buffer[..reply.len()])
    }

    fn disconnect(self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(Call::Disconnect(self.reader));
        Ok(())
    }
}
