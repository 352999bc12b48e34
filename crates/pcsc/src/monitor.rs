//! Status-change monitor turning PC/SC waits into discrete reader events
//!
//! Each cycle enumerates the readers, captures every slot's state with an
//! immediate query, then blocks for at most [`MonitorConfig::timeout`] waiting
//! for any slot to move away from that baseline. Changed slots are classified
//! as insertions or removals; a change on the PnP slot rebuilds the roster.
//!
//! The monitor owns its roster. Consumers receive a copy inside
//! [`MonitorEvent::ReaderListChanged`] before any card event that refers to it.

use std::ffi::CString;
use std::fmt;
use std::iter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cardaction_core::{InsertionTrigger, MonitorEvent, ReaderRoster};
use pcsc::State;
use tracing::{debug, info, warn};

use crate::backend::{CardBackend, WaitSlot};
use crate::config::MonitorConfig;
use crate::error::PcscError;
use crate::event::EventSender;
use crate::reader::{build_roster, display_name, enumerate, rebuild_roster};

/// A classified change on one reader slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Inserted,
    Removed,
}

impl Transition {
    /// Classify a slot's change from `baseline` to `event`.
    ///
    /// Only slots flagged `CHANGED` are considered. Insertion is tested first;
    /// any changed slot reporting empty or unavailable is a removal.
    pub(crate) fn classify(baseline: State, event: State, trigger: InsertionTrigger) -> Option<Self> {
        if !event.contains(State::CHANGED) {
            return None;
        }

        let inserted = match trigger {
            InsertionTrigger::Presence => {
                event.contains(State::PRESENT) && !baseline.contains(State::PRESENT)
            }
            InsertionTrigger::InUse => {
                event.contains(State::INUSE)
                    && !baseline.contains(State::INUSE)
                    && !event.contains(State::EXCLUSIVE)
            }
        };

        if inserted {
            Some(Self::Inserted)
        } else if event.intersects(State::EMPTY | State::UNAVAILABLE) {
            Some(Self::Removed)
        } else {
            None
        }
    }
}

/// The receiving side of the event channel has gone away
struct Disconnected;

/// What the run loop does after a cycle
enum Cycle {
    Continue,
    Retry,
}

/// Watches all readers and reports card and topology changes
pub struct StatusChangeMonitor<B> {
    backend: B,
    config: MonitorConfig,
    roster: ReaderRoster,
    stop: Arc<AtomicBool>,
}

impl<B> fmt::Debug for StatusChangeMonitor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusChangeMonitor")
            .field("config", &self.config)
            .field("roster", &self.roster)
            .field("stopped", &self.stop.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<B: CardBackend> StatusChangeMonitor<B> {
    /// Create a monitor over `backend`
    pub fn new(backend: B, config: MonitorConfig) -> Self {
        Self {
            backend,
            config,
            roster: ReaderRoster::default(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the run loop at its next cycle boundary when set
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run until stopped or until the event receiver is dropped.
    ///
    /// The first event sent is always the initial roster.
    pub fn run(mut self, events: &EventSender) {
        info!(timeout = ?self.config.timeout, "card monitor started");

        let initial = rebuild_roster(&self.backend, 1);
        if self.publish(initial, events).is_err() {
            return;
        }

        while !self.stopped() {
            match self.cycle(events) {
                Ok(Cycle::Continue) => {}
                Ok(Cycle::Retry) => thread::sleep(self.config.retry_delay),
                Err(Disconnected) => {
                    debug!("event receiver dropped");
                    break;
                }
            }
        }

        info!("card monitor stopped");
    }

    fn cycle(&mut self, events: &EventSender) -> Result<Cycle, Disconnected> {
        let names = match enumerate(&self.backend) {
            Ok(names) if names.is_empty() => return self.wait_for_reader(events),
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "failed to enumerate readers");
                return Ok(Cycle::Retry);
            }
        };

        let display: Vec<String> = names.iter().map(|n| display_name(n)).collect();
        if !self.roster.matches_names(&display) {
            debug!(readers = ?display, "reader list differs from roster");
            self.rebuild(&names, events)?;
        }

        let mut slots: Vec<WaitSlot> = iter::once(WaitSlot::pnp())
            .chain(names.into_iter().map(WaitSlot::new))
            .collect();

        if let Err(e) = self.backend.get_status_change(Some(Duration::ZERO), &mut slots) {
            warn!(error = %e, "failed to query reader states");
            return Ok(Cycle::Retry);
        }
        for slot in &mut slots {
            slot.sync_current_state();
        }

        match self
            .backend
            .get_status_change(Some(self.config.timeout), &mut slots)
        {
            Ok(()) => {}
            Err(pcsc::Error::Timeout | pcsc::Error::Cancelled) => return Ok(Cycle::Continue),
            Err(e) => {
                warn!(error = %e, "status change wait failed");
                return Ok(Cycle::Retry);
            }
        }

        if self.stopped() {
            return Ok(Cycle::Continue);
        }

        if slots[0].event_state().contains(State::CHANGED) {
            info!("reader list changed");
            self.rebuild_from_scratch(events)?;
            return Ok(Cycle::Continue);
        }

        for (index, slot) in slots[1..].iter().enumerate() {
            let Some(id) = self.roster.id(index) else {
                continue;
            };
            let transition = Transition::classify(
                slot.current_state(),
                slot.event_state(),
                self.config.insertion_trigger,
            );
            let event = match transition {
                Some(Transition::Inserted) => MonitorEvent::CardInserted(id),
                Some(Transition::Removed) => MonitorEvent::CardRemoved(id),
                None => continue,
            };
            debug!(reader = ?slot.name(), ?event, "card event");
            events.send(event).map_err(|_| Disconnected)?;
        }

        Ok(Cycle::Continue)
    }

    /// Block on the PnP slot alone until a reader shows up
    fn wait_for_reader(&mut self, events: &EventSender) -> Result<Cycle, Disconnected> {
        if !self.roster.is_empty() {
            self.rebuild(&[], events)?;
        }

        let mut slots = [WaitSlot::pnp()];
        if let Err(e) = self.backend.get_status_change(Some(Duration::ZERO), &mut slots) {
            warn!(error = %e, "failed to query reader notifications");
            return Ok(Cycle::Retry);
        }
        slots[0].sync_current_state();

        debug!("no readers, waiting for one to appear");
        match self.backend.get_status_change(None, &mut slots) {
            Ok(()) if self.stopped() => Ok(Cycle::Continue),
            Ok(()) => {
                info!("reader list changed");
                self.rebuild_from_scratch(events)?;
                Ok(Cycle::Continue)
            }
            Err(pcsc::Error::Cancelled) => Ok(Cycle::Continue),
            Err(e) => {
                warn!(error = %e, "reader notification wait failed");
                Ok(Cycle::Retry)
            }
        }
    }

    fn rebuild(&mut self, names: &[CString], events: &EventSender) -> Result<(), Disconnected> {
        let roster = build_roster(&self.backend, names, self.roster.generation() + 1);
        self.publish(roster, events)
    }

    fn rebuild_from_scratch(&mut self, events: &EventSender) -> Result<(), Disconnected> {
        let roster = rebuild_roster(&self.backend, self.roster.generation() + 1);
        self.publish(roster, events)
    }

    fn publish(&mut self, roster: ReaderRoster, events: &EventSender) -> Result<(), Disconnected> {
        info!(
            generation = roster.generation(),
            readers = roster.len(),
            "reader roster rebuilt"
        );
        self.roster = roster.clone();
        events
            .send(MonitorEvent::ReaderListChanged(roster))
            .map_err(|_| Disconnected)
    }
}

impl<B> StatusChangeMonitor<B>
where
    B: CardBackend + Clone + Send + 'static,
{
    /// Run the monitor on a dedicated thread
    pub fn spawn(self, events: EventSender) -> Result<MonitorHandle<B>, PcscError> {
        let backend = self.backend.clone();
        let stop = self.stop_flag();

        let thread = thread::Builder::new()
            .name("card-monitor".into())
            .spawn(move || self.run(&events))
            .map_err(PcscError::MonitorSpawn)?;

        Ok(MonitorHandle {
            backend,
            stop,
            thread,
        })
    }
}

/// Handle to a monitor running on its own thread
pub struct MonitorHandle<B: CardBackend> {
    backend: B,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl<B: CardBackend> fmt::Debug for MonitorHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("stopped", &self.stop.load(Ordering::SeqCst))
            .field("finished", &self.thread.is_finished())
            .finish_non_exhaustive()
    }
}

impl<B: CardBackend> MonitorHandle<B> {
    /// Ask the monitor to stop and wake it from any blocking wait
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.backend.cancel() {
            debug!(error = %e, "failed to cancel pending wait");
        }
    }

    /// Wait for the monitor thread to exit
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("card monitor thread panicked");
        }
    }

    /// Stop the monitor and wait for it to exit
    pub fn shutdown(self) {
        self.stop();
        self.join();
    }
}
