//! Channel carrying [`MonitorEvent`]s out of the monitor thread

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::event::MonitorEvent;

/// Sender half held by the monitor
pub type EventSender = Sender<MonitorEvent>;
/// Receiver half held by the event handler
pub type EventReceiver = Receiver<MonitorEvent>;

/// Create the monitor's event channel.
///
/// The channel is unbounded so the monitor never blocks on a slow consumer.
/// Dropping the receiver makes the monitor exit at its next send.
pub fn event_channel() -> (EventSender, EventReceiver) {
    unbounded()
}
