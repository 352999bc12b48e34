//! Event handling on the dispatch thread
//!
//! The [`App`] owns the only mutable copy of the roster outside the monitor.
//! It replaces it wholesale on every [`MonitorEvent::ReaderListChanged`] and
//! resolves card events against it.

use cardaction_core::{ActionConfig, MonitorEvent, ReaderId, ReaderRoster, render_command};
use cardaction_pcsc::{CardBackend, CardSessionTransmitter, EventReceiver};
use tracing::{debug, info, warn};

use crate::runner::CommandRunner;

/// Turns monitor events into command executions
pub(crate) struct App<B, R> {
    config: ActionConfig,
    transmitter: CardSessionTransmitter<B>,
    runner: R,
    roster: ReaderRoster,
}

impl<B: CardBackend, R: CommandRunner> App<B, R> {
    pub(crate) fn new(config: ActionConfig, transmitter: CardSessionTransmitter<B>, runner: R) -> Self {
        Self {
            config,
            transmitter,
            runner,
            roster: ReaderRoster::default(),
        }
    }

    /// Handle events until every sender is gone
    pub(crate) fn run(mut self, events: &EventReceiver) {
        for event in events.iter() {
            self.handle(event);
        }
        debug!("event channel closed");
    }

    pub(crate) fn handle(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::ReaderListChanged(roster) => {
                self.roster = roster;
                info!(generation = self.roster.generation(), "{}", self.summary());
            }
            MonitorEvent::CardInserted(id) => self.card_inserted(id),
            MonitorEvent::CardRemoved(id) => self.card_removed(id),
        }
    }

    fn card_inserted(&mut self, id: ReaderId) {
        let Some((reader, raw)) = self
            .roster
            .get(id)
            .map(|r| (r.name.clone(), r.raw_name().to_owned()))
        else {
            warn!(%id, "insertion on unknown reader, ignoring");
            return;
        };
        self.roster.set_has_card(id, true);

        let responses = self.transmitter.exchange_raw(&raw, &self.config.insert_apdus);
        let command = render_command(&self.config.insert_command, &responses[..]);
        info!(%reader, %command, "card inserted");
        self.runner.run(&command);
    }

    fn card_removed(&mut self, id: ReaderId) {
        match self.roster.get(id) {
            Some(reader) => info!(reader = %reader.name, "card removed"),
            None => info!(%id, "card removed from unknown reader"),
        }
        self.runner.run(&self.config.remove_command);
        self.roster.set_has_card(id, false);
    }

    /// One-line description of the readers, e.g. `2 reader(s), card in: Reader A`
    pub(crate) fn summary(&self) -> String {
        let with_card: Vec<&str> = self
            .roster
            .readers()
            .iter()
            .filter(|r| r.has_card)
            .map(|r| r.name.as_str())
            .collect();

        let mut summary = format!("{} reader(s)", self.roster.len());
        if !with_card.is_empty() {
            summary.push_str(", card in: ");
            summary.push_str(&with_card.join(", "));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardaction_core::ReaderRecord;
    use cardaction_pcsc::SessionConfig;
    use cardaction_pcsc::mock::{Call, MockBackend, MockCard};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRunner {
        commands: RefCell<Vec<String>>,
    }

    impl CommandRunner for &RecordingRunner {
        fn run(&self, command: &str) {
            self.commands.borrow_mut().push(command.to_string());
        }
    }

    fn config(apdus: &[&str]) -> ActionConfig {
        ActionConfig {
            insert_apdus: apdus.iter().map(|s| s.to_string()).collect(),
            insert_command: "echo {1}".into(),
            remove_command: "echo removed".into(),
            ..ActionConfig::default()
        }
    }

    fn roster(generation: u64, names: &[&str]) -> MonitorEvent {
        MonitorEvent::ReaderListChanged(ReaderRoster::new(
            generation,
            names.iter().map(|n| ReaderRecord::new(*n, false)).collect(),
        ))
    }

    fn app<'r>(
        backend: &MockBackend,
        config: ActionConfig,
        runner: &'r RecordingRunner,
    ) -> App<MockBackend, &'r RecordingRunner> {
        let transmitter = CardSessionTransmitter::new(backend.clone(), SessionConfig::default());
        App::new(config, transmitter, runner)
    }

    #[test]
    fn test_insertion_renders_response_into_command() {
        let backend = MockBackend::new();
        backend.insert_card("Reader B", MockCard::new().respond(&[0x90, 0x00]));
        let runner = RecordingRunner::default();
        let mut app = app(&backend, config(&["00A4040000"]), &runner);

        app.handle(roster(1, &["Reader A", "Reader B"]));
        app.handle(MonitorEvent::CardInserted(ReaderId::new(1, 1)));

        assert_eq!(*runner.commands.borrow(), ["echo 9000"]);
        assert!(app.roster.readers()[1].has_card);
        assert_eq!(app.summary(), "2 reader(s), card in: Reader B");
    }

    #[test]
    fn test_failed_exchange_leaves_placeholder_empty() {
        let backend = MockBackend::new();
        backend.insert_card("Reader A", MockCard::new().fail(pcsc::Error::CommError));
        let runner = RecordingRunner::default();
        let mut app = app(&backend, config(&["00A4040000"]), &runner);

        app.handle(roster(1, &["Reader A"]));
        app.handle(MonitorEvent::CardInserted(ReaderId::new(1, 0)));

        assert_eq!(*runner.commands.borrow(), ["echo "]);
    }

    #[test]
    fn test_no_apdus_keeps_placeholder() {
        let backend = MockBackend::new();
        backend.insert_card("Reader A", MockCard::new());
        let runner = RecordingRunner::default();
        let mut app = app(&backend, config(&[]), &runner);

        app.handle(roster(1, &["Reader A"]));
        app.handle(MonitorEvent::CardInserted(ReaderId::new(1, 0)));

        assert_eq!(*runner.commands.borrow(), ["echo {1}"]);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_stale_insertion_is_ignored() {
        let backend = MockBackend::new();
        backend.insert_card("Reader A", MockCard::new());
        let runner = RecordingRunner::default();
        let mut app = app(&backend, config(&["00A4040000"]), &runner);

        app.handle(roster(1, &["Reader A"]));
        app.handle(roster(2, &["Reader A"]));
        app.handle(MonitorEvent::CardInserted(ReaderId::new(1, 0)));
        app.handle(MonitorEvent::CardInserted(ReaderId::new(2, 5)));

        assert!(runner.commands.borrow().is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_removal_always_runs_command() {
        let backend = MockBackend::new();
        backend.insert_card("Reader A", MockCard::new());
        let runner = RecordingRunner::default();
        let mut app = app(&backend, config(&["00A4040000"]), &runner);

        app.handle(roster(1, &["Reader A"]));
        app.handle(MonitorEvent::CardInserted(ReaderId::new(1, 0)));
        app.handle(MonitorEvent::CardRemoved(ReaderId::new(1, 0)));
        app.handle(MonitorEvent::CardRemoved(ReaderId::new(7, 0)));

        assert_eq!(
            *runner.commands.borrow(),
            ["echo 9000", "echo removed", "echo removed"]
        );
        assert!(!app.roster.readers()[0].has_card);
        assert_eq!(
            backend.calls().last(),
            Some(&Call::Disconnect("Reader A".into()))
        );
    }

    #[test]
    fn test_run_drains_channel() {
        let backend = MockBackend::new();
        let runner = RecordingRunner::default();
        let app = app(&backend, config(&[]), &runner);

        let (tx, rx) = cardaction_pcsc::event_channel();
        tx.send(roster(1, &["Reader A"])).unwrap();
        tx.send(MonitorEvent::CardRemoved(ReaderId::new(1, 0))).unwrap();
        drop(tx);

        app.run(&rx);
        assert_eq!(*runner.commands.borrow(), ["echo removed"]);
    }
}
