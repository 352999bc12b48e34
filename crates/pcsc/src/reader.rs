//! Reader roster construction

use std::ffi::{CStr, CString};

use cardaction_core::{ReaderRecord, ReaderRoster};
use pcsc::Protocols;
use tracing::{debug, warn};

use crate::backend::{CardBackend, CardHandle};
use crate::config::ShareMode;

/// Convert a PC/SC reader name for display and comparison
pub(crate) fn display_name(name: &CStr) -> String {
    name.to_string_lossy().into_owned()
}

/// Enumerate readers, treating "no readers" as an empty list
pub(crate) fn enumerate<B: CardBackend>(backend: &B) -> Result<Vec<CString>, pcsc::Error> {
    match backend.list_readers() {
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        other => other,
    }
}

/// Check for a card by briefly connecting in shared mode.
///
/// Any failure means "no card". The card is left powered and in place.
pub(crate) fn sense_card<B: CardBackend>(backend: &B, name: &CStr) -> bool {
    match backend.connect(name, ShareMode::Shared, Protocols::T0 | Protocols::T1) {
        Ok(card) => {
            if let Err(e) = card.disconnect() {
                debug!(reader = ?name, error = %e, "presence check disconnect failed");
            }
            true
        }
        Err(e) => {
            debug!(reader = ?name, error = %e, "no card");
            false
        }
    }
}

/// Build a roster for `names`, probing each reader for a card
pub fn build_roster<B: CardBackend>(backend: &B, names: &[CString], generation: u64) -> ReaderRoster {
    let readers = names
        .iter()
        .map(|name| ReaderRecord::from_raw(name.clone(), sense_card(backend, name)))
        .collect();
    ReaderRoster::new(generation, readers)
}

/// Enumerate all readers and check each for a card. Enumeration failure yields an empty roster.
pub fn rebuild_roster<B: CardBackend>(backend: &B, generation: u64) -> ReaderRoster {
    let names = enumerate(backend).unwrap_or_else(|e| {
        warn!(error = %e, "failed to enumerate readers");
        Vec::new()
    });
    build_roster(backend, &names, generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBackend, MockCard};

    #[test]
    fn test_roster_in_enumeration_order() {
        let backend = MockBackend::new();
        backend.set_readers(&["Reader B", "Reader A", "Reader C"]);
        backend.insert_card("Reader A", MockCard::new());

        let roster = rebuild_roster(&backend, 7);
        assert_eq!(roster.generation(), 7);
        assert_eq!(
            roster.names().collect::<Vec<_>>(),
            ["Reader B", "Reader A", "Reader C"]
        );
        assert_eq!(
            roster.readers().iter().map(|r| r.has_card).collect::<Vec<_>>(),
            [false, true, false]
        );
    }

    #[test]
    fn test_card_check_is_shared_and_leaves_card() {
        let backend = MockBackend::new();
        backend.set_readers(&["Reader A"]);
        backend.insert_card("Reader A", MockCard::new());

        rebuild_roster(&backend, 1);
        assert_eq!(
            backend.calls(),
            [
                Call::Connect("Reader A".into(), ShareMode::Shared),
                Call::Disconnect("Reader A".into()),
            ]
        );
    }

    #[test]
    fn test_card_check_failure_means_no_card() {
        let backend = MockBackend::new();
        backend.set_readers(&["Reader A"]);
        backend.insert_card(
            "Reader A",
            MockCard::new().with_connect_error(pcsc::Error::SharingViolation),
        );

        let roster = rebuild_roster(&backend, 1);
        assert!(!roster.readers()[0].has_card);
    }

    #[test]
    fn test_enumeration_failure_yields_empty_roster() {
        let backend = MockBackend::new();
        backend.push_list_result(Err(pcsc::Error::NoService));
        assert!(rebuild_roster(&backend, 2).is_empty());

        backend.push_list_result(Err(pcsc::Error::NoReadersAvailable));
        assert!(rebuild_roster(&backend, 3).is_empty());
    }
}
