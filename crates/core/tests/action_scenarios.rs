//! End-to-end substitution scenarios for insertion commands

use cardaction_core::{ActionConfig, CardResponse, encode_hex, render_command};

fn config(apdus: &[&str], command: &str) -> ActionConfig {
    ActionConfig {
        insert_apdus: apdus.iter().map(|s| s.to_string()).collect(),
        insert_command: command.to_string(),
        ..ActionConfig::default()
    }
}

#[test]
fn test_successful_transmit_is_substituted() {
    let config = config(&["00A4040000"], "echo {1}");
    let responses: CardResponse = vec![encode_hex(&[0x90, 0x00])].into();

    assert_eq!(responses.len(), config.insert_apdus.len());
    assert_eq!(render_command(&config.insert_command, &responses[..]), "echo 9000");
}

#[test]
fn test_failed_transmit_substitutes_empty_string() {
    let config = config(&["00A4040000"], "echo {1}");
    let responses: CardResponse = vec![String::new()].into();

    assert_eq!(render_command(&config.insert_command, &responses[..]), "echo ");
}

#[test]
fn test_unopened_session_leaves_placeholders() {
    let config = config(&["00A4040000", "00CA000000"], "id={1} data={2}");
    let responses = CardResponse::none();

    assert_ne!(responses.len(), config.insert_apdus.len());
    assert_eq!(
        render_command(&config.insert_command, &responses[..]),
        "id={1} data={2}"
    );
}

#[test]
fn test_zero_apdus_configured() {
    let config = config(&[], "echo {1}");
    let responses = CardResponse::none();

    assert_eq!(responses.len(), config.insert_apdus.len());
    assert_eq!(render_command(&config.insert_command, &responses[..]), "echo {1}");
}
