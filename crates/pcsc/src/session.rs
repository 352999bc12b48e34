//! One-shot APDU exchange with a freshly inserted card

use std::ffi::{CStr, CString};
use std::fmt;

use cardaction_core::{CardResponse, decode_hex, encode_hex};
use tracing::{debug, warn};

use crate::backend::{CardBackend, CardHandle, Framing};
use crate::config::SessionConfig;

/// Releases the card on every exit path, leaving it powered and in place
struct SessionGuard<'r, C: CardHandle> {
    card: Option<C>,
    reader: &'r str,
}

impl<C: CardHandle> SessionGuard<'_, C> {
    fn card(&mut self) -> Option<&mut C> {
        self.card.as_mut()
    }
}

impl<C: CardHandle> Drop for SessionGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err(e) = card.disconnect() {
                warn!(reader = self.reader, error = %e, "failed to release card session");
            }
        }
    }
}

/// Sends the configured APDUs to a card and collects its responses
pub struct CardSessionTransmitter<B> {
    backend: B,
    config: SessionConfig,
}

impl<B> fmt::Debug for CardSessionTransmitter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSessionTransmitter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: CardBackend> CardSessionTransmitter<B> {
    /// Create a transmitter over `backend`
    pub const fn new(backend: B, config: SessionConfig) -> Self {
        Self { backend, config }
    }

    /// Open a session on `reader`, send every APDU in order and release it.
    ///
    /// Returns one hex response per APDU, with an empty string wherever a
    /// command could not be decoded, failed, or produced no bytes. Returns an
    /// empty list without touching the reader when `apdus` is empty, and when
    /// the session cannot be opened.
    pub fn exchange<S: AsRef<str>>(&self, reader: &str, apdus: &[S]) -> CardResponse {
        if apdus.is_empty() {
            return CardResponse::none();
        }

        let Ok(name) = CString::new(reader) else {
            warn!(reader, "reader name contains a NUL byte");
            return CardResponse::none();
        };
        self.exchange_raw(&name, apdus)
    }

    /// Same as [`exchange`](Self::exchange), addressing the reader by its name
    /// exactly as enumerated, which need not be valid UTF-8
    pub fn exchange_raw<S: AsRef<str>>(&self, name: &CStr, apdus: &[S]) -> CardResponse {
        if apdus.is_empty() {
            return CardResponse::none();
        }

        let display = name.to_string_lossy();
        let reader = display.as_ref();
        let card = match self
            .backend
            .connect(name, self.config.share_mode, self.config.protocols)
        {
            Ok(card) => card,
            Err(e) => {
                warn!(reader, error = %e, "failed to open card session");
                return CardResponse::none();
            }
        };

        let framing = Framing::for_protocol(card.active_protocol());
        debug!(reader, %framing, apdus = apdus.len(), "card session opened");

        let mut session = SessionGuard {
            card: Some(card),
            reader,
        };
        let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];

        apdus
            .iter()
            .enumerate()
            .map(|(index, apdu)| {
                let Some(command) = decode_hex(apdu.as_ref()) else {
                    warn!(reader, index, apdu = apdu.as_ref(), "skipping undecodable APDU");
                    return String::new();
                };
                let Some(card) = session.card() else {
                    return String::new();
                };

                match card.transmit(framing, &command, &mut buffer) {
                    Ok(reply) if !reply.is_empty() => encode_hex(reply),
                    Ok(_) => {
                        debug!(reader, index, "empty reply");
                        String::new()
                    }
                    Err(e) => {
                        warn!(reader, index, error = %e, "transmit failed");
                        String::new()
                    }
                }
            })
            .collect()
    }
}
