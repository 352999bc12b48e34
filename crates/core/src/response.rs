//! Responses collected from a card session

use derive_more::Deref;

/// Hex-encoded responses, one per configured APDU and in the same order.
///
/// A failed or skipped command leaves an empty string at its position. When
/// the session could not be opened at all the list is empty, so callers that
/// need to tell the two apart compare against the number of configured
/// commands rather than relying on `len()` alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct CardResponse(Vec<String>);

impl CardResponse {
    /// Response for a session that was never opened
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Consume into the underlying list
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for CardResponse {
    fn from(responses: Vec<String>) -> Self {
        Self(responses)
    }
}

impl FromIterator<String> for CardResponse {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
