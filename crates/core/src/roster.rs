//! Reader roster shared between the monitor and the event handler

use std::ffi::{CStr, CString};

use derive_more::Display;

/// Identity of a reader within one enumeration generation.
///
/// Indices are only meaningful against the roster they were issued for. A
/// rebuild bumps the generation, after which older ids resolve to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{index}@gen{generation}")]
pub struct ReaderId {
    /// Roster generation the index belongs to
    pub generation: u64,
    /// 0-based position in the roster
    pub index: usize,
}

impl ReaderId {
    /// Create a new reader id
    pub const fn new(generation: u64, index: usize) -> Self {
        Self { generation, index }
    }
}

/// A physically enumerated reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderRecord {
    /// Reader name for display and comparison (lossy if not UTF-8)
    pub name: String,
    /// Whether a card was present when last observed
    pub has_card: bool,
    raw_name: CString,
}

impl ReaderRecord {
    /// Create a new reader record from a textual name.
    ///
    /// Anything from an interior NUL onwards is dropped from the raw name.
    pub fn new(name: impl Into<String>, has_card: bool) -> Self {
        let name = name.into();
        let raw_name = name
            .split('\0')
            .next()
            .and_then(|prefix| CString::new(prefix).ok())
            .unwrap_or_default();
        Self {
            name,
            has_card,
            raw_name,
        }
    }

    /// Create a record from the name exactly as the PC/SC layer reported it
    pub fn from_raw(raw_name: CString, has_card: bool) -> Self {
        Self {
            name: raw_name.to_string_lossy().into_owned(),
            has_card,
            raw_name,
        }
    }

    /// Name to connect with, byte-for-byte as enumerated
    pub fn raw_name(&self) -> &CStr {
        &self.raw_name
    }
}

/// Snapshot of all readers visible to the PC/SC layer, in enumeration order.
///
/// A roster is built from scratch on every topology change and handed to the
/// event consumer whole; it is never patched in place across generations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderRoster {
    generation: u64,
    readers: Vec<ReaderRecord>,
}

impl ReaderRoster {
    /// Create a roster for the given generation
    pub const fn new(generation: u64, readers: Vec<ReaderRecord>) -> Self {
        Self {
            generation,
            readers,
        }
    }

    /// Generation this roster was built for
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of readers
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Whether no readers are present
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// All readers in enumeration order
    pub fn readers(&self) -> &[ReaderRecord] {
        &self.readers
    }

    /// Reader names in enumeration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.readers.iter().map(|r| r.name.as_str())
    }

    /// Whether this roster lists exactly `names`, in order
    pub fn matches_names<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.readers.len() == names.len() && self.names().zip(names).all(|(a, b)| a == b.as_ref())
    }

    /// Id of the reader at `index` in this generation
    pub fn id(&self, index: usize) -> Option<ReaderId> {
        (index < self.readers.len()).then(|| ReaderId::new(self.generation, index))
    }

    /// Resolve an id, rejecting ids from another generation
    pub fn get(&self, id: ReaderId) -> Option<&ReaderRecord> {
        if id.generation != self.generation {
            return None;
        }
        self.readers.get(id.index)
    }

    /// Mutable variant of [`ReaderRoster::get`]
    pub fn get_mut(&mut self, id: ReaderId) -> Option<&mut ReaderRecord> {
        if id.generation != self.generation {
            return None;
        }
        self.readers.get_mut(id.index)
    }

    /// Record card presence for a reader. Returns `false` if `id` is stale.
    pub fn set_has_card(&mut self, id: ReaderId, has_card: bool) -> bool {
        self.get_mut(id).map(|r| r.has_card = has_card).is_some()
    }
}
