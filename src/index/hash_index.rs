//! Hash index
//!
//! Encoded key → packed `RowLocation`. The key representation is chosen from
//! the key schema: short fixed-width keys are folded into an integer so the
//! table stores no heap allocation per entry.

use std::borrow::{Borrow, Cow};
use std::collections::{HashMap, TryReserveError};
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem;

use crate::key::KeySchema;
use crate::location::RowLocation;

/// Operations the primary index needs from its table
pub(crate) trait HashIndex: Send {
    /// Whether `key` has the encoded width of this table's schema
    fn accepts(&self, key: &[u8]) -> bool;

    fn get(&self, key: &[u8]) -> Option<RowLocation>;

    fn contains(&self, key: &[u8]) -> bool;

    /// Set the location of `key`, returning the location it replaced.
    /// `key` must satisfy `accepts`.
    fn upsert(&mut self, key: &[u8], location: RowLocation) -> Option<RowLocation>;

    /// Repoint `key` only if its current segment is in `sorted_sources`
    fn replace_if_from(&mut self, key: &[u8], location: RowLocation, sorted_sources: &[u32])
        -> bool;

    fn erase(&mut self, key: &[u8]) -> Option<RowLocation>;

    fn size(&self) -> usize;

    fn capacity(&self) -> usize;

    fn reserve(&mut self, additional: usize);

    fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError>;

    fn memory_usage(&self) -> usize;
}

/// Build an empty table best suited to `schema`
pub(crate) fn new_hash_index(schema: &KeySchema) -> Box<dyn HashIndex> {
    let width = schema.fixed_width();
    match width {
        Some(w) if w <= 8 => Box::new(TypedHashIndex::<Fixed64>::new(width)),
        Some(w) if w <= 16 => Box::new(TypedHashIndex::<Fixed128>::new(width)),
        _ => Box::new(TypedHashIndex::<Slice>::new(width)),
    }
}

// =============================================================================
// Key Representations
// =============================================================================

/// How an encoded key is stored in, and probed against, the table
pub(crate) trait KeyRepr: Send + 'static {
    type Key: Eq + Hash + Borrow<Self::Probe> + Send;
    type Probe: ?Sized + ToOwned + Eq + Hash;

    fn probe(encoded: &[u8]) -> Cow<'_, Self::Probe>;

    fn to_key(encoded: &[u8]) -> Self::Key;

    /// Heap bytes owned by a stored key
    fn heap_bytes(_key: &Self::Key) -> usize {
        0
    }
}

/// Fixed-width keys of at most 8 bytes
pub(crate) struct Fixed64;

impl KeyRepr for Fixed64 {
    type Key = u64;
    type Probe = u64;

    fn probe(encoded: &[u8]) -> Cow<'_, u64> {
        Cow::Owned(Self::to_key(encoded))
    }

    fn to_key(encoded: &[u8]) -> u64 {
        encoded.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }
}

/// Fixed-width keys of at most 16 bytes
pub(crate) struct Fixed128;

impl KeyRepr for Fixed128 {
    type Key = u128;
    type Probe = u128;

    fn probe(encoded: &[u8]) -> Cow<'_, u128> {
        Cow::Owned(Self::to_key(encoded))
    }

    fn to_key(encoded: &[u8]) -> u128 {
        encoded.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
    }
}

/// Variable-length or wide keys, stored as owned byte slices
pub(crate) struct Slice;

impl KeyRepr for Slice {
    type Key = Box<[u8]>;
    type Probe = [u8];

    fn probe(encoded: &[u8]) -> Cow<'_, [u8]> {
        Cow::Borrowed(encoded)
    }

    fn to_key(encoded: &[u8]) -> Box<[u8]> {
        encoded.into()
    }

    fn heap_bytes(key: &Box<[u8]>) -> usize {
        key.len()
    }
}

// =============================================================================
// Table
// =============================================================================

pub(crate) struct TypedHashIndex<R: KeyRepr> {
    map: HashMap<R::Key, u64>,
    /// Encoded width of every key, for fixed-width schemas. Folded integer
    /// keys are only distinct among keys of this exact width.
    key_width: Option<usize>,
    /// Sum of `R::heap_bytes` over all stored keys
    key_heap_bytes: usize,
    _repr: PhantomData<R>,
}

impl<R: KeyRepr> TypedHashIndex<R> {
    pub(crate) fn new(key_width: Option<usize>) -> Self {
        Self {
            map: HashMap::new(),
            key_width,
            key_heap_bytes: 0,
            _repr: PhantomData,
        }
    }
}

impl<R: KeyRepr> HashIndex for TypedHashIndex<R> {
    fn accepts(&self, key: &[u8]) -> bool {
        self.key_width.map_or(true, |width| key.len() == width)
    }

    fn get(&self, key: &[u8]) -> Option<RowLocation> {
        if !self.accepts(key) {
            return None;
        }
        let probe = R::probe(key);
        self.map.get(&*probe).copied().map(RowLocation::unpack)
    }

    fn contains(&self, key: &[u8]) -> bool {
        if !self.accepts(key) {
            return false;
        }
        let probe = R::probe(key);
        self.map.contains_key(&*probe)
    }

    fn upsert(&mut self, key: &[u8], location: RowLocation) -> Option<RowLocation> {
        debug_assert!(self.accepts(key), "key of width {} upserted", key.len());
        let probe = R::probe(key);
        if let Some(slot) = self.map.get_mut(&*probe) {
            let old = mem::replace(slot, location.pack());
            return Some(RowLocation::unpack(old));
        }
        let owned = R::to_key(key);
        self.key_heap_bytes += R::heap_bytes(&owned);
        self.map.insert(owned, location.pack());
        None
    }

    fn replace_if_from(
        &mut self,
        key: &[u8],
        location: RowLocation,
        sorted_sources: &[u32],
    ) -> bool {
        if !self.accepts(key) {
            return false;
        }
        let probe = R::probe(key);
        let Some(slot) = self.map.get_mut(&*probe) else {
            return false;
        };
        let current = RowLocation::unpack(*slot);
        if sorted_sources.binary_search(&current.segment_id).is_err() {
            return false;
        }
        *slot = location.pack();
        true
    }

    fn erase(&mut self, key: &[u8]) -> Option<RowLocation> {
        if !self.accepts(key) {
            return None;
        }
        let probe = R::probe(key);
        let (owned, packed) = self.map.remove_entry(&*probe)?;
        self.key_heap_bytes -= R::heap_bytes(&owned);
        Some(RowLocation::unpack(packed))
    }

    fn size(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.map.capacity()
    }

    fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.map.try_reserve(additional)
    }

    fn memory_usage(&self) -> usize {
        // one control byte per bucket in the std table
        let per_bucket = mem::size_of::<R::Key>() + mem::size_of::<u64>() + 1;
        self.map.capacity() * per_bucket + self.key_heap_bytes
    }
}
