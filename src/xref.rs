//! Cross-reference table.
//!
//! Each revision of a PDF file carries its own table mapping object numbers
//! to byte offsets (or free-list links). Revisions chain through `parent`:
//! a lookup that misses the newest table falls back to the previous
//! revision, so an incrementally-updated file resolves every object without
//! merging tables.

use crate::error::{Error, Result};
use crate::object::ObjectRef;
use std::collections::HashMap;
use std::rc::Rc;

/// The free-list head entry mandated by the file format (`0 65535`).
pub const FREE_LIST_HEAD: ObjectRef = ObjectRef { num: 0, gen: 65535 };

/// One cross-reference entry, keyed by object number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry {
    /// Object body lives at `offset`; valid for generation `gen`.
    InUse {
        /// Byte offset of the object within the file
        offset: u64,
        /// Generation number the entry is valid for
        gen: u16,
    },
    /// Object slot is free; `next_free` links the free list, `gen` is the
    /// generation a reused slot would carry.
    Free {
        /// Object number of the next free slot (0 terminates the list)
        next_free: u32,
        /// Generation number for reuse
        gen: u16,
    },
}

/// Cross-reference table for one revision, chained to the previous one.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: HashMap<u32, TableEntry>,
    parent: Option<Rc<ReferenceTable>>,
}

impl ReferenceTable {
    /// Create an empty table chained to an optional previous revision.
    pub fn new(parent: Option<Rc<ReferenceTable>>) -> Self {
        Self { entries: HashMap::new(), parent }
    }

    /// Record an entry for an object number. Within one revision the last
    /// subsection wins (matches reader behavior for overlapping sections).
    pub fn insert(&mut self, num: u32, entry: TableEntry) {
        self.entries.insert(num, entry);
    }

    /// Number of entries recorded in this revision (parent excluded).
    pub fn local_len(&self) -> usize {
        self.entries.len()
    }

    /// The previous revision's table, if any.
    pub fn parent(&self) -> Option<&Rc<ReferenceTable>> {
        self.parent.as_ref()
    }

    /// Look up an object number, deferring to previous revisions on a miss.
    pub fn lookup(&self, num: u32) -> Option<TableEntry> {
        match self.entries.get(&num) {
            Some(entry) => Some(*entry),
            None => self.parent.as_ref().and_then(|p| p.lookup(num)),
        }
    }

    /// Byte offset of an in-use object.
    ///
    /// # Errors
    ///
    /// Fails if the object is unknown, freed, or recorded for a different
    /// generation.
    pub fn get_offset(&self, r: ObjectRef) -> Result<u64> {
        match self.lookup(r.num) {
            Some(TableEntry::InUse { offset, gen }) if gen == r.gen => Ok(offset),
            Some(TableEntry::InUse { gen, .. }) => Err(Error::Malformed(format!(
                "object {} recorded with generation {}",
                r, gen
            ))),
            Some(TableEntry::Free { .. }) => {
                Err(Error::Malformed(format!("object {} is free", r)))
            },
            None => Err(Error::Malformed(format!("object {} not in cross-reference table", r))),
        }
    }

    /// Next free object number after a free entry.
    ///
    /// A missing `0 65535` free-list head means the file has no free
    /// objects; that case yields the list terminator instead of an error.
    pub fn get_next_free(&self, r: ObjectRef) -> Result<u32> {
        match self.lookup(r.num) {
            Some(TableEntry::Free { next_free, .. }) => Ok(next_free),
            Some(TableEntry::InUse { .. }) => {
                Err(Error::Malformed(format!("object {} is in use, not free", r)))
            },
            None if r == FREE_LIST_HEAD => {
                log::debug!("no free-list head entry; treating free list as empty");
                Ok(0)
            },
            None => Err(Error::Malformed(format!("object {} not in cross-reference table", r))),
        }
    }

    /// Generation number a freed slot would carry if reused.
    pub fn get_new_generation(&self, num: u32) -> Result<u16> {
        match self.lookup(num) {
            Some(TableEntry::Free { gen, .. }) => Ok(gen),
            Some(TableEntry::InUse { gen, .. }) => Ok(gen),
            None => Err(Error::Malformed(format!(
                "object {} not in cross-reference table",
                num
            ))),
        }
    }
}

/// Everything a factory needs to lazily materialize objects from a loaded
/// file: the raw bytes and the newest revision's table.
#[derive(Debug, Clone)]
pub struct Context {
    /// Full file contents
    pub buf: bytes::Bytes,
    /// Newest revision's cross-reference table (chained to older ones)
    pub table: Rc<ReferenceTable>,
}
