//! Per-session search slot table (C9): active `READDIR`/`READDIRPLUS`
//! enumerations keyed by a small integer slot id, and the cookie encoding
//! built on top of it (§4.9).

use std::sync::Mutex;

use tracing::warn;

use crate::protocol::xdr::nfs3::cookie3;

/// Two cookies are reserved and never allocated to a real slot: they name
/// the synthetic `.` and `..` entries every directory listing starts with.
pub const DOT_COOKIE: cookie3 = 0x00FF_FFFF;
pub const DOT_DOT_COOKIE: cookie3 = 0x00FF_FFFE;

const SLOT_SHIFT: u32 = 24;
const RESUME_ID_MASK: u64 = (1 << SLOT_SHIFT) - 1;

/// An in-progress directory enumeration: which directory, and where the
/// back end left off. `resume_id` is opaque to this table - it is whatever
/// the back end's pagination scheme produces (here, the `fileid3` of the
/// last entry returned, per `vfs::NFSFileSystem::readdir`'s `start_after`).
#[derive(Debug, Clone)]
pub struct Search {
    pub dir_id: u64,
    pub resume_id: u64,
    /// The directory's mtime at the start of the search, used as the
    /// cookie verifier (§4.9, §8 invariant 5).
    pub cookie_verifier: [u8; 8],
}

/// Allocates cookies as `(slot << 24) | resumeId`. Per §4.9, back ends are
/// required to keep `resumeId` under 2^24; this is enforced at encode time
/// by masking rather than by validating the back end (a back end that
/// violates the requirement simply loses information rather than
/// corrupting another slot's cookie).
pub fn encode_cookie(slot: usize, resume_id: u64) -> cookie3 {
    ((slot as u64) << SLOT_SHIFT) | (resume_id & RESUME_ID_MASK)
}

pub fn decode_cookie(cookie: cookie3) -> (usize, u64) {
    ((cookie >> SLOT_SHIFT) as usize, cookie & RESUME_ID_MASK)
}

/// Compares a stored cookie verifier against the value a client supplied,
/// accepting a byte-reversed match for compatibility with the historical bug
/// this server reproduces (`SPEC_FULL.md` §10.4, Open Question 2). Returns
/// `Some(true)` if only the reversed form matched, `Some(false)` for a plain
/// match, `None` if neither matches.
pub fn verifier_matches(stored: &[u8; 8], supplied: &[u8; 8]) -> Option<bool> {
    if stored == supplied {
        return Some(false);
    }
    let mut reversed = *supplied;
    reversed.reverse();
    (stored == &reversed).then_some(true)
}

struct Slots {
    slots: Vec<Option<Search>>,
}

/// Per-session pool of search slots (§4.9). `capacity` matches
/// `ServerConfig::search_slots` (default 256).
pub struct SearchSlotTable {
    capacity: usize,
    slots: Mutex<Slots>,
}

impl SearchSlotTable {
    pub fn new(capacity: usize) -> Self {
        SearchSlotTable { capacity, slots: Mutex::new(Slots { slots: Vec::new() }) }
    }

    /// Allocates the first free slot id (never 0, so a cookie's slot field
    /// being zero cannot be mistaken for an allocated search - a client
    /// handing back cookie 0 always means "start from the beginning").
    pub fn allocate(&self, search: Search) -> Option<usize> {
        let mut guard = self.slots.lock().unwrap();
        if let Some(free) = guard.slots.iter().skip(1).position(Option::is_none) {
            let slot = free + 1;
            guard.slots[slot] = Some(search);
            return Some(slot);
        }
        if guard.slots.is_empty() {
            guard.slots.push(None); // reserve slot 0
        }
        if guard.slots.len() >= self.capacity {
            warn!(capacity = self.capacity, "search slot table exhausted");
            return None;
        }
        guard.slots.push(Some(search));
        Some(guard.slots.len() - 1)
    }

    pub fn get(&self, slot: usize) -> Option<Search> {
        self.slots.lock().unwrap().slots.get(slot).and_then(|s| s.clone())
    }

    pub fn update(&self, slot: usize, search: Search) {
        let mut guard = self.slots.lock().unwrap();
        if let Some(entry) = guard.slots.get_mut(slot) {
            *entry = Some(search);
        }
    }

    pub fn free(&self, slot: usize) {
        let mut guard = self.slots.lock().unwrap();
        if let Some(entry) = guard.slots.get_mut(slot) {
            *entry = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(resume_id: u64) -> Search {
        Search { dir_id: 1, resume_id, cookie_verifier: [0; 8] }
    }

    #[test]
    fn allocate_get_free_roundtrip() {
        let table = SearchSlotTable::new(8);
        let slot = table.allocate(search(10)).unwrap();
        assert_ne!(slot, 0);
        assert_eq!(table.get(slot).unwrap().resume_id, 10);
        table.free(slot);
        assert!(table.get(slot).is_none());
    }

    #[test]
    fn cookie_roundtrips_slot_and_resume_id() {
        let cookie = encode_cookie(5, 12345);
        assert_eq!(decode_cookie(cookie), (5, 12345));
    }

    #[test]
    fn sentinel_cookies_are_reserved() {
        assert_eq!(decode_cookie(DOT_COOKIE).0, 0x00FF);
        assert_ne!(DOT_COOKIE, DOT_DOT_COOKIE);
    }

    #[test]
    fn verifier_matches_plain_and_reversed() {
        let stored = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(verifier_matches(&stored, &stored), Some(false));
        let mut reversed = stored;
        reversed.reverse();
        assert_eq!(verifier_matches(&stored, &reversed), Some(true));
        assert_eq!(verifier_matches(&stored, &[9; 8]), None);
    }

    #[test]
    fn reuses_freed_slots() {
        let table = SearchSlotTable::new(8);
        let a = table.allocate(search(1)).unwrap();
        table.free(a);
        let b = table.allocate(search(2)).unwrap();
        assert_eq!(a, b);
    }
}
