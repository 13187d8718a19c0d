//! Room Registry: a two-tier generational slot map keyed by 32-bit room
//! keys, logically `(generation:8, major:8, minor:16)`.
//!
//! Grounded in `examples/original_source/server/slotMap.h`'s `SlotMap`:
//! pages of `u16::MAX + 1` entries, a per-page free list of reclaimed
//! minor indices, and generation bumps on reclaim that invalidate
//! outstanding keys. Concretized per spec.md §5's multi-threaded-runtime
//! clause as a single `Mutex`-guarded structure; each slot stores only a
//! channel handle to the room's actor task, never game state itself.

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::RoomError;
use crate::session::RoomEvent;

const PAGE_SIZE: usize = u16::MAX as usize + 1;
const MAX_PAGES: usize = u8::MAX as usize + 1;

/// A stable handle to a room, as seen from outside. Opaque beyond its
/// ability to round-trip through [`Registry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Key {
    generation: u8,
    major: u8,
    minor: u16,
}

impl Key {
    pub fn to_u32(self) -> u32 {
        (u32::from(self.generation) << 24) | (u32::from(self.major) << 16) | u32::from(self.minor)
    }

    pub fn from_u32(v: u32) -> Self {
        Self {
            generation: (v >> 24) as u8,
            major: (v >> 16) as u8,
            minor: v as u16,
        }
    }
}

struct Slot {
    generation: u8,
    handle: Option<UnboundedSender<RoomEvent>>,
}

struct Page {
    slots: Vec<Slot>,
    free_list: Vec<u16>,
}

impl Page {
    fn new() -> Self {
        Self { slots: Vec::new(), free_list: Vec::new() }
    }
}

/// The process-wide registry. A single instance is leaked to `'static` at
/// startup and shared by every connection handler.
pub struct Registry {
    pages: Mutex<Vec<Page>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { pages: Mutex::new(Vec::new()) }
    }

    /// Allocates a fresh slot and installs `handle` as its room-actor
    /// channel, returning the key clients will use to address it.
    pub fn insert(&self, handle: UnboundedSender<RoomEvent>) -> Key {
        let mut pages = self.pages.lock().expect("registry mutex poisoned");

        for (major, page) in pages.iter_mut().enumerate() {
            if let Some(minor) = page.free_list.pop() {
                let slot = &mut page.slots[minor as usize];
                slot.handle = Some(handle);
                return Key { generation: slot.generation, major: major as u8, minor };
            }
            if page.slots.len() < PAGE_SIZE {
                let minor = page.slots.len() as u16;
                page.slots.push(Slot { generation: 0, handle: Some(handle) });
                return Key { generation: 0, major: major as u8, minor };
            }
        }

        assert!(pages.len() < MAX_PAGES, "room registry exhausted all {MAX_PAGES} pages");
        let mut page = Page::new();
        page.slots.push(Slot { generation: 0, handle: Some(handle) });
        let major = pages.len() as u8;
        pages.push(page);
        Key { generation: 0, major, minor: 0 }
    }

    /// Looks up a room's channel handle by key. Returns `RoomError::RoomNotFound`
    /// if the page/slot is out of range or the stored generation has moved on.
    pub fn lookup(&self, key: Key) -> Result<UnboundedSender<RoomEvent>, RoomError> {
        let pages = self.pages.lock().expect("registry mutex poisoned");
        let page = pages.get(key.major as usize).ok_or(RoomError::RoomNotFound)?;
        let slot = page.slots.get(key.minor as usize).ok_or(RoomError::RoomNotFound)?;
        if slot.generation != key.generation {
            return Err(RoomError::RoomNotFound);
        }
        slot.handle.clone().ok_or(RoomError::RoomNotFound)
    }

    /// Reclaims a slot: bumps its generation (invalidating `key` and every
    /// other outstanding copy of it) and returns the minor index to its
    /// page's free list. Safe to call from within the room actor whose own
    /// slot is being reclaimed — it touches only the registry's mutex, never
    /// the actor's own task.
    pub fn reclaim(&self, key: Key) {
        let mut pages = self.pages.lock().expect("registry mutex poisoned");
        let Some(page) = pages.get_mut(key.major as usize) else { return };
        let Some(slot) = page.slots.get_mut(key.minor as usize) else { return };
        if slot.generation != key.generation {
            return;
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.handle = None;
        page.free_list.push(key.minor);
    }

    pub fn live_room_count(&self) -> usize {
        let pages = self.pages.lock().expect("registry mutex poisoned");
        pages
            .iter()
            .map(|page| page.slots.iter().filter(|s| s.handle.is_some()).count())
            .sum()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
