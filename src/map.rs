//! The object identity table
//!
//! Tracks which protocol object id is bound to which in-process payload, and which
//! ids have been destroyed locally but may still be named by a message the peer
//! sent before it learned of the destruction.

use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::sync::OnceLock;

use crate::error::MapError;

/// Limit separating server-allocated from client-allocated object ids.
pub const SERVER_ID_START: u32 = 0xFF00_0000;

/// Ids whose index would land at or beyond this bound can never be allocated.
pub const MAX_OBJECTS: u32 = 0xF000_0000;

/// Default cap on the number of server-side zombies kept before the oldest is
/// reaped to the free list, absent a `WAYLAND_MAX_ZOMBIE_LIST_COUNT` override.
pub const MAX_ZOMBIE_LIST_COUNT: i32 = 64;

const FLAGS_MASK: u32 = 0x1FFF_FFFF;
const NULL_LINK: u32 = u32::MAX;

static ZOMBIE_CAP: OnceLock<i32> = OnceLock::new();

fn zombie_cap() -> i32 {
    *ZOMBIE_CAP.get_or_init(|| match std::env::var("WAYLAND_MAX_ZOMBIE_LIST_COUNT") {
        Ok(val) if !val.is_empty() => val.parse().unwrap_or_else(|_| {
            #[cfg(feature = "log")]
            log::warn!(
                "wayland-idmap: WAYLAND_MAX_ZOMBIE_LIST_COUNT={val:?} is not a valid integer, \
                 falling back to the default of {MAX_ZOMBIE_LIST_COUNT}"
            );
            MAX_ZOMBIE_LIST_COUNT
        }),
        _ => MAX_ZOMBIE_LIST_COUNT,
    })
}

/// Which half of the id space a table grows into, or which half an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Ids `1 .. SERVER_ID_START`.
    Client,
    /// Ids `SERVER_ID_START ..`.
    Server,
}

#[derive(Debug)]
enum State<P, I> {
    /// A live object: a payload is bound and lookups succeed.
    Live { payload: P, flags: u32 },
    /// Destroyed locally; `interface` lets a caller still parse and discard a
    /// message the peer sent before it learned of the destruction. `fifo_next`
    /// links the slot into the zombie FIFO; `NULL_LINK` if untracked.
    Zombie { interface: I, fifo_next: u32 },
    /// Reused by the peer's `reserve_new`, but not yet materialized via `insert_at`.
    Reserved,
    /// Reusable by the next `insert_new`; `next` links the free list.
    Freelisted { next: u32 },
    /// The peer has acknowledged destruction (`delete_id`), but the slot has not
    /// (yet) been folded into the free list — see `zombify`'s Deleted shortcut.
    Deleted,
}

/// The object identity table for one side of a Wayland-style connection.
///
/// See the [module docs](self) for the state machine each slot goes through.
/// `Map` is generic over the payload type `P` bound to live objects and the
/// interface-metadata type `I` kept for zombies. [`Interface`](crate::Interface)
/// is a natural choice for `I`, but any `Clone` type works for either parameter.
#[derive(Debug)]
pub struct Map<P, I> {
    side: Side,
    client_entries: Vec<State<P, I>>,
    server_entries: Vec<State<P, I>>,
    free_list: u32,
    zombie_head: u32,
    zombie_tail: u32,
    zombie_list_count: i32,
}

impl<P, I> Map<P, I> {
    /// Create a new, empty table for the given side of a connection.
    pub fn new(side: Side) -> Self {
        Map {
            side,
            client_entries: Vec::new(),
            server_entries: Vec::new(),
            free_list: NULL_LINK,
            zombie_head: NULL_LINK,
            zombie_tail: NULL_LINK,
            zombie_list_count: 0,
        }
    }

    /// The side this table was constructed for.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Current value of the zombie FIFO counter: `-1` once permanently latched
    /// off by [`mark_deleted`](Self::mark_deleted), otherwise the number of
    /// server-side zombies currently tracked by the FIFO.
    #[inline]
    pub fn zombie_list_count(&self) -> i32 {
        self.zombie_list_count
    }

    fn decode(id: u32) -> (Side, u32) {
        if id < SERVER_ID_START {
            (Side::Client, id)
        } else {
            (Side::Server, id - SERVER_ID_START)
        }
    }

    fn entries(&self, half: Side) -> &Vec<State<P, I>> {
        match half {
            Side::Client => &self.client_entries,
            Side::Server => &self.server_entries,
        }
    }

    fn entries_mut(&mut self, half: Side) -> &mut Vec<State<P, I>> {
        match half {
            Side::Client => &mut self.client_entries,
            Side::Server => &mut self.server_entries,
        }
    }

    /// Allocate a new id in this table's own half and bind `payload` to it.
    ///
    /// Returns `0` on failure (the id space for this half is exhausted). On a
    /// [`Side::Client`] table, `0` is *also* the id returned by the very first
    /// successful call — this mirrors the source's calling convention bit for
    /// bit and is not a bug; see `DESIGN.md` OQ-2.
    pub fn insert_new(&mut self, flags: u32, payload: P) -> u32 {
        let flags = flags & FLAGS_MASK;
        let (half, base) = match self.side {
            Side::Client => (Side::Client, 0u32),
            Side::Server => (Side::Server, SERVER_ID_START),
        };

        if self.free_list != NULL_LINK {
            let index = self.free_list;
            let next = match self.entries(half)[index as usize] {
                State::Freelisted { next } => next,
                _ => unreachable!("free list points at a non-freelisted slot"),
            };
            self.free_list = next;
            self.entries_mut(half)[index as usize] = State::Live { payload, flags };
            return index + base;
        }

        let index = self.entries(half).len() as u32;
        if index > MAX_OBJECTS {
            #[cfg(feature = "log")]
            log::warn!("wayland-idmap: {half:?} object id space exhausted at index {index}");
            // The slot is still consumed so later allocations land past it; it can
            // never be reused since it is never linked into the free list.
            self.entries_mut(half).push(State::Deleted);
            return 0;
        }

        self.entries_mut(half).push(State::Live { payload, flags });
        index + base
    }

    /// Materialize a specific id chosen by the peer, clobbering whatever was
    /// previously stored at that slot.
    pub fn insert_at(&mut self, flags: u32, id: u32, payload: P) -> Result<(), MapError> {
        let flags = flags & FLAGS_MASK;
        let (half, index) = Self::decode(id);
        debug_assert!(
            half == Side::Server || id == 0 || self.side == Side::Server,
            "insert_at with a nonzero client id is only meaningful on a server-side table"
        );

        if index > MAX_OBJECTS {
            return Err(MapError::NoSpace);
        }

        let entries = self.entries_mut(half);
        let len = entries.len() as u32;
        match index.cmp(&len) {
            Ordering::Greater => Err(MapError::Invalid),
            Ordering::Equal => {
                entries.push(State::Live { payload, flags });
                Ok(())
            }
            Ordering::Less => {
                entries[index as usize] = State::Live { payload, flags };
                Ok(())
            }
        }
    }

    /// Pre-reserve an id the peer allocated in the opposite half, ahead of the
    /// `insert_at` that will actually materialize it.
    pub fn reserve_new(&mut self, id: u32) -> Result<(), MapError> {
        let (half, index) = Self::decode(id);
        if half == self.side {
            return Err(MapError::Invalid);
        }
        if index > MAX_OBJECTS {
            return Err(MapError::NoSpace);
        }

        let entries = self.entries_mut(half);
        let len = entries.len() as u32;
        match index.cmp(&len) {
            Ordering::Greater => Err(MapError::Invalid),
            Ordering::Equal => {
                entries.push(State::Reserved);
                Ok(())
            }
            Ordering::Less => {
                // Zombies are not reusable by reserve_new, only Freelisted slots are.
                match entries[index as usize] {
                    State::Freelisted { .. } => Ok(()),
                    _ => Err(MapError::Invalid),
                }
            }
        }
    }

    /// Destroy the object locally while keeping `interface` around so a
    /// late-arriving message naming `id` can still be recognized and discarded.
    pub fn zombify(&mut self, id: u32, interface: I) -> Result<(), MapError> {
        if id == 0 {
            return Err(MapError::Invalid);
        }
        let (half, index) = Self::decode(id);
        let idx = index as usize;

        if idx >= self.entries(half).len() {
            return Err(MapError::OutOfRange);
        }

        if matches!(self.entries(half)[idx], State::Deleted) {
            // The peer already acknowledged this id's destruction; skip the
            // zombie stage entirely and make the slot reusable now.
            let next = self.free_list;
            self.entries_mut(half)[idx] = State::Freelisted { next };
            self.free_list = index;
            return Ok(());
        }

        self.entries_mut(half)[idx] = State::Zombie { interface, fifo_next: NULL_LINK };

        let use_fifo =
            half == Side::Server && self.side == Side::Server && self.zombie_list_count >= 0;
        if !use_fifo {
            return Ok(());
        }

        let cap = zombie_cap();
        if self.zombie_tail != NULL_LINK {
            let tail = self.zombie_tail as usize;
            if let State::Zombie { fifo_next, .. } = &mut self.entries_mut(half)[tail] {
                *fifo_next = index;
            }
        } else {
            self.zombie_head = index;
        }
        self.zombie_tail = index;
        self.zombie_list_count += 1;

        if self.zombie_list_count > cap {
            let evict = self.zombie_head as usize;
            let next_head = match self.entries(half)[evict] {
                State::Zombie { fifo_next, .. } => fifo_next,
                _ => NULL_LINK,
            };
            self.zombie_head = next_head;
            if self.zombie_head == NULL_LINK {
                self.zombie_tail = NULL_LINK;
            }
            self.zombie_list_count -= 1;
            let next = self.free_list;
            self.entries_mut(half)[evict] = State::Freelisted { next };
            self.free_list = evict as u32;
        }

        Ok(())
    }

    /// Record that the peer has acknowledged destruction of `id` (a
    /// `delete_id`-style handshake). A no-op success if `id` is not in this
    /// table's own half — the peer never acknowledges destruction of ids it
    /// didn't allocate.
    pub fn mark_deleted(&mut self, id: u32) -> Result<(), MapError> {
        let (half, index) = Self::decode(id);
        if half != self.side {
            return Ok(());
        }
        let idx = index as usize;
        if idx >= self.entries(half).len() {
            return Err(MapError::OutOfRange);
        }

        #[cfg(feature = "log")]
        if self.zombie_list_count != -1 {
            log::trace!("wayland-idmap: zombie FIFO latched off by mark_deleted({id:#x})");
        }
        self.zombie_list_count = -1;

        let was_zombie = matches!(self.entries(half)[idx], State::Zombie { .. });
        if was_zombie {
            let next = self.free_list;
            self.entries_mut(half)[idx] = State::Freelisted { next };
            self.free_list = index;
        } else {
            self.entries_mut(half)[idx] = State::Deleted;
        }
        Ok(())
    }

    /// Visit every live `(payload, flags)` pair, client-half then server-half,
    /// in index order. Stops early if `f` returns [`ControlFlow::Break`].
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&P, u32) -> ControlFlow<()>,
    {
        for entries in [&self.client_entries, &self.server_entries] {
            for state in entries {
                if let State::Live { payload, flags } = state {
                    if f(payload, *flags).is_break() {
                        return;
                    }
                }
            }
        }
    }
}

impl<P: Clone, I: Clone> Map<P, I> {
    /// The live payload bound to `id`, or `None` for any non-live state.
    ///
    /// `id == 0` is not special-cased: it indexes slot `0` of the client half
    /// like any other id, which is how a `Side::Client` table's first
    /// `insert_new` (see OQ-2) stays visible to `lookup`.
    pub fn lookup(&self, id: u32) -> Option<P> {
        let (half, index) = Self::decode(id);
        match self.entries(half).get(index as usize)? {
            State::Live { payload, .. } => Some(payload.clone()),
            _ => None,
        }
    }

    /// The interface metadata kept for `id` if it is currently a zombie.
    pub fn lookup_zombie(&self, id: u32) -> Option<I> {
        let (half, index) = Self::decode(id);
        match self.entries(half).get(index as usize)? {
            State::Zombie { interface, .. } => Some(interface.clone()),
            _ => None,
        }
    }

    /// The low 29 bits of flags stored for `id`, or `0` unless it is live.
    pub fn lookup_flags(&self, id: u32) -> u32 {
        let (half, index) = Self::decode(id);
        match self.entries(half).get(index as usize) {
            Some(State::Live { flags, .. }) => *flags,
            _ => 0,
        }
    }
}
