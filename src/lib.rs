//! Object identity table for Wayland-style display protocol backends.
//!
//! A [`Map`] tracks which protocol object id is currently bound to which
//! in-process payload on one side of a connection. Ids are partitioned into a
//! client-allocated half and a server-allocated half; a [`Map`] grows its own
//! half on [`insert_new`](Map::insert_new) and tracks the opposite half only
//! via [`insert_at`](Map::insert_at) / [`reserve_new`](Map::reserve_new).
//!
//! Destroying an object goes through [`zombify`](Map::zombify) rather than a
//! direct removal: a zombie slot still answers [`lookup_zombie`](Map::lookup_zombie)
//! so a caller can recognize and discard a message the peer sent before
//! learning the id was gone. Server-side zombies are bounded by a FIFO (see
//! [`MAX_ZOMBIE_LIST_COUNT`]) so a misbehaving peer can't grow the table
//! without limit; [`mark_deleted`](Map::mark_deleted) latches that bound off
//! once the peer acknowledges destruction through its own protocol.
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod interface;
mod map;

pub use error::MapError;
pub use interface::Interface;
pub use map::{Map, Side, MAX_OBJECTS, MAX_ZOMBIE_LIST_COUNT, SERVER_ID_START};
