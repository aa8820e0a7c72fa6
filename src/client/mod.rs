//! Client side of the query surface: an HTTP binding and the polling synchronizer
//! that keeps a participant's view of a room up to date.

mod api;
mod poller;

pub use self::api::{ClientError, HttpRoomApi, RoomApi};
pub use self::poller::{RoomPoller, SyncEvent};
