//! Room relay - pairs two clients and forwards table snapshots between them

pub mod room;
pub mod service;

pub use room::{Room, RoomId};
pub use service::{RelayError, RelayService, RoomInfo};
