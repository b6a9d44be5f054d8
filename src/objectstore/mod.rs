//! Object Store: a small distributed key/byte store layered on the
//! network simulator, routed by a consistent hash ring. Follows this
//! crate's general idiom throughout: owned state, `thiserror`-backed
//! errors via `net::NetError`.

pub mod client;
pub mod hashring;
pub mod message;
pub mod server;

pub use client::{Completion, ObjectStoreClient};
pub use hashring::HashRing;
pub use server::Server;
