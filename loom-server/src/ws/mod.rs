//! WebSocket module: the Subscription Composer's wire adapter.

mod subscribe;

pub use subscribe::subscribe_ws;
