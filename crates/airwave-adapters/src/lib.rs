//! # airwave-adapters
//!
//! Features that share one [`SessionManager`](airwave_session::SessionManager)
//! connection. Each adapter subscribes once, attaches a typed message
//! listener to every connection it is handed, and detaches on drop.
//!
//! - [`ChatAdapter`]: send and receive chat lines, rename
//! - [`ListenerCountAdapter`]: the live listener count
//! - [`PresenceAdapter`]: who is in the room
//! - [`ColorSyncAdapter`]: the shared theme color

#![deny(unsafe_code)]

mod attachment;
pub mod chat;
pub mod color;
pub mod listeners;
pub mod presence;

pub use chat::{ChatAdapter, ChatMessage};
pub use color::{ColorSyncAdapter, ColorUpdate, parse_hex_color};
pub use listeners::ListenerCountAdapter;
pub use presence::PresenceAdapter;
