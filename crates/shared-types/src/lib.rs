//! # Shared Types Crate
//!
//! Wire types for talking to a OneBot gateway daemon (LLOneBot, NapCat, ...)
//! over its forward WebSocket.
//!
//! ## Frame Shapes
//!
//! ```text
//! service ──{action, params, echo}──────────────────────→ gateway
//! service ←─{echo, status, data?, msg?}─────────────────  gateway   (response)
//! service ←─{post_type, message_type, ...}──────────────  gateway   (event)
//! ```
//!
//! - `ipc` holds the request/response frames.
//! - `events` holds inbound notifications and their classification.
//! - `entities` holds the payloads returned by actions.

pub mod entities;
pub mod errors;
pub mod events;
pub mod ipc;

pub use entities::*;
pub use errors::*;
pub use events::*;
pub use ipc::*;
