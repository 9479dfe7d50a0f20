//! # Shared Bus - Event Bus for Gateway Notifications
//!
//! A process-wide registry of named channels. The gateway bridge publishes
//! inbound events and link transitions here; route handlers and background
//! tasks subscribe to the channels they care about.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Bridge     │                    │  Listener    │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery Rules
//!
//! - Channels must be created before use; `create` is idempotent.
//! - Listeners run synchronously, in registration order, each receiving its
//!   own clone of the payload.
//! - A failing or panicking listener is logged and skipped; the remaining
//!   listeners still run.
//! - `publish` works on a snapshot of the listener list: a listener removed
//!   while a publish is in flight still sees that event, and no later ones.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BusEvent, Channel};
pub use publisher::{BusError, EventBus};
pub use subscriber::{EventStream, ListenerError, ListenerHandle, ListenerResult};
