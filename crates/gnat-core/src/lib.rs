//! # gnat-core
//!
//! Shared protocol state for a gnat connection.
//!
//! - **SubscriptionRegistry** - subscription id to handler, monotonic ids
//! - **SyncGate** - wakes a flushing caller when the server answers `PING`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  add/remove  ┌──────────────────────┐  lookup  ┌─────────────┐
//! │   Facade    │─────────────▶│ SubscriptionRegistry │◀─────────│  Read Loop  │
//! └─────────────┘              └──────────────────────┘          └─────────────┘
//!        │ acquire/wait        ┌──────────────────────┐  release        │
//!        └────────────────────▶│       SyncGate       │◀────────────────┘
//!                              └──────────────────────┘
//! ```

pub mod gate;
pub mod registry;

pub use gate::{GateError, ProbeTicket, SyncGate, DEFAULT_PROBE_TIMEOUT};
pub use registry::{MessageHandler, Sid, Subscription, SubscriptionRegistry};
