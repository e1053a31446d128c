//! # Sprout
//!
//! An unattended client for a browser farming game: one long-lived
//! websocket session, request/response correlation over it, and a set of
//! timer and push driven loops that keep a farm tended.
//!
//! ## Core Concepts
//!
//! - [`Session`] owns the socket. Requests carry a client sequence number;
//!   responses are matched back to their caller by the [`Correlator`].
//! - Server pushes become [`Notification`]s, fanned out by the
//!   [`EventRouter`] without ever blocking the receive loop.
//! - The [`analyzer`] turns a land snapshot into action sets. It is pure and
//!   knows nothing about the network.
//! - Orchestrators in [`scheduler`] fetch, analyze and act, guarded so a
//!   timer tick and a push never run the same cycle twice at once.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────── GameClient (typed calls) ◄─────────────┐
//!                 │                                                        │
//!                 ▼ request()                                              │
//! Session ── writer lock ──► socket ──► gate server                       │
//!    │                                     │                              │
//!    │ receive loop ◄──────────────────────┘                              │
//!    │                                                                    │
//!    ├─► Response ──► Correlator.resolve() ──► waiting caller             │
//!    │                                                                    │
//!    └─► Notify ──► Notification ──► EventRouter.publish()                │
//!                                        │                                │
//!                     ┌──────────────────┼───────────────┐                │
//!                     ▼                  ▼               ▼                │
//!               FarmOrchestrator   TaskOrchestrator   (binary)            │
//!                     │                                                   │
//!                     └─► analyze() ─► water/weed/insect ─► harvest ──────┘
//!                                      ─► clear ─► buy ─► plant ─► fertilize
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Sequence numbers only grow** within a session
//! 2. **At most one delivery per sequence** - late replies are dropped
//! 3. **Frames are handled in arrival order** by a single receive loop
//! 4. **Malformed frames are logged and skipped**, never fatal
//! 5. **`Disconnected` fires once**, however the session ends
//! 6. **Every unlocked plot lands in exactly one partition** of the analysis
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sprout_core::{
//!     Config, EventRouter, GameClient, ServerClock, Session, UserState, WsConnector,
//! };
//!
//! let config = Config::default();
//! let session = Session::new(Arc::new(EventRouter::new()), Arc::new(UserState::new()));
//! let connector = WsConnector::new(&config.server, "login-code")?;
//! let receive_loop = session.connect(&connector).await?;
//!
//! let client = GameClient::new(session.clone(), Arc::new(ServerClock::new()), &config);
//! let account = client.login(&config.device).await?;
//! let lands = client.all_lands().await?;
//! ```

pub mod analyzer;
pub mod catalog;
mod client;
mod clock;
pub mod codec;
mod config;
mod correlator;
mod error;
pub mod proto;
pub mod quota;
mod router;
pub mod scheduler;
pub mod seeds;
mod session;
mod state;
pub mod transport;

// Re-export session plumbing
pub use correlator::{Correlator, Reply, WaitHandle};
pub use session::{Session, SessionState};
pub use transport::{Connector, FrameSink, FrameSource, Link, WsConnector};

// Re-export error types
pub use error::{DecodeError, Result, SessionError};

// Re-export notification types
pub use router::{EventRouter, Handler, Notification, NotificationKind, SubscriptionId};

// Re-export the typed client and shared state
pub use client::{GameClient, Timeouts};
pub use clock::{to_time_sec, ServerClock};
pub use state::{Account, AccountDelta, UserState};

// Re-export configuration
pub use config::{
    Config, ConfigError, DeviceConfig, FarmConfig, FriendConfig, HeartbeatConfig, Overrides,
    Platform, ServerConfig, TaskConfig, WarehouseConfig,
};

// Re-export collaborators
pub use catalog::{Catalog, CatalogError, GameData, NoRecommendation, SeedRecommendation, SeedRecommender};
pub use quota::{Operation, OperationIds, QuotaBook};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
