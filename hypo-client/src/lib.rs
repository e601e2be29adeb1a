//! hypo-client: client library for the hypo A/B testing service
//!
//! This crate resolves which experiment group the current user belongs to
//! and reports analytics events:
//!
//! - **Identity** - [`IdentityStore`] mints and persists an anonymous user id
//! - **Assignment cache** - [`AssignmentCache`] serves assignments while they
//!   are unexpired and belong to the current identity
//! - **Assignment** - [`AssignmentClient`] fetches fresh assignments and
//!   adopts identities issued by the backend
//! - **Events** - [`EventReporter`] delivers events fire-and-forget when it can
//! - **Transport** - [`Dispatcher`] enforces the request timeout over any
//!   [`Transport`]
//!
//! State lives in a [`KeyValueStore`](storage::KeyValueStore): in memory,
//! in a file, or in the cookies of an [`EdgeContext`].
//!
//! # Quick Start
//!
//! ```no_run
//! use hypo_client::{ConfigOverrides, EventOptions, HypoClient};
//!
//! async fn example() -> hypo_client::Result<()> {
//!     let client = HypoClient::builder()
//!         .overrides(ConfigOverrides {
//!             project: Some("my-project".to_string()),
//!             ..Default::default()
//!         })
//!         .build();
//!
//!     let assignment = client.group_assignment("checkout-button").await?;
//!     println!("in group {}", assignment.group);
//!
//!     client
//!         .event("purchase", EventOptions::default().revenue(9.99))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     HypoClient                        │
//! │  ┌──────────────────────┐  ┌───────────────────────┐ │
//! │  │   AssignmentClient   │  │     EventReporter     │ │
//! │  └──────────┬───────────┘  └───────────┬───────────┘ │
//! │             │                          │             │
//! │  ┌──────────▼───────────┐              │             │
//! │  │   AssignmentCache    │              │             │
//! │  └──────────┬───────────┘              │             │
//! │  ┌──────────▼──────────────────────────▼───────────┐ │
//! │  │        IdentityStore          Dispatcher        │ │
//! │  └──────────┬──────────────────────────┬───────────┘ │
//! └─────────────┼──────────────────────────┼─────────────┘
//!               ▼                          ▼
//!         KeyValueStore                Transport
//!   (memory / file / cookie)     (reqwest / mock, beacon)
//! ```

pub mod assignment;
pub mod cache;
mod client;
pub mod clock;
pub mod config;
pub mod context;
mod error;
pub mod events;
pub mod identity;
pub mod storage;
pub mod transport;

// Re-export key types for convenience
pub use assignment::AssignmentClient;
pub use cache::{Assignment, AssignmentCache};
pub use client::{HypoClient, HypoClientBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AssignmentMethod, ClientConfig, ConfigHandle, ConfigOverrides, IdentityMode};
pub use context::EdgeContext;
pub use error::{Error, FailureKind, Result};
pub use events::{EventOptions, EventReporter};
pub use identity::IdentityStore;
pub use storage::{CookieStore, FileStore, KeyValueStore, MemoryStore, NullStore};
pub use transport::{
    Beacon, Delivery, Dispatcher, HttpTransport, MockTransport, Request, Transport,
};
