//! # msgr-client
//!
//! Client library for the msgr delta-sync protocol.
//!
//! This is the library applications embed to receive a live, normalized
//! message feed:
//!
//! - **Session persistence**: device identity and credential tokens in
//!   a JSON record, written atomically.
//! - **Pluggable collaborators**: the authenticated request layer
//!   ([`AuthApi`]) and the streaming pub/sub transport
//!   ([`SyncTransport`]) are traits; mocks ship in-crate.
//! - **Pure state machine**: protocol rules live in msgr-core; this
//!   crate interprets the actions and performs the I/O.
//! - **Event bus**: decoded messages and diagnostics are republished on
//!   an in-process [`EventBus`].
//!
//! ## Example
//!
//! ```ignore
//! use msgr_client::{Credentials, SyncController, MockAuthApi, MockTransport, SessionStore};
//!
//! let store = SessionStore::new("session.json");
//! let mut controller = SyncController::new(
//!     Credentials::new("a@b.com", "secret"),
//!     store,
//!     MockAuthApi::new(),
//!     MockTransport::new(),
//! );
//! controller.bus().subscribe_messages(|msg| println!("{msg:?}"));
//! controller.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod bus;
pub mod controller;
pub mod device;
pub mod store;
pub mod transport;

pub use auth::{AuthApi, AuthError, MockAuthApi};
pub use bus::{Diagnostic, EventBus};
pub use controller::{ClientError, Credentials, ShutdownHandle, SyncController};
pub use store::{SessionStore, StorageError};
pub use transport::{MockTransport, SyncTransport, TransportError, TransportEvent};
