//! # msgr-core
//!
//! Pure logic for the msgr delta-sync protocol: the connection/queue
//! state machine and the delta decoder. No I/O happens here; the
//! client crate interprets the actions this crate produces, which keeps
//! every protocol rule unit-testable without mocks or a runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decode;
pub mod state;

pub use decode::{decode_frame, DecodedFrame, DeltaEvent};
pub use state::{Action, Event, ProtocolState, SyncEvent};
