//! Device identity generation.
//!
//! The identifier is generated exactly once, when a loaded session
//! lacks one, and the controller persists it before any network call.
//! The generation algorithm itself is an implementation detail; the
//! protocol only needs a stable opaque string.

/// Produce a fresh opaque device identifier.
pub fn generate_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
