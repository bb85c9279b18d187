//! CLI command implementations.

pub mod logout;
pub mod run;
pub mod status;
