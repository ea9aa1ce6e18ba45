//! # Types
//!
//! Small shared types used throughout Luaprobe.

pub mod address;
pub mod fetch;

pub use address::Address;
pub use fetch::Fetched;
