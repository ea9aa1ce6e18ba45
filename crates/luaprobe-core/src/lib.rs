//! # luaprobe-core
//!
//! Decoding of Lua runtime values from the raw memory of a process hosting a
//! Lua VM, without going through the VM's own API.
//!
//! This crate provides:
//! - A [`MemoryAccessor`] abstraction over remote memory, with a live Linux
//!   process implementation and an in-memory snapshot implementation
//! - A [`StructCursor`] that walks native C structs using alignment rules
//!   instead of hard-coded offsets
//! - The [`LuaValue`] model and the [`LuaDecoder`] that produces it
//! - Function prototype reading and a per-VM [`SymbolStore`]
//!
//! ## Snapshots, not views
//!
//! Everything decoded here is a copy of target memory at the time of the
//! read. Values and symbols may go stale as soon as the target runs again.
//!
//! ## Supported runtimes
//!
//! Lua 5.1 to 5.4 with the default `luaconf.h`, 32- or 64-bit targets of
//! either byte order.

pub mod cursor;
pub mod decode;
pub mod error;
pub mod function;
pub mod lua;
pub mod memory;
pub mod platform;
pub mod prelude;
pub mod symbols;
pub mod types;
pub mod value;

pub use cursor::StructCursor;
pub use decode::{DecodeOptions, LuaDecoder};
// Re-export commonly used types
pub use error::{ProbeError, ProbeResult};
pub use function::{FunctionMetadata, LuaFunctionData};
pub use lua::LuaVersion;
pub use memory::{MemoryAccessor, MemoryAccessorExt, PointerWidth, SnapshotMemory};
pub use symbols::SymbolStore;
pub use types::Address;
pub use value::LuaValue;
