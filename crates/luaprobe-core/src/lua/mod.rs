//! # Lua Runtime Layout
//!
//! What Luaprobe knows about the reference Lua implementation's in-memory
//! representation: which versions exist, how each one tags its values, and
//! how its string and closure objects are laid out.
//!
//! Supported versions are 5.1, 5.2, 5.3 and 5.4 built with the default
//! `luaconf.h` (`lua_Number` is `double`, `lua_Integer` is `long long`).

mod layout;
mod tags;
mod version;

pub(crate) use layout::{read_closure_is_c, read_closure_proto, read_tstring, read_tstring_contents};
pub use tags::RawTag;
pub use version::LuaVersion;

/// Strings up to this many bytes are interned "short" strings
///
/// Lua 5.1 does not record the split in memory, so the decoder applies this
/// threshold (`LUAI_MAXSHORTLEN` of later versions) itself.
pub const MAX_SHORT_STRING_LENGTH: u64 = 40;
