//! Type tag decoding.

use super::LuaVersion;

const LUA_TNIL: u8 = 0;
const LUA_TBOOLEAN: u8 = 1;
const LUA_TLIGHTUSERDATA: u8 = 2;
const LUA_TNUMBER: u8 = 3;
const LUA_TSTRING: u8 = 4;
const LUA_TTABLE: u8 = 5;
const LUA_TFUNCTION: u8 = 6;
const LUA_TUSERDATA: u8 = 7;
const LUA_TTHREAD: u8 = 8;

const COLLECTABLE_BIT: u8 = 1 << 6;

const fn variant(base: u8, index: u8) -> u8
{
    base | (index << 4)
}

/// Meaning of a raw type tag for a given Lua version
///
/// Some classifications need more than the tag: Lua 5.1 booleans and every
/// version before 5.4 keep the boolean in the payload, and Lua 5.1 keeps the
/// Lua/C closure split and the short/long string split out of the tag
/// entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTag
{
    /// `nil`, including Lua 5.4's empty-slot and absent-key variants
    Nil,
    /// Boolean stored as an `int` in the payload
    Boolean,
    /// Lua 5.4 `false` (no payload)
    False,
    /// Lua 5.4 `true` (no payload)
    True,
    /// Light userdata pointer
    LightUserData,
    /// `lua_Number`
    Float,
    /// `lua_Integer`
    Integer,
    /// String whose short/long split is not in the tag
    String,
    /// Interned short string
    ShortString,
    /// Long string
    LongString,
    /// Table
    Table,
    /// Closure whose Lua/C split is not in the tag
    Function,
    /// Lua closure
    LuaClosure,
    /// Light C function (bare function pointer)
    LightCFunction,
    /// C closure
    CClosure,
    /// Full userdata
    UserData,
    /// Coroutine
    Thread,
    /// Not a value tag for this version
    Unknown(u8),
}

impl RawTag
{
    /// Classify a raw tag read from a `TValue`
    ///
    /// ```rust
    /// use luaprobe_core::lua::{LuaVersion, RawTag};
    ///
    /// assert_eq!(RawTag::classify(LuaVersion::Lua53, 0x13), RawTag::Integer);
    /// assert_eq!(RawTag::classify(LuaVersion::Lua54, 0x13), RawTag::Float);
    /// assert_eq!(RawTag::classify(LuaVersion::Lua53, 0x45), RawTag::Table);
    /// ```
    pub fn classify(version: LuaVersion, tag: u8) -> Self
    {
        match version {
            LuaVersion::Lua51 => classify_51(tag),
            LuaVersion::Lua52 => classify_52(tag & !COLLECTABLE_BIT).unwrap_or(RawTag::Unknown(tag)),
            LuaVersion::Lua53 => classify_53(tag & !COLLECTABLE_BIT).unwrap_or(RawTag::Unknown(tag)),
            LuaVersion::Lua54 => classify_54(tag & !COLLECTABLE_BIT).unwrap_or(RawTag::Unknown(tag)),
        }
    }
}

fn classify_51(tag: u8) -> RawTag
{
    match tag {
        LUA_TNIL => RawTag::Nil,
        LUA_TBOOLEAN => RawTag::Boolean,
        LUA_TLIGHTUSERDATA => RawTag::LightUserData,
        LUA_TNUMBER => RawTag::Float,
        LUA_TSTRING => RawTag::String,
        LUA_TTABLE => RawTag::Table,
        LUA_TFUNCTION => RawTag::Function,
        LUA_TUSERDATA => RawTag::UserData,
        LUA_TTHREAD => RawTag::Thread,
        other => RawTag::Unknown(other),
    }
}

// Tags shared by 5.2 onwards once the collectable bit is stripped.
fn classify_common(tag: u8) -> Option<RawTag>
{
    let kind = match tag {
        LUA_TLIGHTUSERDATA => RawTag::LightUserData,
        t if t == variant(LUA_TSTRING, 0) => RawTag::ShortString,
        t if t == variant(LUA_TSTRING, 1) => RawTag::LongString,
        LUA_TTABLE => RawTag::Table,
        t if t == variant(LUA_TFUNCTION, 0) => RawTag::LuaClosure,
        t if t == variant(LUA_TFUNCTION, 1) => RawTag::LightCFunction,
        t if t == variant(LUA_TFUNCTION, 2) => RawTag::CClosure,
        LUA_TUSERDATA => RawTag::UserData,
        LUA_TTHREAD => RawTag::Thread,
        _ => return None,
    };
    Some(kind)
}

fn classify_52(tag: u8) -> Option<RawTag>
{
    match tag {
        LUA_TNIL => Some(RawTag::Nil),
        LUA_TBOOLEAN => Some(RawTag::Boolean),
        LUA_TNUMBER => Some(RawTag::Float),
        other => classify_common(other),
    }
}

fn classify_53(tag: u8) -> Option<RawTag>
{
    match tag {
        LUA_TNIL => Some(RawTag::Nil),
        LUA_TBOOLEAN => Some(RawTag::Boolean),
        t if t == variant(LUA_TNUMBER, 0) => Some(RawTag::Float),
        t if t == variant(LUA_TNUMBER, 1) => Some(RawTag::Integer),
        other => classify_common(other),
    }
}

fn classify_54(tag: u8) -> Option<RawTag>
{
    match tag {
        t if t == variant(LUA_TNIL, 0) || t == variant(LUA_TNIL, 1) || t == variant(LUA_TNIL, 2) => {
            Some(RawTag::Nil)
        }
        t if t == variant(LUA_TBOOLEAN, 0) => Some(RawTag::False),
        t if t == variant(LUA_TBOOLEAN, 1) => Some(RawTag::True),
        t if t == variant(LUA_TNUMBER, 0) => Some(RawTag::Integer),
        t if t == variant(LUA_TNUMBER, 1) => Some(RawTag::Float),
        other => classify_common(other),
    }
}
