//! # Value Decoder
//!
//! Turns `TValue` cells in target memory into [`LuaValue`]s.
//!
//! A `TValue` is an 8-byte `Value` union followed by a type tag (`int` before
//! Lua 5.4, a single byte in 5.4). The decoder walks it with a
//! [`StructCursor`], classifies the tag for the configured [`LuaVersion`], and
//! reads whatever payload that tag implies.
//!
//! ## Failure policy
//!
//! Decoding never returns an error. An unreadable tag, an unreadable payload,
//! or an unknown tag all produce a [`LuaValue::error`] describing what went
//! wrong, so decoding a run of values (a stack slice, a table's array part)
//! keeps going past a bad entry.

use tracing::{debug, trace, warn};

use crate::cursor::StructCursor;
use crate::lua::{self, LuaVersion, RawTag};
use crate::memory::{MemoryAccessor, MemoryAccessorExt};
use crate::types::Address;
use crate::value::{LuaValue, StringKind};

/// Default cap on decoded string length
pub const DEFAULT_MAX_STRING_LENGTH: usize = 32 * 1024;

/// Upper bound on the number of values one [`LuaDecoder::read_values`] call decodes
pub const MAX_VALUES: usize = 1 << 16;

/// Decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions
{
    /// Lua version of the target runtime
    pub version: LuaVersion,
    /// Strings longer than this are truncated
    pub max_string_length: usize,
}

impl Default for DecodeOptions
{
    fn default() -> Self
    {
        Self {
            version: LuaVersion::default(),
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
        }
    }
}

impl DecodeOptions
{
    /// Default options for a given Lua version
    pub fn for_version(version: LuaVersion) -> Self
    {
        Self {
            version,
            ..Self::default()
        }
    }
}

/// Decoder bound to one target
///
/// ## Example
///
/// ```rust
/// use luaprobe_core::decode::{DecodeOptions, LuaDecoder};
/// use luaprobe_core::lua::LuaVersion;
/// use luaprobe_core::memory::{PointerWidth, SnapshotMemory};
/// use luaprobe_core::types::Address;
///
/// // Lua 5.3 integer 42: payload, then an int tag of 0x13.
/// let mut cell = 42i64.to_le_bytes().to_vec();
/// cell.extend_from_slice(&0x13i32.to_le_bytes());
/// let memory = SnapshotMemory::new(PointerWidth::Eight).with_region(0x1000, cell);
///
/// let decoder = LuaDecoder::new(&memory, DecodeOptions::for_version(LuaVersion::Lua53));
/// let value = decoder.read_value(Address::from(0x1000));
/// assert_eq!(value.lua_type_name(), "int");
/// assert_eq!(value.display(10), "42");
/// assert_eq!(value.original_address(), Address::from(0x1000));
/// ```
pub struct LuaDecoder<'a, M: MemoryAccessor + ?Sized>
{
    memory: &'a M,
    options: DecodeOptions,
}

impl<'a, M: MemoryAccessor + ?Sized> LuaDecoder<'a, M>
{
    /// Create a decoder over `memory`
    pub fn new(memory: &'a M, options: DecodeOptions) -> Self
    {
        Self { memory, options }
    }

    /// Options this decoder was created with
    pub fn options(&self) -> DecodeOptions
    {
        self.options
    }

    /// Size of one `TValue`, i.e. the stride of a `TValue` array
    pub fn tvalue_size(&self) -> u64
    {
        let mut cursor = StructCursor::new(self.memory, Address::NULL);
        cursor.skip::<u64>();
        if self.options.version.has_byte_tag() {
            cursor.skip::<u8>();
        } else {
            cursor.skip::<i32>();
        }
        cursor.align_to(8);
        cursor.address().value()
    }

    /// Decode the `TValue` stored at `address`
    pub fn read_value(&self, address: Address) -> LuaValue
    {
        let mut cursor = StructCursor::new(self.memory, address);
        let payload = cursor.address();
        cursor.skip::<u64>();

        let tag = if self.options.version.has_byte_tag() {
            cursor.read::<u8>().map(i32::from)
        } else {
            cursor.read::<i32>()
        };

        let Some(raw) = tag else {
            return LuaValue::error(format!("failed to read value tag at {address}"));
        };
        match u8::try_from(raw) {
            Ok(tag) => self.decode_tagged(tag, payload, address),
            Err(_) => LuaValue::error(format!("invalid type tag {raw} at {address}")),
        }
    }

    /// Decode `count` consecutive `TValue`s starting at `address`
    ///
    /// Each entry is decoded independently; unreadable entries become error
    /// values in place. At most [`MAX_VALUES`] entries are decoded.
    pub fn read_values(&self, address: Address, count: usize) -> Vec<LuaValue>
    {
        let count = if count > MAX_VALUES {
            warn!(%address, requested = count, limit = MAX_VALUES, "value count capped");
            MAX_VALUES
        } else {
            count
        };
        let stride = self.tvalue_size();
        let mut values = Vec::with_capacity(count);
        let mut cell = address;
        for _ in 0..count {
            values.push(self.read_value(cell));
            cell = cell + stride;
        }
        debug!(%address, count, errors = values.iter().filter(|v| v.is_error()).count(), "decoded value array");
        values
    }

    /// Decode a value from its raw tag and the address of its payload
    ///
    /// `original_address` is recorded on the result when decoding succeeds.
    pub fn decode_tagged(&self, tag: u8, payload: Address, original_address: Address) -> LuaValue
    {
        let kind = RawTag::classify(self.options.version, tag);
        trace!(%payload, tag, ?kind, "decoding tagged value");

        let value = match kind {
            RawTag::Nil => LuaValue::nil(),
            RawTag::False => LuaValue::boolean(false),
            RawTag::True => LuaValue::boolean(true),
            RawTag::Boolean => match self.memory.read::<i32>(payload) {
                Some(raw) => LuaValue::boolean(raw != 0),
                None => LuaValue::error(format!("failed to read boolean at {payload}")),
            },
            RawTag::LightUserData => match self.memory.read_pointer(payload) {
                Some(pointer) => LuaValue::light_user_data(pointer.value()),
                None => LuaValue::error(format!("failed to read light userdata at {payload}")),
            },
            RawTag::Float => match self.memory.read::<f64>(payload) {
                Some(number) => LuaValue::float(number),
                None => LuaValue::error(format!("failed to read number at {payload}")),
            },
            RawTag::Integer => match self.memory.read::<i64>(payload) {
                Some(number) => LuaValue::integer(number),
                None => LuaValue::error(format!("failed to read integer at {payload}")),
            },
            RawTag::String => self.with_target(payload, "string", |target| self.read_string_object(target, None)),
            RawTag::ShortString => {
                self.with_target(payload, "string", |target| self.read_string_object(target, Some(false)))
            }
            RawTag::LongString => {
                self.with_target(payload, "string", |target| self.read_string_object(target, Some(true)))
            }
            RawTag::Table => self.with_target(payload, "table", LuaValue::table),
            RawTag::Function => self.with_target(payload, "function", |target| self.read_closure(target)),
            RawTag::LuaClosure => self.with_target(payload, "function", LuaValue::lua_function),
            RawTag::LightCFunction => self.with_target(payload, "function", LuaValue::external_function),
            RawTag::CClosure => self.with_target(payload, "function", LuaValue::external_closure),
            RawTag::UserData => self.with_target(payload, "userdata", LuaValue::user_data),
            RawTag::Thread => self.with_target(payload, "thread", LuaValue::thread),
            RawTag::Unknown(raw) => {
                warn!(%payload, tag = raw, version = %self.options.version, "unknown type tag");
                LuaValue::error(format!("unknown type tag 0x{raw:x}"))
            }
        };

        value.with_original_address(original_address)
    }

    /// Decode the `TString` object at `target`
    ///
    /// The result's `original_address` stays null: there is no referencing
    /// cell.
    pub fn read_string(&self, target: Address) -> LuaValue
    {
        self.read_string_object(target, None)
    }

    fn read_string_object(&self, target: Address, long_hint: Option<bool>) -> LuaValue
    {
        if target.is_null() {
            return LuaValue::error("null string pointer");
        }
        let Some(header) = lua::read_tstring(self.memory, self.options.version, target, long_hint) else {
            return LuaValue::error(format!("failed to read string header at {target}"));
        };
        let Some((text, truncated)) = lua::read_tstring_contents(self.memory, &header, self.options.max_string_length)
        else {
            return LuaValue::error(format!("failed to read string data at {}", header.content));
        };
        if truncated {
            debug!(%target, len = header.len, kept = text.len(), "string truncated");
        }
        let kind = if header.long {
            StringKind::Long
        } else {
            StringKind::Short
        };
        LuaValue::remote_string(text, target, kind)
    }

    // Lua 5.1 keeps the Lua/C split in the closure header.
    fn read_closure(&self, target: Address) -> LuaValue
    {
        match lua::read_closure_is_c(self.memory, target) {
            Some(true) => LuaValue::external_closure(target),
            Some(false) => LuaValue::lua_function(target),
            None => LuaValue::error(format!("failed to read closure header at {target}")),
        }
    }

    fn with_target(&self, payload: Address, what: &str, build: impl FnOnce(Address) -> LuaValue) -> LuaValue
    {
        match self.memory.read_pointer(payload) {
            Some(target) => build(target),
            None => LuaValue::error(format!("failed to read {what} pointer at {payload}")),
        }
    }
}
