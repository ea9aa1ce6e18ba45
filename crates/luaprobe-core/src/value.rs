//! # Lua Values
//!
//! Host-side model of a value decoded from a Lua VM.
//!
//! A [`LuaValue`] is a snapshot: reference variants (tables, functions,
//! userdata, threads) only remember the address of the heap object they point
//! at, and that object may change or disappear once the target resumes.
//!
//! Every value carries two classifications. The [`LuaBaseType`] is what the
//! runtime's `type()` would report. The [`LuaExtendedType`] adds the splits
//! the runtime keeps internally (integer vs float, short vs long string, Lua
//! vs C function) which can only be recovered while decoding.

use std::fmt;
use std::ops::BitOr;

use crate::types::Address;

/// Type as reported by the Lua runtime itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaBaseType
{
    /// `nil`
    Nil,
    /// `boolean`
    Boolean,
    /// `userdata` without a managed allocation
    LightUserData,
    /// `number`
    Number,
    /// `string`
    String,
    /// `table`
    Table,
    /// `function`
    Function,
    /// `userdata`
    UserData,
    /// `thread`
    Thread,
}

/// Finer classification recovered during decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaExtendedType
{
    /// `nil`
    Nil,
    /// `boolean`
    Boolean,
    /// Light userdata
    LightUserData,
    /// Number stored as `lua_Number`
    FloatNumber,
    /// Number stored as `lua_Integer`
    IntegerNumber,
    /// Interned short string
    ShortString,
    /// Long string
    LongString,
    /// Table
    Table,
    /// Lua closure
    LuaFunction,
    /// Light C function
    ExternalFunction,
    /// C closure
    ExternalClosure,
    /// Full userdata
    UserData,
    /// Coroutine
    Thread,
}

impl LuaExtendedType
{
    /// The base type this extended type refines
    pub const fn base_type(self) -> LuaBaseType
    {
        match self {
            LuaExtendedType::Nil => LuaBaseType::Nil,
            LuaExtendedType::Boolean => LuaBaseType::Boolean,
            LuaExtendedType::LightUserData => LuaBaseType::LightUserData,
            LuaExtendedType::FloatNumber | LuaExtendedType::IntegerNumber => LuaBaseType::Number,
            LuaExtendedType::ShortString | LuaExtendedType::LongString => LuaBaseType::String,
            LuaExtendedType::Table => LuaBaseType::Table,
            LuaExtendedType::LuaFunction | LuaExtendedType::ExternalFunction | LuaExtendedType::ExternalClosure => {
                LuaBaseType::Function
            }
            LuaExtendedType::UserData => LuaBaseType::UserData,
            LuaExtendedType::Thread => LuaBaseType::Thread,
        }
    }
}

/// Presentation hints attached to a value
///
/// ```rust
/// use luaprobe_core::value::{DisplayFlags, LuaValue};
///
/// let flags = LuaValue::boolean(true).flags();
/// assert!(flags.contains(DisplayFlags::BOOLEAN | DisplayFlags::BOOLEAN_TRUE));
/// assert!(!LuaValue::boolean(false).flags().contains(DisplayFlags::BOOLEAN_TRUE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DisplayFlags(u32);

impl DisplayFlags
{
    /// No flags
    pub const NONE: Self = DisplayFlags(0);
    /// Value cannot be edited in place
    pub const READ_ONLY: Self = DisplayFlags(1 << 0);
    /// Value is a primitive with no children
    pub const BUILTIN: Self = DisplayFlags(1 << 1);
    /// Value is a boolean
    pub const BOOLEAN: Self = DisplayFlags(1 << 2);
    /// Value is the boolean `true`
    pub const BOOLEAN_TRUE: Self = DisplayFlags(1 << 3);

    /// Raw bit representation
    pub const fn bits(self) -> u32
    {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool
    {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DisplayFlags
{
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self
    {
        DisplayFlags(self.0 | rhs.0)
    }
}

/// How a number was stored in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind
{
    /// `lua_Integer`
    Integer,
    /// `lua_Number`
    Float,
}

/// Which of the runtime's two string representations a string used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind
{
    /// Interned short string
    Short,
    /// Long string
    Long,
}

/// Payload of a [`LuaValue`]
#[derive(Debug, Clone, PartialEq)]
pub enum LuaValueData
{
    /// The value could not be decoded; carries a readable description
    Error(String),
    /// `nil`
    Nil,
    /// `true` or `false`
    Bool(bool),
    /// Raw pointer, never dereferenced
    LightUserData(u64),
    /// Number, with the representation it had in the target
    Number
    {
        /// Numeric value
        value: f64,
        /// Source representation
        kind: NumberKind,
    },
    /// String contents, decoded as UTF-8 with replacement
    String
    {
        /// Decoded text (possibly truncated)
        value: String,
        /// Address of the `TString` object
        target_address: Address,
        /// Short or long representation
        kind: StringKind,
    },
    /// Table object
    Table
    {
        /// Address of the `Table` object
        target_address: Address,
    },
    /// Lua closure
    LuaFunction
    {
        /// Address of the `LClosure` object
        target_address: Address,
    },
    /// Light C function
    ExternalFunction
    {
        /// The C function pointer
        target_address: Address,
    },
    /// C closure
    ExternalClosure
    {
        /// Address of the `CClosure` object
        target_address: Address,
    },
    /// Full userdata
    UserData
    {
        /// Address of the `Udata` object
        target_address: Address,
    },
    /// Coroutine
    Thread
    {
        /// Address of the `lua_State`
        target_address: Address,
    },
}

/// A decoded Lua value
///
/// ## Identity
///
/// `original_address` is where the value was decoded from (the `TValue`
/// cell), or [`Address::NULL`] for values built locally, such as errors or
/// literals created for comparison. Reference variants additionally carry a
/// `target_address`: the heap object they refer to.
///
/// ## Example
///
/// ```rust
/// use luaprobe_core::value::LuaValue;
///
/// let number = LuaValue::integer(255);
/// assert_eq!(number.display(16), "ff");
/// assert_eq!(number.display(10), "255");
/// assert_eq!(number.lua_type_name(), "int");
/// assert!(!number.lua_compare(&LuaValue::string("255")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LuaValue
{
    data: LuaValueData,
    flags: DisplayFlags,
    original_address: Address,
}

impl LuaValue
{
    fn local(data: LuaValueData, flags: DisplayFlags) -> Self
    {
        Self {
            data,
            flags,
            original_address: Address::NULL,
        }
    }

    /// A decode failure, rendered as `message`
    pub fn error(message: impl Into<String>) -> Self
    {
        Self::local(LuaValueData::Error(message.into()), DisplayFlags::READ_ONLY)
    }

    /// `nil`
    pub fn nil() -> Self
    {
        Self::local(LuaValueData::Nil, DisplayFlags::BUILTIN | DisplayFlags::READ_ONLY)
    }

    /// `true` or `false`
    pub fn boolean(value: bool) -> Self
    {
        let mut flags = DisplayFlags::BOOLEAN | DisplayFlags::BUILTIN | DisplayFlags::READ_ONLY;
        if value {
            flags = flags | DisplayFlags::BOOLEAN_TRUE;
        }
        Self::local(LuaValueData::Bool(value), flags)
    }

    /// Light userdata holding `pointer`
    pub fn light_user_data(pointer: u64) -> Self
    {
        Self::local(
            LuaValueData::LightUserData(pointer),
            DisplayFlags::BUILTIN | DisplayFlags::READ_ONLY,
        )
    }

    /// Number that was stored as an integer
    ///
    /// The payload is kept as `f64`; integers beyond 2^53 lose precision.
    #[allow(clippy::cast_precision_loss)]
    pub fn integer(value: i64) -> Self
    {
        Self::number(value as f64, NumberKind::Integer)
    }

    /// Number that was stored as a float
    pub fn float(value: f64) -> Self
    {
        Self::number(value, NumberKind::Float)
    }

    /// Number with an explicit source representation
    pub fn number(value: f64, kind: NumberKind) -> Self
    {
        Self::local(
            LuaValueData::Number { value, kind },
            DisplayFlags::BUILTIN | DisplayFlags::READ_ONLY,
        )
    }

    /// Short string not tied to a remote object (e.g. a literal to compare with)
    pub fn string(value: impl Into<String>) -> Self
    {
        Self::remote_string(value, Address::NULL, StringKind::Short)
    }

    /// String backed by the `TString` at `target_address`
    pub fn remote_string(value: impl Into<String>, target_address: Address, kind: StringKind) -> Self
    {
        Self::local(
            LuaValueData::String {
                value: value.into(),
                target_address,
                kind,
            },
            DisplayFlags::BUILTIN | DisplayFlags::READ_ONLY,
        )
    }

    /// Table at `target_address`
    pub fn table(target_address: Address) -> Self
    {
        Self::local(LuaValueData::Table { target_address }, DisplayFlags::NONE)
    }

    /// Lua closure at `target_address`
    pub fn lua_function(target_address: Address) -> Self
    {
        Self::local(LuaValueData::LuaFunction { target_address }, DisplayFlags::NONE)
    }

    /// Light C function pointing at `target_address`
    pub fn external_function(target_address: Address) -> Self
    {
        Self::local(LuaValueData::ExternalFunction { target_address }, DisplayFlags::NONE)
    }

    /// C closure at `target_address`
    pub fn external_closure(target_address: Address) -> Self
    {
        Self::local(LuaValueData::ExternalClosure { target_address }, DisplayFlags::NONE)
    }

    /// Full userdata at `target_address`
    pub fn user_data(target_address: Address) -> Self
    {
        Self::local(LuaValueData::UserData { target_address }, DisplayFlags::NONE)
    }

    /// Coroutine whose `lua_State` is at `target_address`
    pub fn thread(target_address: Address) -> Self
    {
        Self::local(LuaValueData::Thread { target_address }, DisplayFlags::NONE)
    }

    /// Record the remote cell this value was decoded from
    ///
    /// Only call this after a successful read at `address`. Error values stay
    /// local whatever address is passed.
    #[must_use]
    pub fn with_original_address(mut self, address: Address) -> Self
    {
        if !self.is_error() {
            self.original_address = address;
        }
        self
    }

    /// Payload
    pub fn data(&self) -> &LuaValueData
    {
        &self.data
    }

    /// Presentation hints
    pub fn flags(&self) -> DisplayFlags
    {
        self.flags
    }

    /// Address of the cell this value was decoded from, or null if local
    pub fn original_address(&self) -> Address
    {
        self.original_address
    }

    /// Whether this value represents a decode failure
    pub fn is_error(&self) -> bool
    {
        matches!(self.data, LuaValueData::Error(_))
    }

    /// Heap object a reference value points at
    ///
    /// Strings report their `TString`; light userdata and primitives have no
    /// target.
    pub fn target_address(&self) -> Option<Address>
    {
        match &self.data {
            LuaValueData::String { target_address, .. }
            | LuaValueData::Table { target_address }
            | LuaValueData::LuaFunction { target_address }
            | LuaValueData::ExternalFunction { target_address }
            | LuaValueData::ExternalClosure { target_address }
            | LuaValueData::UserData { target_address }
            | LuaValueData::Thread { target_address } => Some(*target_address),
            LuaValueData::Error(_)
            | LuaValueData::Nil
            | LuaValueData::Bool(_)
            | LuaValueData::LightUserData(_)
            | LuaValueData::Number { .. } => None,
        }
    }

    /// Fine-grained type
    ///
    /// Error values report [`LuaExtendedType::Nil`].
    pub fn extended_type(&self) -> LuaExtendedType
    {
        match &self.data {
            LuaValueData::Error(_) | LuaValueData::Nil => LuaExtendedType::Nil,
            LuaValueData::Bool(_) => LuaExtendedType::Boolean,
            LuaValueData::LightUserData(_) => LuaExtendedType::LightUserData,
            LuaValueData::Number { kind: NumberKind::Integer, .. } => LuaExtendedType::IntegerNumber,
            LuaValueData::Number { kind: NumberKind::Float, .. } => LuaExtendedType::FloatNumber,
            LuaValueData::String { kind: StringKind::Short, .. } => LuaExtendedType::ShortString,
            LuaValueData::String { kind: StringKind::Long, .. } => LuaExtendedType::LongString,
            LuaValueData::Table { .. } => LuaExtendedType::Table,
            LuaValueData::LuaFunction { .. } => LuaExtendedType::LuaFunction,
            LuaValueData::ExternalFunction { .. } => LuaExtendedType::ExternalFunction,
            LuaValueData::ExternalClosure { .. } => LuaExtendedType::ExternalClosure,
            LuaValueData::UserData { .. } => LuaExtendedType::UserData,
            LuaValueData::Thread { .. } => LuaExtendedType::Thread,
        }
    }

    /// Runtime type
    pub fn base_type(&self) -> LuaBaseType
    {
        self.extended_type().base_type()
    }

    /// Stable lowercase type name for presentation and filters
    pub fn lua_type_name(&self) -> &'static str
    {
        match &self.data {
            LuaValueData::Error(_) => "error",
            LuaValueData::Nil => "nil",
            LuaValueData::Bool(_) => "bool",
            LuaValueData::LightUserData(_) => "light_user_data",
            LuaValueData::Number { kind: NumberKind::Integer, .. } => "int",
            LuaValueData::Number { kind: NumberKind::Float, .. } => "double",
            LuaValueData::String { kind: StringKind::Short, .. } => "short_string",
            LuaValueData::String { kind: StringKind::Long, .. } => "long_string",
            LuaValueData::Table { .. } => "table",
            LuaValueData::LuaFunction { .. } => "lua_function",
            LuaValueData::ExternalFunction { .. } => "c_function",
            LuaValueData::ExternalClosure { .. } => "c_closure",
            LuaValueData::UserData { .. } => "user_data",
            LuaValueData::Thread { .. } => "thread",
        }
    }

    /// Render without touching target memory
    ///
    /// `radix` only affects integer numbers: 16 renders lowercase hex of the
    /// truncated integer, anything else renders decimal.
    #[allow(clippy::cast_possible_truncation)]
    pub fn display(&self, radix: u32) -> String
    {
        match &self.data {
            LuaValueData::Error(message) => message.clone(),
            LuaValueData::Nil => "nil".to_string(),
            LuaValueData::Bool(value) => value.to_string(),
            LuaValueData::LightUserData(pointer) => format!("0x{pointer:x}"),
            LuaValueData::Number {
                value,
                kind: NumberKind::Integer,
            } => {
                let whole = *value as i64;
                if radix == 16 {
                    format!("{whole:x}")
                } else {
                    whole.to_string()
                }
            }
            LuaValueData::Number {
                value,
                kind: NumberKind::Float,
            } => format_float(*value),
            LuaValueData::String { value, .. } => format!("\"{value}\""),
            LuaValueData::Table { target_address }
            | LuaValueData::LuaFunction { target_address }
            | LuaValueData::ExternalFunction { target_address }
            | LuaValueData::ExternalClosure { target_address }
            | LuaValueData::UserData { target_address }
            | LuaValueData::Thread { target_address } => format!("0x{:x}", target_address.value()),
        }
    }

    /// Lua-level equality
    ///
    /// Values of different variants are never equal. Primitives compare by
    /// value (an integer and a float holding the same number are equal, as in
    /// Lua); tables, functions, userdata and threads compare by the object
    /// they refer to. A NaN number equals itself so the relation stays
    /// reflexive.
    pub fn lua_compare(&self, other: &LuaValue) -> bool
    {
        match (&self.data, &other.data) {
            (LuaValueData::Error(lhs), LuaValueData::Error(rhs)) => lhs == rhs,
            (LuaValueData::Nil, LuaValueData::Nil) => true,
            (LuaValueData::Bool(lhs), LuaValueData::Bool(rhs)) => lhs == rhs,
            (LuaValueData::LightUserData(lhs), LuaValueData::LightUserData(rhs)) => lhs == rhs,
            (LuaValueData::Number { value: lhs, .. }, LuaValueData::Number { value: rhs, .. }) => {
                lhs == rhs || (lhs.is_nan() && rhs.is_nan())
            }
            (LuaValueData::String { value: lhs, .. }, LuaValueData::String { value: rhs, .. }) => lhs == rhs,
            (LuaValueData::Table { target_address: lhs }, LuaValueData::Table { target_address: rhs })
            | (LuaValueData::LuaFunction { target_address: lhs }, LuaValueData::LuaFunction { target_address: rhs })
            | (
                LuaValueData::ExternalFunction { target_address: lhs },
                LuaValueData::ExternalFunction { target_address: rhs },
            )
            | (
                LuaValueData::ExternalClosure { target_address: lhs },
                LuaValueData::ExternalClosure { target_address: rhs },
            )
            | (LuaValueData::UserData { target_address: lhs }, LuaValueData::UserData { target_address: rhs })
            | (LuaValueData::Thread { target_address: lhs }, LuaValueData::Thread { target_address: rhs }) => {
                lhs == rhs
            }
            _ => false,
        }
    }
}

/// Render a float the way a watch window wants it
///
/// Plain decimal in the everyday range, exponent notation for very large or
/// very small magnitudes, and `inf`/`-inf`/`nan` for the non-finite values.
fn format_float(value: f64) -> String
{
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude >= 1e15 || (magnitude != 0.0 && magnitude < 1e-4) {
        format!("{value:e}")
    } else {
        value.to_string()
    }
}

impl fmt::Display for LuaValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.display(10))
    }
}
