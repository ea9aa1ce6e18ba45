//! Lua version selection.

use std::fmt;
use std::str::FromStr;

use crate::error::ProbeError;

/// Version of the Lua runtime hosted by the target process
///
/// The version decides the type tag encoding and the layout of every runtime
/// struct, so it must match the target exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LuaVersion
{
    /// Lua 5.1
    Lua51,
    /// Lua 5.2
    Lua52,
    /// Lua 5.3 (default)
    #[default]
    Lua53,
    /// Lua 5.4
    Lua54,
}

impl LuaVersion
{
    /// Whether type tags carry variant bits (4-5) and the collectable bit (6)
    pub const fn has_variant_tags(self) -> bool
    {
        !matches!(self, LuaVersion::Lua51)
    }

    /// Whether a `TValue` stores its tag as a single byte instead of an `int`
    pub const fn has_byte_tag(self) -> bool
    {
        matches!(self, LuaVersion::Lua54)
    }
}

impl fmt::Display for LuaVersion
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            LuaVersion::Lua51 => "5.1",
            LuaVersion::Lua52 => "5.2",
            LuaVersion::Lua53 => "5.3",
            LuaVersion::Lua54 => "5.4",
        };
        write!(f, "{label}")
    }
}

impl FromStr for LuaVersion
{
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let lowered = s.trim().to_lowercase();
        let digits = lowered.trim_start_matches("lua").trim_start_matches(['-', ' ']);
        match digits {
            "5.1" | "51" => Ok(LuaVersion::Lua51),
            "5.2" | "52" => Ok(LuaVersion::Lua52),
            "5.3" | "53" => Ok(LuaVersion::Lua53),
            "5.4" | "54" => Ok(LuaVersion::Lua54),
            _ => Err(ProbeError::UnknownLuaVersion(s.to_string())),
        }
    }
}
