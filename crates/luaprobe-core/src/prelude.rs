//! Common module for library exports

pub use crate::cursor::StructCursor;
pub use crate::decode::{DecodeOptions, LuaDecoder};
pub use crate::error::{ProbeError, ProbeResult};
pub use crate::function::{FunctionMetadata, LocalFunction, LuaFunctionData};
pub use crate::lua::{LuaVersion, RawTag};
pub use crate::memory::{Endianness, MemoryAccessor, MemoryAccessorExt, PointerWidth, SnapshotMemory};
pub use crate::symbols::{ScriptSymbols, SourceSymbols, StateSymbols, SymbolStore};
pub use crate::types::{Address, Fetched};
pub use crate::value::{DisplayFlags, LuaBaseType, LuaExtendedType, LuaValue, LuaValueData, NumberKind, StringKind};
