//! # Error Types
//!
//! General error handling for Luaprobe.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and readable messages.
//!
//! Note that decoding a Lua value never produces a `ProbeError`: a value that
//! cannot be decoded becomes an error *value* (see [`crate::value::LuaValue::error`])
//! so a batch decode can keep going. `ProbeError` is reserved for the memory
//! access layer, platform setup, and argument parsing.

use thiserror::Error;

use crate::types::Address;

/// Main error type for Luaprobe operations
///
/// ## Error Categories
///
/// 1. **Memory errors**: ReadFailed, WriteFailed, StructUnreadable
/// 2. **Target errors**: ProcessNotFound, UnsupportedPointerWidth
/// 3. **Argument errors**: InvalidArgument, UnknownLuaVersion
/// 4. **I/O and object errors**: Io, Object
#[derive(Error, Debug)]
pub enum ProbeError
{
    /// Reading target memory failed
    ///
    /// This happens when:
    /// - The address is not mapped in the target
    /// - The target has exited
    /// - The page is read-protected
    #[error("Failed to read {len} bytes at {address}")]
    ReadFailed
    {
        /// Address the read started at
        address: Address,
        /// Number of bytes requested
        len: usize,
    },

    /// Writing target memory failed
    #[error("Failed to write {len} bytes at {address}")]
    WriteFailed
    {
        /// Address the write started at
        address: Address,
        /// Number of bytes that should have been written
        len: usize,
    },

    /// A runtime struct in target memory could not be decoded
    ///
    /// Raised when a required field (a size, a line number, a pointer) of an
    /// object such as a `Proto` is unreadable.
    #[error("Failed to read {what} at {address}")]
    StructUnreadable
    {
        /// Which struct was being decoded
        what: &'static str,
        /// Address of the struct
        address: Address,
    },

    /// The target reported a pointer width other than 4 or 8 bytes
    #[error("Unsupported pointer width: {0} bytes")]
    UnsupportedPointerWidth(u8),

    /// The process with the given PID doesn't exist or has exited
    #[error("Process not found: PID {0}")]
    ProcessNotFound(u32),

    /// A Lua version string could not be parsed
    #[error("Unknown Lua version: {0}")]
    UnknownLuaVersion(String),

    /// Invalid argument passed to a Luaprobe function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (opening `/proc/<pid>/mem`, reading snapshot files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The target executable could not be parsed
    #[error("Object file error: {0}")]
    Object(#[from] object::Error),
}

/// Convenience type alias for `Result<T, ProbeError>`
///
/// ```rust
/// use luaprobe_core::error::ProbeResult;
/// fn foo() -> ProbeResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
