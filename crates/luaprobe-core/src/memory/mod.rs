//! # Memory Access
//!
//! The [`MemoryAccessor`] trait is the only way Luaprobe touches the target.
//! Everything above it (the struct cursor, the value decoder, the function
//! metadata reader) is written against this trait, so the same code runs
//! against a live process ([`crate::platform`]) or an in-memory image
//! ([`SnapshotMemory`]).
//!
//! ## Failure model
//!
//! Raw accessor methods return [`ProbeResult`]. The typed helpers in
//! [`MemoryAccessorExt`] turn read failures into `None` ("absent"), never into
//! a zero value: a zeroed field and an unreadable field must stay
//! distinguishable for the decoder.

mod primitive;
mod snapshot;

pub use primitive::StructField;
pub use snapshot::SnapshotMemory;
use tracing::trace;

use crate::error::{ProbeError, ProbeResult};
use crate::types::Address;

/// Width of a pointer in the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth
{
    /// 32-bit target
    Four,
    /// 64-bit target
    Eight,
}

impl PointerWidth
{
    /// Width in bytes
    pub const fn bytes(self) -> u64
    {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }

    /// Pointer width of the machine Luaprobe itself runs on
    pub const fn native() -> Self
    {
        if cfg!(target_pointer_width = "32") {
            PointerWidth::Four
        } else {
            PointerWidth::Eight
        }
    }
}

impl TryFrom<u8> for PointerWidth
{
    type Error = ProbeError;

    fn try_from(bytes: u8) -> ProbeResult<Self>
    {
        match bytes {
            4 => Ok(PointerWidth::Four),
            8 => Ok(PointerWidth::Eight),
            other => Err(ProbeError::UnsupportedPointerWidth(other)),
        }
    }
}

/// Byte order of integers in the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness
{
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl Endianness
{
    /// Byte order of the machine Luaprobe itself runs on
    pub const fn native() -> Self
    {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// Raw byte access to a target process
///
/// Implementations only move bytes. Interpreting them (alignment, integer
/// width, pointer width) is the caller's job, driven by [`pointer_width`] and
/// [`endianness`].
///
/// ## Thread Safety
///
/// Accessors are used from one thread at a time. Reads take `&self` so a
/// decoder can hold a shared borrow while it walks several structures.
///
/// [`pointer_width`]: MemoryAccessor::pointer_width
/// [`endianness`]: MemoryAccessor::endianness
pub trait MemoryAccessor
{
    /// Read exactly `len` bytes starting at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::ReadFailed`] if any byte of the range is
    /// unreadable. Short reads are failures.
    fn read_bytes(&self, address: Address, len: usize) -> ProbeResult<Vec<u8>>;

    /// Write `bytes` starting at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::WriteFailed`] if the range is not writable.
    fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> ProbeResult<()>;

    /// Pointer width of the target, fixed for the accessor's lifetime
    fn pointer_width(&self) -> PointerWidth;

    /// Byte order of the target
    fn endianness(&self) -> Endianness
    {
        Endianness::native()
    }

    /// Read a NUL-terminated byte string of at most `max_len` bytes
    ///
    /// The terminator is not included. Reading stops at the first NUL, after
    /// `max_len` bytes, or at the first unreadable byte, whichever comes
    /// first, so a partially readable string yields its readable prefix. An
    /// empty result is valid (a zero-length string).
    ///
    /// The default implementation reads one byte at a time; accessors that
    /// can do better should override it.
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::ReadFailed`] only if not even the first byte
    /// could be read.
    fn read_c_string(&self, address: Address, max_len: usize) -> ProbeResult<Vec<u8>>
    {
        let mut output = Vec::new();
        for offset in 0..max_len as u64 {
            match self.read_bytes(address + offset, 1) {
                Ok(byte) if byte.first() == Some(&0) => break,
                Ok(byte) => output.extend_from_slice(&byte),
                Err(err) if offset == 0 => return Err(err),
                Err(_) => break,
            }
        }
        Ok(output)
    }
}

/// Typed reads and writes on top of any [`MemoryAccessor`]
///
/// ## Example
///
/// ```rust
/// use luaprobe_core::memory::{MemoryAccessorExt, PointerWidth, SnapshotMemory};
/// use luaprobe_core::types::Address;
///
/// let memory = SnapshotMemory::new(PointerWidth::Four).with_region(0x1000, vec![0x78, 0x56, 0x34, 0x12]);
/// assert_eq!(memory.read::<u32>(Address::from(0x1000)), Some(0x1234_5678));
/// assert_eq!(memory.read_pointer(Address::from(0x1000)), Some(Address::from(0x1234_5678)));
/// assert_eq!(memory.read::<u32>(Address::from(0x2000)), None);
/// ```
pub trait MemoryAccessorExt: MemoryAccessor
{
    /// Read one primitive, or `None` if the read failed
    fn read<T: StructField>(&self, address: Address) -> Option<T>
    {
        match self.read_bytes(address, T::SIZE) {
            Ok(bytes) if bytes.len() == T::SIZE => Some(T::from_bytes(&bytes, self.endianness())),
            Ok(bytes) => {
                trace!(%address, expected = T::SIZE, got = bytes.len(), "short read");
                None
            }
            Err(err) => {
                trace!(%address, size = T::SIZE, error = %err, "read failed");
                None
            }
        }
    }

    /// Read a pointer-sized value, widened to an [`Address`]
    ///
    /// Reads exactly 4 bytes on 32-bit targets and 8 bytes on 64-bit targets.
    fn read_pointer(&self, address: Address) -> Option<Address>
    {
        match self.pointer_width() {
            PointerWidth::Four => self.read::<u32>(address).map(|value| Address::from(u64::from(value))),
            PointerWidth::Eight => self.read::<u64>(address).map(Address::from),
        }
    }

    /// Read a NUL-terminated string (lossy UTF-8), or `None` if nothing could be read
    fn read_string(&self, address: Address, limit: usize) -> Option<String>
    {
        self.read_c_string(address, limit)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write one primitive in the target's byte order
    ///
    /// ## Errors
    ///
    /// Propagates the accessor's write failure.
    fn write<T: StructField>(&mut self, address: Address, value: T) -> ProbeResult<()>
    {
        let bytes = value.to_bytes(self.endianness());
        self.write_bytes(address, &bytes)
    }

    /// Write a pointer-sized value
    ///
    /// Writes exactly 4 bytes on 32-bit targets and 8 bytes on 64-bit targets.
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::InvalidArgument`] if `value` does not fit a
    /// 32-bit pointer, or propagates the accessor's write failure.
    fn write_pointer(&mut self, address: Address, value: Address) -> ProbeResult<()>
    {
        match self.pointer_width() {
            PointerWidth::Four => {
                let narrow = u32::try_from(value.value()).map_err(|_| {
                    ProbeError::InvalidArgument(format!("{value} does not fit a 32-bit pointer"))
                })?;
                self.write::<u32>(address, narrow)
            }
            PointerWidth::Eight => self.write::<u64>(address, value.value()),
        }
    }
}

impl<M: MemoryAccessor + ?Sized> MemoryAccessorExt for M {}

impl<M: MemoryAccessor + ?Sized> MemoryAccessor for Box<M>
{
    fn read_bytes(&self, address: Address, len: usize) -> ProbeResult<Vec<u8>>
    {
        (**self).read_bytes(address, len)
    }

    fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> ProbeResult<()>
    {
        (**self).write_bytes(address, bytes)
    }

    fn pointer_width(&self) -> PointerWidth
    {
        (**self).pointer_width()
    }

    fn endianness(&self) -> Endianness
    {
        (**self).endianness()
    }

    fn read_c_string(&self, address: Address, max_len: usize) -> ProbeResult<Vec<u8>>
    {
        (**self).read_c_string(address, max_len)
    }
}
