//! # Struct Cursor
//!
//! Sequential decoding of a C struct in target memory.
//!
//! The target runtime's structs are laid out by its native compiler: every
//! scalar field sits at a multiple of its own size, and padding fills the
//! gaps. Rather than hard-coding byte offsets per Lua version and pointer
//! width, decoders describe a struct as the sequence of its field types and
//! let the cursor compute the offsets:
//!
//! ```rust
//! use luaprobe_core::cursor::StructCursor;
//! use luaprobe_core::memory::{PointerWidth, SnapshotMemory};
//! use luaprobe_core::types::Address;
//!
//! // struct { void *next; unsigned char tt; unsigned int hash; }
//! let mut image = vec![0u8; 16];
//! image[8] = 4; // tt
//! image[12..16].copy_from_slice(&0xabcdu32.to_le_bytes()); // hash, after 3 bytes of padding
//! let memory = SnapshotMemory::new(PointerWidth::Eight).with_region(0x1000, image);
//!
//! let mut cursor = StructCursor::new(&memory, Address::from(0x1000));
//! cursor.skip_pointer();
//! assert_eq!(cursor.read::<u8>(), Some(4));
//! assert_eq!(cursor.read::<u32>(), Some(0xabcd));
//! assert_eq!(cursor.address(), Address::from(0x1010));
//! ```
//!
//! A failed read yields `None` but still advances the cursor exactly as a
//! skip would, so one unreadable field never shifts the offsets of the fields
//! after it.

use tracing::trace;

use crate::memory::{MemoryAccessor, MemoryAccessorExt, PointerWidth, StructField};
use crate::types::Address;

/// Moving read position inside a remote struct
///
/// The pointer width is captured once, when the cursor is created.
pub struct StructCursor<'a, M: MemoryAccessor + ?Sized>
{
    memory: &'a M,
    address: Address,
    pointer_width: PointerWidth,
}

impl<'a, M: MemoryAccessor + ?Sized> StructCursor<'a, M>
{
    /// Start a cursor at `address`
    pub fn new(memory: &'a M, address: Address) -> Self
    {
        Self {
            memory,
            address,
            pointer_width: memory.pointer_width(),
        }
    }

    /// Current position
    pub fn address(&self) -> Address
    {
        self.address
    }

    /// Pointer width this cursor was created with
    pub fn pointer_width(&self) -> PointerWidth
    {
        self.pointer_width
    }

    /// Round the position up to a multiple of `alignment`
    pub fn align_to(&mut self, alignment: u64)
    {
        self.address = self.address.align_up(alignment);
    }

    /// Advance by `count` bytes without alignment
    pub fn skip_bytes(&mut self, count: u64)
    {
        self.address = self.address + count;
    }

    /// Align to `T`, read it, and advance past it
    ///
    /// Issues exactly one read of `size_of::<T>()` bytes. Returns `None` if the
    /// read failed; the cursor still advances.
    pub fn read<T: StructField>(&mut self) -> Option<T>
    {
        let field = self.step(T::SIZE as u64);
        let value = self.memory.read::<T>(field);
        if value.is_none() {
            trace!(address = %field, size = T::SIZE, "struct field unreadable");
        }
        value
    }

    /// Align to `T` and advance past it without reading
    pub fn skip<T: StructField>(&mut self)
    {
        self.step(T::SIZE as u64);
    }

    /// Align to a pointer, read it, and advance past it
    pub fn read_pointer(&mut self) -> Option<Address>
    {
        match self.pointer_width {
            PointerWidth::Four => self.read::<u32>().map(|value| Address::from(u64::from(value))),
            PointerWidth::Eight => self.read::<u64>().map(Address::from),
        }
    }

    /// Align to a pointer and advance past it without reading
    pub fn skip_pointer(&mut self)
    {
        match self.pointer_width {
            PointerWidth::Four => self.skip::<u32>(),
            PointerWidth::Eight => self.skip::<u64>(),
        }
    }

    /// Read a `size_t`, which has pointer width on every supported target
    pub fn read_size(&mut self) -> Option<u64>
    {
        self.read_pointer().map(Address::value)
    }

    fn step(&mut self, size: u64) -> Address
    {
        let field = self.address.align_up(size);
        self.address = field + size;
        field
    }
}
