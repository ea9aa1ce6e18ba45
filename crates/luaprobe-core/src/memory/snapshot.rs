//! In-memory process image.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{Endianness, MemoryAccessor, PointerWidth};
use crate::error::{ProbeError, ProbeResult};
use crate::types::Address;

#[derive(Debug, Clone)]
struct Region
{
    base: Address,
    bytes: Vec<u8>,
}

impl Region
{
    fn offset_of(&self, address: Address) -> Option<usize>
    {
        let offset = usize::try_from(address.offset_from(self.base)?).ok()?;
        (offset < self.bytes.len()).then_some(offset)
    }
}

/// A process image made of byte regions mapped at fixed addresses
///
/// Used to decode raw memory dumps and as the fake target in tests. Bytes
/// outside every region are unreadable. A read or write must fit inside a
/// single region; a range that runs past the end of its region fails, even if
/// another region happens to start right after it.
///
/// ## Example
///
/// ```rust
/// use luaprobe_core::memory::{MemoryAccessor, PointerWidth, SnapshotMemory};
/// use luaprobe_core::types::Address;
///
/// let memory = SnapshotMemory::new(PointerWidth::Eight).with_region(0x4000, b"lua\0".to_vec());
/// assert_eq!(memory.read_c_string(Address::from(0x4000), 16).unwrap(), b"lua");
/// assert!(memory.read_bytes(Address::from(0x4002), 4).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotMemory
{
    regions: Vec<Region>,
    pointer_width: PointerWidth,
    endianness: Endianness,
}

impl SnapshotMemory
{
    /// Create an empty image for a target with the given pointer width
    pub fn new(pointer_width: PointerWidth) -> Self
    {
        Self {
            regions: Vec::new(),
            pointer_width,
            endianness: Endianness::native(),
        }
    }

    /// Load a raw dump file and map it at `base`
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::Io`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>, base: Address, pointer_width: PointerWidth) -> ProbeResult<Self>
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), %base, len = bytes.len(), "loaded memory snapshot");
        Ok(Self::new(pointer_width).with_region(base.value(), bytes))
    }

    /// Set the byte order used for typed reads
    #[must_use]
    pub fn with_endianness(mut self, endianness: Endianness) -> Self
    {
        self.endianness = endianness;
        self
    }

    /// Map `bytes` at `base` (builder form of [`SnapshotMemory::add_region`])
    #[must_use]
    pub fn with_region(mut self, base: u64, bytes: Vec<u8>) -> Self
    {
        self.add_region(Address::from(base), bytes);
        self
    }

    /// Map `bytes` at `base`
    ///
    /// Later regions shadow earlier ones where they overlap.
    pub fn add_region(&mut self, base: Address, bytes: Vec<u8>)
    {
        self.regions.push(Region { base, bytes });
    }

    fn locate(&self, address: Address) -> Option<(usize, usize)>
    {
        self.regions
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, region)| region.offset_of(address).map(|offset| (index, offset)))
    }
}

impl MemoryAccessor for SnapshotMemory
{
    fn read_bytes(&self, address: Address, len: usize) -> ProbeResult<Vec<u8>>
    {
        if len == 0 {
            return Ok(Vec::new());
        }
        let failed = || ProbeError::ReadFailed { address, len };
        let (index, offset) = self.locate(address).ok_or_else(failed)?;
        let bytes = &self.regions[index].bytes;
        let end = offset.checked_add(len).filter(|end| *end <= bytes.len()).ok_or_else(failed)?;
        Ok(bytes[offset..end].to_vec())
    }

    fn write_bytes(&mut self, address: Address, data: &[u8]) -> ProbeResult<()>
    {
        if data.is_empty() {
            return Ok(());
        }
        let failed = || ProbeError::WriteFailed { address, len: data.len() };
        let (index, offset) = self.locate(address).ok_or_else(failed)?;
        let bytes = &mut self.regions[index].bytes;
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= bytes.len())
            .ok_or_else(failed)?;
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn pointer_width(&self) -> PointerWidth
    {
        self.pointer_width
    }

    fn endianness(&self) -> Endianness
    {
        self.endianness
    }

    fn read_c_string(&self, address: Address, max_len: usize) -> ProbeResult<Vec<u8>>
    {
        let (index, offset) = self
            .locate(address)
            .ok_or(ProbeError::ReadFailed { address, len: 1 })?;
        let bytes = &self.regions[index].bytes[offset..];
        let window = &bytes[..bytes.len().min(max_len)];
        let terminated = window.iter().position(|byte| *byte == 0).unwrap_or(window.len());
        Ok(window[..terminated].to_vec())
    }
}
