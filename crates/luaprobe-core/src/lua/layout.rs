//! Struct layouts of Lua heap objects, expressed as cursor walks.
//!
//! Every walk starts at the object's address and begins with `CommonHeader`
//! (`GCObject *next; lu_byte tt; lu_byte marked`).

use tracing::trace;

use super::{LuaVersion, RawTag, MAX_SHORT_STRING_LENGTH};
use crate::cursor::StructCursor;
use crate::memory::MemoryAccessor;
use crate::types::Address;

/// Alignment of `L_Umaxalign`, which pads the `TString` header before 5.4
const MAX_ALIGN: u64 = 8;

/// Decoded `TString` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TStringHeader
{
    /// Whether the runtime treats this as a long string
    pub long: bool,
    /// Length in bytes, excluding the terminator
    pub len: u64,
    /// Address of the first content byte
    pub content: Address,
}

fn skip_common_header<M: MemoryAccessor + ?Sized>(cursor: &mut StructCursor<'_, M>) -> Option<u8>
{
    cursor.skip_pointer();
    let tag = cursor.read::<u8>();
    cursor.skip::<u8>();
    tag
}

/// Read a `TString` header
///
/// `long_hint` is the short/long split implied by the referencing `TValue`'s
/// tag, when it has one. Without a hint the split comes from the header's
/// own tag (5.2+) or from the length threshold (5.1).
pub(crate) fn read_tstring<M: MemoryAccessor + ?Sized>(
    memory: &M,
    version: LuaVersion,
    address: Address,
    long_hint: Option<bool>,
) -> Option<TStringHeader>
{
    let mut cursor = StructCursor::new(memory, address);
    let header_tag = skip_common_header(&mut cursor);

    let header = match version {
        LuaVersion::Lua51 => {
            cursor.skip::<u8>(); // reserved
            cursor.skip::<u32>(); // hash
            let len = cursor.read_size()?;
            cursor.align_to(MAX_ALIGN);
            TStringHeader {
                long: long_hint.unwrap_or(len > MAX_SHORT_STRING_LENGTH),
                len,
                content: cursor.address(),
            }
        }
        LuaVersion::Lua52 => {
            cursor.skip::<u8>(); // extra
            cursor.skip::<u32>(); // hash
            let len = cursor.read_size()?;
            cursor.align_to(MAX_ALIGN);
            TStringHeader {
                long: long_hint.or_else(|| header_long(version, header_tag)).unwrap_or(len > MAX_SHORT_STRING_LENGTH),
                len,
                content: cursor.address(),
            }
        }
        LuaVersion::Lua53 | LuaVersion::Lua54 => {
            cursor.skip::<u8>(); // extra
            let short_len = cursor.read::<u8>();
            cursor.skip::<u32>(); // hash
            let long = long_hint.or_else(|| header_long(version, header_tag))?;
            let len = if long {
                cursor.read_size()?
            } else {
                cursor.skip_pointer();
                u64::from(short_len?)
            };
            if version == LuaVersion::Lua53 {
                cursor.align_to(MAX_ALIGN);
            }
            TStringHeader {
                long,
                len,
                content: cursor.address(),
            }
        }
    };

    trace!(%address, len = header.len, long = header.long, "read string header");
    Some(header)
}

fn header_long(version: LuaVersion, tag: Option<u8>) -> Option<bool>
{
    match RawTag::classify(version, tag?) {
        RawTag::ShortString => Some(false),
        RawTag::LongString => Some(true),
        _ => None,
    }
}

/// Granularity of the chunked fallback read
const PAGE_SIZE: u64 = 0x1000;

/// Read as many bytes of `[address, address + len)` as are mapped
///
/// Reads page-sized chunks until one fails, then finishes that chunk a byte
/// at a time. Lua strings are length-delimited, so embedded NULs are kept.
fn read_readable_prefix<M: MemoryAccessor + ?Sized>(memory: &M, address: Address, len: usize) -> Vec<u8>
{
    let mut output = Vec::new();
    while output.len() < len {
        let at = address + output.len() as u64;
        let to_boundary = usize::try_from(PAGE_SIZE - at.value() % PAGE_SIZE).unwrap_or(usize::MAX);
        let chunk = to_boundary.min(len - output.len());

        if let Ok(bytes) = memory.read_bytes(at, chunk) {
            output.extend_from_slice(&bytes);
            continue;
        }
        for offset in 0..chunk as u64 {
            match memory.read_bytes(at + offset, 1) {
                Ok(byte) => output.extend_from_slice(&byte),
                Err(_) => return output,
            }
        }
    }
    output
}

/// Read up to `limit` bytes of string content
///
/// Falls back to a partial read when the full range is not readable. Returns
/// the decoded text and whether it was cut short, or `None` if nothing at
/// all could be read.
pub(crate) fn read_tstring_contents<M: MemoryAccessor + ?Sized>(
    memory: &M,
    header: &TStringHeader,
    limit: usize,
) -> Option<(String, bool)>
{
    let wanted = usize::try_from(header.len).unwrap_or(usize::MAX).min(limit);
    let capped = (wanted as u64) < header.len;

    if let Ok(bytes) = memory.read_bytes(header.content, wanted) {
        return Some((String::from_utf8_lossy(&bytes).into_owned(), capped));
    }

    let partial = read_readable_prefix(memory, header.content, wanted);
    if partial.is_empty() && wanted > 0 {
        return None;
    }
    trace!(address = %header.content, wanted, got = partial.len(), "partial string read");
    Some((String::from_utf8_lossy(&partial).into_owned(), true))
}

/// Read Lua 5.1's `isC` flag from a closure header
pub(crate) fn read_closure_is_c<M: MemoryAccessor + ?Sized>(memory: &M, address: Address) -> Option<bool>
{
    let mut cursor = StructCursor::new(memory, address);
    skip_common_header(&mut cursor);
    cursor.read::<u8>().map(|is_c| is_c != 0)
}

/// Read the `Proto *p` field of a Lua closure
pub(crate) fn read_closure_proto<M: MemoryAccessor + ?Sized>(
    memory: &M,
    version: LuaVersion,
    address: Address,
) -> Option<Address>
{
    let mut cursor = StructCursor::new(memory, address);
    skip_common_header(&mut cursor);
    if version == LuaVersion::Lua51 {
        cursor.skip::<u8>(); // isC
    }
    cursor.skip::<u8>(); // nupvalues
    cursor.skip_pointer(); // gclist
    if version == LuaVersion::Lua51 {
        cursor.skip_pointer(); // env
    }
    cursor.read_pointer().filter(|proto| !proto.is_null())
}
