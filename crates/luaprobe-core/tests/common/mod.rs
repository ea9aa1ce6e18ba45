//! Shared helpers for integration tests

#![allow(dead_code)]

use std::cell::RefCell;

use luaprobe_core::error::ProbeResult;
use luaprobe_core::lua::LuaVersion;
use luaprobe_core::memory::{Endianness, MemoryAccessor, PointerWidth};
use luaprobe_core::types::Address;

/// Accessor wrapper that records the size of every read and write
pub struct RecordingMemory<M>
{
    pub inner: M,
    reads: RefCell<Vec<(Address, usize)>>,
    pub writes: Vec<(Address, usize)>,
}

impl<M: MemoryAccessor> RecordingMemory<M>
{
    pub fn new(inner: M) -> Self
    {
        Self {
            inner,
            reads: RefCell::new(Vec::new()),
            writes: Vec::new(),
        }
    }

    pub fn reads(&self) -> Vec<(Address, usize)>
    {
        self.reads.borrow().clone()
    }

    pub fn clear(&mut self)
    {
        self.reads.borrow_mut().clear();
        self.writes.clear();
    }
}

impl<M: MemoryAccessor> MemoryAccessor for RecordingMemory<M>
{
    fn read_bytes(&self, address: Address, len: usize) -> ProbeResult<Vec<u8>>
    {
        self.reads.borrow_mut().push((address, len));
        self.inner.read_bytes(address, len)
    }

    fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> ProbeResult<()>
    {
        self.writes.push((address, bytes.len()));
        self.inner.write_bytes(address, bytes)
    }

    fn pointer_width(&self) -> PointerWidth
    {
        self.inner.pointer_width()
    }

    fn endianness(&self) -> Endianness
    {
        self.inner.endianness()
    }

    fn read_c_string(&self, address: Address, max_len: usize) -> ProbeResult<Vec<u8>>
    {
        self.inner.read_c_string(address, max_len)
    }
}

/// Little-endian C struct writer that pads every field to its natural alignment
pub struct ImageBuilder
{
    bytes: Vec<u8>,
    width: PointerWidth,
}

impl ImageBuilder
{
    pub fn new(width: PointerWidth) -> Self
    {
        Self { bytes: Vec::new(), width }
    }

    pub fn len(&self) -> u64
    {
        self.bytes.len() as u64
    }

    pub fn align(&mut self, alignment: usize) -> &mut Self
    {
        while self.bytes.len() % alignment != 0 {
            self.bytes.push(0);
        }
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self
    {
        self.bytes.push(value);
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self
    {
        self.align(4);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self
    {
        self.align(4);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self
    {
        self.align(8);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self
    {
        self.align(8);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn pointer(&mut self, value: u64) -> &mut Self
    {
        match self.width {
            PointerWidth::Four => {
                self.align(4);
                self.bytes.extend_from_slice(&u32::try_from(value).unwrap().to_le_bytes());
            }
            PointerWidth::Eight => {
                self.align(8);
                self.bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        self
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self
    {
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn finish(&self) -> Vec<u8>
    {
        self.bytes.clone()
    }
}

/// `CommonHeader`: next pointer, type tag, GC mark
pub fn common_header(builder: &mut ImageBuilder, tag: u8)
{
    builder.pointer(0).u8(tag).u8(0);
}

/// A Lua 5.3 short string object (`TString` header followed by the text)
pub fn lua53_short_string(width: PointerWidth, text: &str) -> Vec<u8>
{
    let mut builder = ImageBuilder::new(width);
    common_header(&mut builder, 0x04);
    builder
        .u8(0) // extra
        .u8(u8::try_from(text.len()).unwrap()) // shrlen
        .u32(0) // hash
        .pointer(0) // hnext
        .align(8)
        .raw(text.as_bytes())
        .u8(0);
    builder.finish()
}

/// A Lua 5.3 long string object
pub fn lua53_long_string(width: PointerWidth, text: &str) -> Vec<u8>
{
    let mut builder = ImageBuilder::new(width);
    common_header(&mut builder, 0x14);
    builder
        .u8(0) // extra
        .u8(0) // shrlen
        .u32(0) // hash
        .pointer(text.len() as u64) // lnglen
        .align(8)
        .raw(text.as_bytes())
        .u8(0);
    builder.finish()
}

/// A Lua 5.4 string: header, then the contents inline
pub fn lua54_string(width: PointerWidth, text: &str, long: bool) -> Vec<u8>
{
    let len = u8::try_from(text.len()).unwrap();
    let mut builder = ImageBuilder::new(width);
    common_header(&mut builder, if long { 0x14 } else { 0x04 });
    builder
        .u8(0) // extra
        .u8(if long { 0 } else { len })
        .u32(0) // hash
        .pointer(if long { u64::from(len) } else { 0 })
        .raw(text.as_bytes())
        .u8(0);
    builder.finish()
}

/// A Lua 5.1 or 5.2 string: header padded to 8, then the contents
pub fn lua51_string(width: PointerWidth, text: &str) -> Vec<u8>
{
    let mut builder = ImageBuilder::new(width);
    common_header(&mut builder, 0x04);
    builder
        .u8(0) // reserved / extra
        .u32(0) // hash
        .pointer(text.len() as u64)
        .align(8)
        .raw(text.as_bytes())
        .u8(0);
    builder.finish()
}

/// A `TValue`: the 8-byte payload union, then an `int` tag (or a byte tag in 5.4)
pub fn tvalue(builder: &mut ImageBuilder, payload: [u8; 8], tag: u8, byte_tag: bool)
{
    builder.align(8).raw(&payload);
    if byte_tag {
        builder.u8(tag);
    } else {
        builder.i32(i32::from(tag));
    }
    builder.align(8);
}

/// Pointer payload padded to the 8-byte `Value` union
pub fn pointer_payload(width: PointerWidth, value: u64) -> [u8; 8]
{
    let mut payload = [0u8; 8];
    match width {
        PointerWidth::Four => payload[..4].copy_from_slice(&u32::try_from(value).unwrap().to_le_bytes()),
        PointerWidth::Eight => payload.copy_from_slice(&value.to_le_bytes()),
    }
    payload
}

/// Fields of a `Proto` that tests care about; everything else is zero
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoImage
{
    pub line_defined: i32,
    pub last_line_defined: i32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub size_code: i32,
    pub nested: u64,
    pub size_p: i32,
    pub source: u64,
}

/// A `Proto` in the field order of the given Lua version
pub fn proto(version: LuaVersion, width: PointerWidth, image: &ProtoImage) -> Vec<u8>
{
    let mut builder = ImageBuilder::new(width);
    common_header(&mut builder, 0x09);
    match version {
        LuaVersion::Lua51 | LuaVersion::Lua52 => {
            builder.pointer(0).pointer(0).pointer(image.nested); // k, code, p
            builder.pointer(0).pointer(0).pointer(0); // lineinfo, locvars, upvalues
            if version == LuaVersion::Lua52 {
                builder.pointer(0); // cache
            }
            builder.pointer(image.source);
            proto_sizes(&mut builder, image, false);
            builder.pointer(0); // gclist
            if version == LuaVersion::Lua51 {
                builder.u8(0); // nups
            }
            builder.u8(image.num_params).u8(u8::from(image.is_vararg)).u8(8);
        }
        LuaVersion::Lua53 | LuaVersion::Lua54 => {
            builder.u8(image.num_params).u8(u8::from(image.is_vararg)).u8(8);
            proto_sizes(&mut builder, image, version == LuaVersion::Lua54);
            builder.pointer(0).pointer(0).pointer(image.nested); // k, code, p
            builder.pointer(0).pointer(0).pointer(0).pointer(0); // four more arrays
            builder.pointer(image.source).pointer(0); // source, gclist
        }
    }
    builder.finish()
}

fn proto_sizes(builder: &mut ImageBuilder, image: &ProtoImage, abs_line_info: bool)
{
    builder
        .i32(0) // sizeupvalues
        .i32(0) // sizek
        .i32(image.size_code)
        .i32(0) // sizelineinfo
        .i32(image.size_p)
        .i32(0); // sizelocvars
    if abs_line_info {
        builder.i32(0);
    }
    builder.i32(image.line_defined).i32(image.last_line_defined);
}

/// A Lua closure header pointing at `proto`
pub fn lua_closure(version: LuaVersion, width: PointerWidth, proto: u64) -> Vec<u8>
{
    let mut builder = ImageBuilder::new(width);
    common_header(&mut builder, 0x06);
    if version == LuaVersion::Lua51 {
        builder.u8(0); // isC
    }
    builder.u8(0).pointer(0); // nupvalues, gclist
    if version == LuaVersion::Lua51 {
        builder.pointer(0); // env
    }
    builder.pointer(proto);
    builder.finish()
}
