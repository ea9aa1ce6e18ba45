//! # Function Metadata
//!
//! Reads Lua function prototypes (`Proto`) out of target memory.
//!
//! The symbol store only needs a handful of things from a function: its
//! address, its source name, and whether its line range has been computed.
//! Those are captured by the [`FunctionMetadata`] trait; [`LuaFunctionData`]
//! is the implementation that reads them from a live `Proto`.

use tracing::{debug, trace, warn};

use crate::cursor::StructCursor;
use crate::error::{ProbeError, ProbeResult};
use crate::lua::{self, LuaVersion};
use crate::memory::{MemoryAccessor, MemoryAccessorExt};
use crate::types::{Address, Fetched};

/// Upper bound on nested prototypes read from one function
pub const MAX_LOCAL_FUNCTIONS: usize = 1 << 12;

const MAX_SOURCE_LENGTH: usize = 4096;

/// What the symbol store needs to know about a function
///
/// `read_source` and `read_local_functions` may touch target memory; every
/// other method only reports state already read.
pub trait FunctionMetadata
{
    /// Address identifying this function (its `Proto`)
    ///
    /// Null until the function has been read.
    fn address(&self) -> Address;

    /// Source name, once [`FunctionMetadata::read_source`] found one
    fn source(&self) -> Option<&str>;

    /// Address of the runtime's record of the source name
    fn source_address(&self) -> Address;

    /// First line of the function's definition, or 0 if not computed yet
    fn definition_start_line(&self) -> u32;

    /// Resolve the source name
    ///
    /// Leaves [`FunctionMetadata::source`] as `None` on failure.
    fn read_source<M: MemoryAccessor + ?Sized>(&mut self, memory: &M);

    /// Discover functions defined inside this one and compute the line range
    fn read_local_functions<M: MemoryAccessor + ?Sized>(&mut self, memory: &M);
}

/// A function defined inside another function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFunction
{
    /// Address of the nested `Proto`
    pub address: Address,
    /// Line of the `function` keyword
    pub line_defined: u32,
    /// Line of the closing `end`
    pub last_line_defined: u32,
}

/// Fields read from a `Proto` header
#[derive(Debug, Clone, Copy, Default)]
struct ProtoFields
{
    num_params: u8,
    is_vararg: bool,
    max_stack_size: u8,
    size_code: i32,
    size_p: i32,
    line_defined: i32,
    last_line_defined: i32,
    nested: Address,
    source: Address,
}

/// Metadata of a Lua function prototype
///
/// ## Example
///
/// ```rust,no_run
/// use luaprobe_core::function::{FunctionMetadata, LuaFunctionData};
/// use luaprobe_core::lua::LuaVersion;
/// use luaprobe_core::memory::{PointerWidth, SnapshotMemory};
/// use luaprobe_core::types::Address;
///
/// let memory = SnapshotMemory::from_file("lua.dump", Address::from(0x10000), PointerWidth::Eight)?;
/// let mut function = LuaFunctionData::from_closure(&memory, LuaVersion::Lua53, Address::from(0x12340))?;
/// function.read_source(&memory);
/// println!("{} defined at line {}", function.source().unwrap_or("?"), function.line_defined());
/// # Ok::<(), luaprobe_core::error::ProbeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LuaFunctionData
{
    version: LuaVersion,
    address: Address,
    fields: ProtoFields,
    source: Fetched<String>,
    source_address: Address,
    definition_start_line: u32,
    definition_end_line: u32,
    local_functions: Vec<LocalFunction>,
}

impl LuaFunctionData
{
    /// Read the `Proto` at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::StructUnreadable`] if a required field of the
    /// prototype cannot be read.
    pub fn read_from<M: MemoryAccessor + ?Sized>(memory: &M, version: LuaVersion, address: Address) -> ProbeResult<Self>
    {
        if address.is_null() {
            return Err(ProbeError::InvalidArgument("null function prototype".to_string()));
        }
        let fields = read_proto(memory, version, address).ok_or(ProbeError::StructUnreadable {
            what: "function prototype",
            address,
        })?;
        debug!(%address, line = fields.line_defined, nested = fields.size_p, "read function prototype");
        Ok(Self {
            version,
            address,
            fields,
            source: Fetched::Unread,
            source_address: Address::NULL,
            definition_start_line: 0,
            definition_end_line: 0,
            local_functions: Vec::new(),
        })
    }

    /// Read the `Proto` of the Lua closure at `closure`
    ///
    /// ## Errors
    ///
    /// Returns [`ProbeError::StructUnreadable`] if the closure or its
    /// prototype cannot be read.
    pub fn from_closure<M: MemoryAccessor + ?Sized>(memory: &M, version: LuaVersion, closure: Address) -> ProbeResult<Self>
    {
        let proto = lua::read_closure_proto(memory, version, closure).ok_or(ProbeError::StructUnreadable {
            what: "Lua closure",
            address: closure,
        })?;
        Self::read_from(memory, version, proto)
    }

    /// Lua version the prototype was read with
    pub fn version(&self) -> LuaVersion
    {
        self.version
    }

    /// Line of the `function` keyword (0 for a main chunk)
    pub fn line_defined(&self) -> u32
    {
        u32::try_from(self.fields.line_defined).unwrap_or(0)
    }

    /// Line of the closing `end` (0 for a main chunk)
    pub fn last_line_defined(&self) -> u32
    {
        u32::try_from(self.fields.last_line_defined).unwrap_or(0)
    }

    /// Whether this is a main chunk rather than a `function` expression
    pub fn is_main_chunk(&self) -> bool
    {
        self.fields.line_defined == 0
    }

    /// Number of fixed parameters
    pub fn num_params(&self) -> u8
    {
        self.fields.num_params
    }

    /// Whether the function takes `...`
    pub fn is_vararg(&self) -> bool
    {
        self.fields.is_vararg
    }

    /// Register window size
    pub fn max_stack_size(&self) -> u8
    {
        self.fields.max_stack_size
    }

    /// Number of bytecode instructions
    pub fn instruction_count(&self) -> usize
    {
        usize::try_from(self.fields.size_code).unwrap_or(0)
    }

    /// Source lookup state, including why a source is absent
    pub fn source_state(&self) -> &Fetched<String>
    {
        &self.source
    }

    /// Source name without Lua's `@`/`=` prefix
    pub fn display_source(&self) -> Option<&str>
    {
        self.source().map(|source| source.strip_prefix(['@', '=']).unwrap_or(source))
    }

    /// Last line of the definition, once computed
    pub fn definition_end_line(&self) -> u32
    {
        self.definition_end_line
    }

    /// Functions defined directly inside this one, once discovered
    pub fn local_functions(&self) -> &[LocalFunction]
    {
        &self.local_functions
    }
}

impl FunctionMetadata for LuaFunctionData
{
    fn address(&self) -> Address
    {
        self.address
    }

    fn source(&self) -> Option<&str>
    {
        self.source.found().map(String::as_str)
    }

    fn source_address(&self) -> Address
    {
        self.source_address
    }

    fn definition_start_line(&self) -> u32
    {
        self.definition_start_line
    }

    fn read_source<M: MemoryAccessor + ?Sized>(&mut self, memory: &M)
    {
        if matches!(self.source, Fetched::Found(_) | Fetched::Missing) {
            return;
        }
        let pointer = self.fields.source;
        if pointer.is_null() {
            self.source = Fetched::Missing;
            return;
        }

        let text = lua::read_tstring(memory, self.version, pointer, None)
            .and_then(|header| lua::read_tstring_contents(memory, &header, MAX_SOURCE_LENGTH));
        match text {
            Some((name, _)) => {
                trace!(function = %self.address, source = %name, "resolved function source");
                self.source = Fetched::Found(name);
                self.source_address = pointer;
            }
            None => {
                warn!(function = %self.address, source = %pointer, "failed to read function source");
                self.source = Fetched::ReadFailed;
            }
        }
    }

    fn read_local_functions<M: MemoryAccessor + ?Sized>(&mut self, memory: &M)
    {
        let count = usize::try_from(self.fields.size_p).unwrap_or(0).min(MAX_LOCAL_FUNCTIONS);
        let mut locals = Vec::with_capacity(count);

        if !self.fields.nested.is_null() {
            let stride = memory.pointer_width().bytes();
            let mut slot = self.fields.nested;
            for _ in 0..count {
                let nested = memory
                    .read_pointer(slot)
                    .filter(|proto| !proto.is_null())
                    .and_then(|proto| read_proto(memory, self.version, proto).map(|fields| (proto, fields)));
                match nested {
                    Some((address, fields)) => locals.push(LocalFunction {
                        address,
                        line_defined: u32::try_from(fields.line_defined).unwrap_or(0),
                        last_line_defined: u32::try_from(fields.last_line_defined).unwrap_or(0),
                    }),
                    None => warn!(function = %self.address, slot = %slot, "skipping unreadable nested function"),
                }
                slot = slot + stride;
            }
        }

        if self.is_main_chunk() {
            self.definition_start_line = 1;
            self.definition_end_line = locals.iter().map(|local| local.last_line_defined).max().unwrap_or(1);
        } else {
            self.definition_start_line = self.line_defined();
            self.definition_end_line = self.last_line_defined();
        }
        debug!(
            function = %self.address,
            locals = locals.len(),
            start = self.definition_start_line,
            end = self.definition_end_line,
            "discovered local functions"
        );
        self.local_functions = locals;
    }
}

fn read_proto<M: MemoryAccessor + ?Sized>(memory: &M, version: LuaVersion, address: Address) -> Option<ProtoFields>
{
    let mut cursor = StructCursor::new(memory, address);
    cursor.skip_pointer(); // next
    cursor.skip::<u8>(); // tt
    cursor.skip::<u8>(); // marked

    match version {
        LuaVersion::Lua51 | LuaVersion::Lua52 => read_proto_pointers_first(&mut cursor, version),
        LuaVersion::Lua53 | LuaVersion::Lua54 => read_proto_sizes_first(&mut cursor, version),
    }
}

// 5.1 and 5.2: pointer block, int block, gclist, then byte fields.
fn read_proto_pointers_first<M: MemoryAccessor + ?Sized>(
    cursor: &mut StructCursor<'_, M>,
    version: LuaVersion,
) -> Option<ProtoFields>
{
    let mut fields = ProtoFields::default();

    cursor.skip_pointer(); // k
    cursor.skip_pointer(); // code
    fields.nested = cursor.read_pointer()?;
    cursor.skip_pointer(); // lineinfo
    cursor.skip_pointer(); // locvars
    cursor.skip_pointer(); // upvalues
    if version == LuaVersion::Lua52 {
        cursor.skip_pointer(); // cache
    }
    fields.source = cursor.read_pointer()?;

    cursor.skip::<i32>(); // sizeupvalues
    cursor.skip::<i32>(); // sizek
    fields.size_code = cursor.read::<i32>()?;
    cursor.skip::<i32>(); // sizelineinfo
    fields.size_p = cursor.read::<i32>()?;
    cursor.skip::<i32>(); // sizelocvars
    fields.line_defined = cursor.read::<i32>()?;
    fields.last_line_defined = cursor.read::<i32>()?;
    cursor.skip_pointer(); // gclist

    if version == LuaVersion::Lua51 {
        cursor.skip::<u8>(); // nups
    }
    fields.num_params = cursor.read::<u8>()?;
    fields.is_vararg = cursor.read::<u8>()? != 0;
    fields.max_stack_size = cursor.read::<u8>()?;
    Some(fields)
}

// 5.3 and 5.4: byte fields, int block, then pointer block.
fn read_proto_sizes_first<M: MemoryAccessor + ?Sized>(
    cursor: &mut StructCursor<'_, M>,
    version: LuaVersion,
) -> Option<ProtoFields>
{
    let mut fields = ProtoFields {
        num_params: cursor.read::<u8>()?,
        is_vararg: cursor.read::<u8>()? != 0,
        max_stack_size: cursor.read::<u8>()?,
        ..ProtoFields::default()
    };

    cursor.skip::<i32>(); // sizeupvalues
    cursor.skip::<i32>(); // sizek
    fields.size_code = cursor.read::<i32>()?;
    cursor.skip::<i32>(); // sizelineinfo
    fields.size_p = cursor.read::<i32>()?;
    cursor.skip::<i32>(); // sizelocvars
    if version == LuaVersion::Lua54 {
        cursor.skip::<i32>(); // sizeabslineinfo
    }
    fields.line_defined = cursor.read::<i32>()?;
    fields.last_line_defined = cursor.read::<i32>()?;

    cursor.skip_pointer(); // k
    cursor.skip_pointer(); // code
    fields.nested = cursor.read_pointer()?;
    if version == LuaVersion::Lua54 {
        cursor.skip_pointer(); // upvalues
        cursor.skip_pointer(); // lineinfo
        cursor.skip_pointer(); // abslineinfo
        cursor.skip_pointer(); // locvars
    } else {
        cursor.skip_pointer(); // lineinfo
        cursor.skip_pointer(); // locvars
        cursor.skip_pointer(); // upvalues
        cursor.skip_pointer(); // cache
    }
    fields.source = cursor.read_pointer()?;
    Some(fields)
}
