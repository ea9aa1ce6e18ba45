//! Symbol tables of a single Lua VM.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, error, trace};

use crate::function::FunctionMetadata;
use crate::memory::MemoryAccessor;
use crate::types::Address;

/// Source of a chunk that was loaded from a string rather than a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSymbols
{
    /// Name the chunk was loaded under
    pub source_file_name: String,
    /// Full text of the chunk
    pub script_content: String,
    /// File the chunk was mapped to by the presentation layer, if any
    pub resolved_file_name: Option<String>,
}

/// Functions known to come from one source
#[derive(Debug)]
pub struct SourceSymbols<F>
{
    source_file_name: String,
    address: Address,
    resolved_file_name: Option<String>,
    known_functions: HashMap<Address, F>,
}

impl<F> SourceSymbols<F>
{
    fn new(source_file_name: String, address: Address) -> Self
    {
        Self {
            source_file_name,
            address,
            resolved_file_name: None,
            known_functions: HashMap::new(),
        }
    }

    /// Source name as recorded by the runtime (e.g. `@scripts/main.lua`)
    pub fn source_file_name(&self) -> &str
    {
        &self.source_file_name
    }

    /// Address of the runtime's record of the source name
    pub fn address(&self) -> Address
    {
        self.address
    }

    /// Local file the source was resolved to, if any
    pub fn resolved_file_name(&self) -> Option<&str>
    {
        self.resolved_file_name.as_deref()
    }

    /// Function registered at `address`
    pub fn function(&self, address: Address) -> Option<&F>
    {
        self.known_functions.get(&address)
    }

    /// All registered functions, in no particular order
    pub fn functions(&self) -> impl Iterator<Item = &F>
    {
        self.known_functions.values()
    }

    /// Number of registered functions
    pub fn function_count(&self) -> usize
    {
        self.known_functions.len()
    }
}

/// Everything known about one Lua VM
#[derive(Debug)]
pub struct StateSymbols<F>
{
    known_sources: HashMap<String, SourceSymbols<F>>,
    function_names: HashMap<Address, String>,
    known_scripts: HashMap<String, ScriptSymbols>,
}

impl<F> Default for StateSymbols<F>
{
    fn default() -> Self
    {
        Self {
            known_sources: HashMap::new(),
            function_names: HashMap::new(),
            known_scripts: HashMap::new(),
        }
    }
}

impl<F: FunctionMetadata> StateSymbols<F>
{
    /// Create empty tables
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Register a function under its source
    ///
    /// Resolves the function's source first; a function without a
    /// resolvable source is not registered. The first registration of an
    /// address wins and later ones are ignored. A newly registered function
    /// whose line range is not computed yet gets its local functions
    /// discovered.
    ///
    /// Returns `true` if the function was inserted.
    ///
    /// The function must have been read already (non-null address). Passing
    /// an unread function is a programming error: it asserts in debug builds
    /// and is logged and ignored otherwise.
    pub fn add_source_from_function<M: MemoryAccessor + ?Sized>(&mut self, memory: &M, mut function: F) -> bool
    {
        if function.address().is_null() {
            error!("function data must be read before it is added to the symbol store");
            debug_assert!(false, "function data must be read before it is added to the symbol store");
            return false;
        }

        function.read_source(memory);
        let Some(source_name) = function.source() else {
            trace!(function = %function.address(), "function has no source, not registering");
            return false;
        };

        let source = self
            .known_sources
            .entry(source_name.to_string())
            .or_insert_with_key(|name| {
                debug!(source = %name, "new source");
                SourceSymbols::new(name.clone(), function.source_address())
            });

        match source.known_functions.entry(function.address()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                if function.definition_start_line() == 0 {
                    function.read_local_functions(memory);
                }
                debug!(function = %function.address(), source = %source.source_file_name, "registered function");
                slot.insert(function);
                true
            }
        }
    }

    /// Source tables by name
    pub fn fetch_source(&self, source_file_name: &str) -> Option<&SourceSymbols<F>>
    {
        self.known_sources.get(source_file_name)
    }

    /// All known sources, in no particular order
    pub fn sources(&self) -> impl Iterator<Item = &SourceSymbols<F>>
    {
        self.known_sources.values()
    }

    /// Function registered at `address` under any source
    pub fn find_function(&self, address: Address) -> Option<&F>
    {
        self.known_sources.values().find_map(|source| source.function(address))
    }

    /// Record the local file a source maps to
    ///
    /// Returns `false` if the source is not known.
    pub fn set_resolved_file_name(&mut self, source_file_name: &str, resolved: impl Into<String>) -> bool
    {
        match self.known_sources.get_mut(source_file_name) {
            Some(source) => {
                source.resolved_file_name = Some(resolved.into());
                true
            }
            None => false,
        }
    }

    /// Name a function, replacing any earlier name
    pub fn add_function_name(&mut self, address: Address, name: impl Into<String>)
    {
        self.function_names.insert(address, name.into());
    }

    /// Name given to the function at `address`
    pub fn fetch_function_name(&self, address: Address) -> Option<&str>
    {
        self.function_names.get(&address).map(String::as_str)
    }

    /// Store the text of a chunk loaded from a string, replacing any earlier entry
    pub fn add_script_source(&mut self, script_name: impl Into<String>, script_content: impl Into<String>)
    {
        let script_name = script_name.into();
        let script = ScriptSymbols {
            source_file_name: script_name.clone(),
            script_content: script_content.into(),
            resolved_file_name: None,
        };
        self.known_scripts.insert(script_name, script);
    }

    /// Stored chunk text by name
    pub fn fetch_script_source(&self, script_name: &str) -> Option<&ScriptSymbols>
    {
        self.known_scripts.get(script_name)
    }

    /// Number of known sources
    pub fn source_count(&self) -> usize
    {
        self.known_sources.len()
    }
}
