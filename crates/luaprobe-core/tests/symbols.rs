//! Symbol store caching rules

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{lua53_short_string, proto, ProtoImage};
use luaprobe_core::function::{FunctionMetadata, LuaFunctionData};
use luaprobe_core::lua::LuaVersion;
use luaprobe_core::memory::{MemoryAccessor, PointerWidth, SnapshotMemory};
use luaprobe_core::symbols::{StateSymbols, SymbolStore};
use luaprobe_core::types::Address;

/// Function stand-in that counts how often the store asks it to touch memory
#[derive(Debug, Clone, Default)]
struct FakeFunction
{
    address: Address,
    source: Option<String>,
    start_line: u32,
    source_reads: Rc<Cell<usize>>,
    local_reads: Rc<Cell<usize>>,
}

impl FakeFunction
{
    fn new(address: u64, source: &str) -> Self
    {
        Self {
            address: Address::from(address),
            source: Some(source.to_string()),
            ..Self::default()
        }
    }
}

impl FunctionMetadata for FakeFunction
{
    fn address(&self) -> Address
    {
        self.address
    }

    fn source(&self) -> Option<&str>
    {
        self.source.as_deref()
    }

    fn source_address(&self) -> Address
    {
        Address::from(0x5000)
    }

    fn definition_start_line(&self) -> u32
    {
        self.start_line
    }

    fn read_source<M: MemoryAccessor + ?Sized>(&mut self, _memory: &M)
    {
        self.source_reads.set(self.source_reads.get() + 1);
    }

    fn read_local_functions<M: MemoryAccessor + ?Sized>(&mut self, _memory: &M)
    {
        self.local_reads.set(self.local_reads.get() + 1);
        self.start_line = 1;
    }
}

fn memory() -> SnapshotMemory
{
    SnapshotMemory::new(PointerWidth::Eight)
}

#[test]
fn test_registration_is_idempotent()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    let function = FakeFunction::new(0x100, "@a.lua");
    let local_reads = Rc::clone(&function.local_reads);

    assert!(symbols.add_source_from_function(&memory, function.clone()));
    assert!(!symbols.add_source_from_function(&memory, function));

    let source = symbols.fetch_source("@a.lua").unwrap();
    assert_eq!(source.function_count(), 1);
    assert_eq!(local_reads.get(), 1);
}

#[test]
fn test_first_registration_wins()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    let mut first = FakeFunction::new(0x100, "@a.lua");
    first.start_line = 10;
    let mut second = FakeFunction::new(0x100, "@a.lua");
    second.start_line = 20;

    symbols.add_source_from_function(&memory, first);
    symbols.add_source_from_function(&memory, second);
    let stored = symbols.find_function(Address::from(0x100)).unwrap();
    assert_eq!(stored.definition_start_line(), 10);
}

#[test]
fn test_function_without_source_is_not_registered()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    let mut function = FakeFunction::new(0x100, "");
    function.source = None;
    let source_reads = Rc::clone(&function.source_reads);

    assert!(!symbols.add_source_from_function(&memory, function));
    assert_eq!(symbols.source_count(), 0);
    assert_eq!(source_reads.get(), 1);
}

#[test]
fn test_computed_range_skips_local_discovery()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    let mut function = FakeFunction::new(0x100, "@a.lua");
    function.start_line = 5;
    let local_reads = Rc::clone(&function.local_reads);

    assert!(symbols.add_source_from_function(&memory, function));
    assert_eq!(local_reads.get(), 0);
}

#[test]
fn test_functions_group_by_source()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    symbols.add_source_from_function(&memory, FakeFunction::new(0x100, "@a.lua"));
    symbols.add_source_from_function(&memory, FakeFunction::new(0x200, "@a.lua"));
    symbols.add_source_from_function(&memory, FakeFunction::new(0x300, "@b.lua"));

    assert_eq!(symbols.source_count(), 2);
    let a = symbols.fetch_source("@a.lua").unwrap();
    assert_eq!(a.function_count(), 2);
    assert_eq!(a.address(), Address::from(0x5000));
    assert!(a.function(Address::from(0x300)).is_none());
    assert_eq!(
        symbols.find_function(Address::from(0x300)).map(FakeFunction::address),
        Some(Address::from(0x300))
    );
    assert!(symbols.fetch_source("@c.lua").is_none());
}

#[test]
fn test_resolved_file_name()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    symbols.add_source_from_function(&memory, FakeFunction::new(0x100, "@a.lua"));

    assert!(symbols.set_resolved_file_name("@a.lua", "/srv/game/a.lua"));
    assert!(!symbols.set_resolved_file_name("@missing.lua", "/nowhere"));
    assert_eq!(
        symbols.fetch_source("@a.lua").unwrap().resolved_file_name(),
        Some("/srv/game/a.lua")
    );
}

#[test]
fn test_function_names_overwrite()
{
    let mut symbols: StateSymbols<FakeFunction> = StateSymbols::new();
    symbols.add_function_name(Address::from(0x100), "update");
    symbols.add_function_name(Address::from(0x100), "tick");

    assert_eq!(symbols.fetch_function_name(Address::from(0x100)), Some("tick"));
    assert_eq!(symbols.fetch_function_name(Address::from(0x200)), None);
}

#[test]
fn test_scripts_are_replaced()
{
    let mut symbols: StateSymbols<FakeFunction> = StateSymbols::new();
    symbols.add_script_source("init", "return 1");
    symbols.add_script_source("init", "return 2");

    let script = symbols.fetch_script_source("init").unwrap();
    assert_eq!(script.source_file_name, "init");
    assert_eq!(script.script_content, "return 2");
    assert!(script.resolved_file_name.is_none());
    assert!(symbols.fetch_script_source("other").is_none());
}

#[test]
fn test_fetch_or_create_returns_same_state()
{
    let mut store: SymbolStore<FakeFunction> = SymbolStore::new();
    let vm = Address::from(0x7000);

    let first: *const StateSymbols<FakeFunction> = store.fetch_or_create(vm);
    let second: *const StateSymbols<FakeFunction> = store.fetch_or_create(vm);
    assert!(std::ptr::eq(first, second));
    assert_eq!(store.len(), 1);

    store.fetch_or_create(Address::from(0x8000));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_removed_state_starts_fresh()
{
    let memory = memory();
    let mut store: SymbolStore<FakeFunction> = SymbolStore::new();
    let vm = Address::from(0x7000);

    store
        .fetch_or_create(vm)
        .add_source_from_function(&memory, FakeFunction::new(0x100, "@a.lua"));
    store.fetch_or_create(vm).add_script_source("init", "return 1");

    store.remove(vm);
    assert!(store.get(vm).is_none());
    assert!(store.is_empty());

    let state = store.fetch_or_create(vm);
    assert_eq!(state.source_count(), 0);
    assert!(state.fetch_script_source("init").is_none());

    // Removing an unknown state is a no-op.
    store.remove(Address::from(0x9999));
    assert_eq!(store.len(), 1);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "must be read")]
fn test_unread_function_asserts_in_debug()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    symbols.add_source_from_function(&memory, FakeFunction::default());
}

#[cfg(not(debug_assertions))]
#[test]
fn test_unread_function_is_ignored_in_release()
{
    let memory = memory();
    let mut symbols = StateSymbols::new();
    assert!(!symbols.add_source_from_function(&memory, FakeFunction::default()));
    assert_eq!(symbols.source_count(), 0);
}

#[test]
fn test_registers_real_prototypes()
{
    let width = PointerWidth::Eight;
    let image = ProtoImage {
        line_defined: 3,
        last_line_defined: 9,
        source: 0x2000,
        ..ProtoImage::default()
    };
    let memory = SnapshotMemory::new(width)
        .with_region(0x1000, proto(LuaVersion::Lua53, width, &image))
        .with_region(0x2000, lua53_short_string(width, "@game/player.lua"));

    let mut store = SymbolStore::new();
    let function = LuaFunctionData::read_from(&memory, LuaVersion::Lua53, Address::from(0x1000)).unwrap();
    let state = store.fetch_or_create(Address::from(0x7000));
    assert!(state.add_source_from_function(&memory, function));

    let source = state.fetch_source("@game/player.lua").unwrap();
    assert_eq!(source.address(), Address::from(0x2000));
    let stored = source.function(Address::from(0x1000)).unwrap();
    assert_eq!(stored.definition_start_line(), 3);
    assert_eq!(stored.definition_end_line(), 9);
}
