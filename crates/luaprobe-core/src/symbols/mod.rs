//! # Symbol Store
//!
//! Per-VM cache of what the debugger has learned about a Lua program.
//!
//! ```text
//! SymbolStore
//! └── StateSymbols            one per lua_State (keyed by its address)
//!     ├── SourceSymbols       one per source name
//!     │   └── functions       keyed by function address, first registration wins
//!     ├── function names      address -> name, last write wins
//!     └── ScriptSymbols       one per script name, replaced wholesale
//! ```
//!
//! The store owns everything it holds; nothing inside points back at its
//! owner. It does no locking: callers serialize access, which matches the
//! one-request-at-a-time model of a debugger host.

mod state;

pub use state::{ScriptSymbols, SourceSymbols, StateSymbols};

use std::collections::HashMap;

use tracing::debug;

use crate::function::{FunctionMetadata, LuaFunctionData};
use crate::types::Address;

/// Registry of per-VM symbol tables
///
/// VMs are created on first reference and live until [`SymbolStore::remove`]
/// is called, typically when the debugger sees the VM being closed.
///
/// ## Example
///
/// ```rust
/// use luaprobe_core::symbols::SymbolStore;
/// use luaprobe_core::types::Address;
///
/// let mut store: SymbolStore = SymbolStore::new();
/// let vm = Address::from(0x7f00_1000);
///
/// store.fetch_or_create(vm).add_function_name(Address::from(0x10), "on_update");
/// assert_eq!(store.fetch_or_create(vm).fetch_function_name(Address::from(0x10)), Some("on_update"));
///
/// store.remove(vm);
/// assert_eq!(store.fetch_or_create(vm).fetch_function_name(Address::from(0x10)), None);
/// ```
#[derive(Debug)]
pub struct SymbolStore<F = LuaFunctionData>
{
    known_states: HashMap<Address, StateSymbols<F>>,
}

impl<F> Default for SymbolStore<F>
{
    fn default() -> Self
    {
        Self {
            known_states: HashMap::new(),
        }
    }
}

impl<F: FunctionMetadata> SymbolStore<F>
{
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Symbols of the VM at `state_address`, created empty on first use
    pub fn fetch_or_create(&mut self, state_address: Address) -> &mut StateSymbols<F>
    {
        self.known_states.entry(state_address).or_insert_with(|| {
            debug!(state = %state_address, "tracking new Lua state");
            StateSymbols::new()
        })
    }

    /// Symbols of the VM at `state_address`, if it is tracked
    pub fn get(&self, state_address: Address) -> Option<&StateSymbols<F>>
    {
        self.known_states.get(&state_address)
    }

    /// Drop everything known about the VM at `state_address`
    pub fn remove(&mut self, state_address: Address)
    {
        if self.known_states.remove(&state_address).is_some() {
            debug!(state = %state_address, "dropped Lua state symbols");
        }
    }

    /// Number of tracked VMs
    pub fn len(&self) -> usize
    {
        self.known_states.len()
    }

    /// Whether no VM is tracked
    pub fn is_empty(&self) -> bool
    {
        self.known_states.is_empty()
    }
}
