//! Remote memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed address in the target process
///
/// This wrapper around `u64` keeps remote addresses apart from sizes, counts,
/// and decoded payloads. It is used for 32-bit targets too: a 4-byte pointer
/// read from the target is widened into an `Address`.
///
/// The null address has a special meaning in the value model: a value whose
/// `original_address` is [`Address::NULL`] was synthesized locally and is not
/// tied to a live remote location.
///
/// ## Example
///
/// ```rust
/// use luaprobe_core::types::Address;
///
/// let addr = Address::from(0x1001);
/// assert_eq!(addr.align_up(8), Address::from(0x1008));
/// assert_eq!((addr + 0x10).value(), 0x1011);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const NULL: Self = Address(0);

    /// Create a new address from a `u64` value (usable in const contexts)
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Round this address up to the next multiple of `alignment`
    ///
    /// `alignment` must be a power of two; an alignment of 0 or 1 leaves the
    /// address unchanged. Rounding saturates instead of wrapping past the top
    /// of the address space.
    ///
    /// ```rust
    /// use luaprobe_core::types::Address;
    ///
    /// assert_eq!(Address::from(0x1000).align_up(4), Address::from(0x1000));
    /// assert_eq!(Address::from(0x1001).align_up(4), Address::from(0x1004));
    /// assert_eq!(Address::from(0x1001).align_up(1), Address::from(0x1001));
    /// ```
    pub fn align_up(self, alignment: u64) -> Self
    {
        if alignment <= 1 {
            return self;
        }
        debug_assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        let mask = alignment - 1;
        Address(self.0.saturating_add(mask) & !mask)
    }

    /// Add an offset to this address, checking for overflow
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract another address, returning the distance if `self` is not below `base`
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
