//! Tracee memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed address in the tracee's virtual address space
///
/// This wrapper around `u64` prevents accidentally mixing tracee addresses
/// with other numeric values (sizes, word values read out of tracee memory,
/// raw wait statuses).
///
/// ## Address Space
///
/// Addresses are 64-bit values even when the kernel only populates 48 (or 57)
/// of them; the engine never interprets the unused bits.
///
/// ## Example
///
/// ```rust
/// use tether_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next = addr + 0x100;
/// assert_eq!(next.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// Equivalent to `Address::from(value)` but usable in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    ///
    /// Use this when handing the address to platform-specific calls that
    /// expect a plain integer or pointer.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Subtract an offset from this address, saturating at zero
    pub fn saturating_sub(self, offset: u64) -> Self
    {
        Address(self.0.saturating_sub(offset))
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
        write!(f, "0x{:016x}", self.0)
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
