//! # Breakpoint Mechanism
//!
//! Trap-word bookkeeping for OS-enforced breakpoints.
//!
//! This is the *mechanism* half of breakpoints only: remembering which
//! machine words were patched with a trap instruction so they can be
//! restored. Deciding where breakpoints go belongs to the caller.
//!
//! Every patch must be restored before tracing control is released (a
//! tracee left running with an injected trap byte will crash on it), so
//! detach and kill drain the set first.

use std::collections::HashMap;

use crate::types::Address;

/// The word written at a patched address, for the build architecture, or
/// `None` when no trap encoding is known for this architecture.
///
/// x86-64 replaces the low byte with `INT3` (0xCC); AArch64 replaces the low
/// 32 bits with `BRK #0` (0xD4200000).
pub fn trap_word(original: u64) -> Option<u64>
{
    #[cfg(target_arch = "x86_64")]
    {
        Some(trap_word_x86_64(original))
    }

    #[cfg(target_arch = "aarch64")]
    {
        Some(trap_word_arm64(original))
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        let _ = original;
        None
    }
}

/// x86-64 trap patch: low byte becomes `INT3`.
pub fn trap_word_x86_64(original: u64) -> u64
{
    (original & !0xff) | 0xcc
}

/// AArch64 trap patch: low instruction word becomes `BRK #0`.
pub fn trap_word_arm64(original: u64) -> u64
{
    (original & !0xffff_ffff) | 0xd420_0000
}

/// One patched word: where, and what was there before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapPatch
{
    /// Word-aligned tracee address that was patched.
    pub address: Address,
    /// Original machine word, restored on removal.
    pub original_word: u64,
}

/// The set of currently installed trap patches for one session
#[derive(Debug, Default)]
pub struct PatchSet
{
    by_address: HashMap<Address, TrapPatch>,
}

impl PatchSet
{
    /// Create an empty patch set.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Track a newly installed patch. Returns `false` (and keeps the existing
    /// entry) if the address is already patched: the original word on record
    /// is the one that predates any trap byte.
    pub fn insert(&mut self, patch: TrapPatch) -> bool
    {
        if self.by_address.contains_key(&patch.address) {
            return false;
        }
        self.by_address.insert(patch.address, patch);
        true
    }

    /// Stop tracking a patch, returning it so the caller can restore the word.
    pub fn remove(&mut self, address: Address) -> Option<TrapPatch>
    {
        self.by_address.remove(&address)
    }

    /// Whether an address currently carries a patch.
    pub fn contains(&self, address: Address) -> bool
    {
        self.by_address.contains_key(&address)
    }

    /// Remove and return every tracked patch.
    pub fn drain(&mut self) -> Vec<TrapPatch>
    {
        self.by_address.drain().map(|(_, patch)| patch).collect()
    }

    /// Forget every tracked patch without returning it. Used when the tracee
    /// is gone and there is nothing left to restore.
    pub fn clear(&mut self)
    {
        self.by_address.clear();
    }

    /// Number of installed patches.
    pub fn len(&self) -> usize
    {
        self.by_address.len()
    }

    /// Whether no patches are installed.
    pub fn is_empty(&self) -> bool
    {
        self.by_address.is_empty()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_trap_word_x86_64_patches_low_byte()
    {
        assert_eq!(trap_word_x86_64(0x1122_3344_5566_7788), 0x1122_3344_5566_77cc);
    }

    #[test]
    fn test_trap_word_arm64_patches_low_word()
    {
        assert_eq!(trap_word_arm64(0x1122_3344_5566_7788), 0x1122_3344_d420_0000);
    }

    #[test]
    fn test_patch_set_keeps_first_original()
    {
        let mut patches = PatchSet::new();
        let address = Address::from(0x1000);

        assert!(patches.insert(TrapPatch {
            address,
            original_word: 0xaa,
        }));
        // A second install at the same address must not clobber the original
        assert!(!patches.insert(TrapPatch {
            address,
            original_word: 0xcc,
        }));

        let restored = patches.remove(address).unwrap();
        assert_eq!(restored.original_word, 0xaa);
        assert!(patches.is_empty());
    }
}
