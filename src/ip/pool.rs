//! Sequential address allocator and /30 peer arithmetic.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{Result, TopoError};

const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Monotonic allocator handing out one block of `2^(32 - prefix_len)`
/// addresses per call, starting at `base`.
///
/// There is no deallocation: the generators walk each pool exactly once.
#[derive(Clone)]
pub struct AddressPool {
    base: Ipv4Addr,
    prefix_len: u8,
    /// Next address to hand out, kept wider than 32 bits so the carry out
    /// of the first octet is observable.
    cursor: u64,
    step: u64,
}

impl AddressPool {
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(TopoError::InvalidPrefixLength(prefix_len));
        }
        Ok(Self {
            base,
            prefix_len,
            cursor: u64::from(u32::from(base)),
            step: 1u64 << (32 - u32::from(prefix_len)),
        })
    }

    /// Return the address under the cursor and advance by one block.
    ///
    /// Advancing is the octet-wise base-256 carry from the last octet
    /// towards the first. The call whose advance carries out of the first
    /// octet fails with `AddressSpaceExhausted` and hands out nothing, so
    /// the block starting at `2^32 - step` is never returned.
    pub fn allocate(&mut self) -> Result<Ipv4Addr> {
        let next = self.cursor + self.step;
        if next >= ADDRESS_SPACE_END {
            return Err(TopoError::AddressSpaceExhausted {
                base: self.base,
                prefix_len: self.prefix_len,
            });
        }
        let current = Ipv4Addr::from(self.cursor as u32);
        self.cursor = next;
        Ok(current)
    }

    /// Number of successful `allocate()` calls still possible.
    pub fn remaining(&self) -> u64 {
        match ADDRESS_SPACE_END.checked_sub(self.cursor + 1) {
            Some(room) => room / self.step,
            None => 0,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl fmt::Debug for AddressPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressPool")
            .field("base", &format_args!("{}/{}", self.base, self.prefix_len))
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Other endpoint of the /30 point-to-point link that `addr` belongs to.
///
/// The two usable hosts of a /30 sit at offsets 1 and 2; offset 1 maps to
/// +1 and offset 2 to -1. Network and broadcast addresses have no peer.
pub fn link_local_peer(addr: Ipv4Addr) -> Result<Ipv4Addr> {
    let raw = u32::from(addr);
    match raw & 0b11 {
        1 => Ok(Ipv4Addr::from(raw + 1)),
        2 => Ok(Ipv4Addr::from(raw - 1)),
        _ => Err(TopoError::InvalidLinkAddress(addr)),
    }
}
