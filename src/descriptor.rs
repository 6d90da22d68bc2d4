//! Transfers and linked descriptor chains.
//!
//! A [`Chain`] lays out [`Descriptor`]s in memory that you own. The DMAC
//! walks the chain on its own once the channel is armed, so a channel
//! holds on to its chain until it's disabled again.

use core::ptr;

use crate::ral::dmac::{CTRLA, CTRLB};
use crate::{ConfigurationError, Result};

/// Control A word: buffer size, chunk sizes and transfer widths.
///
/// Only the buffer size is interpreted by this driver. Compose the other
/// fields with [`from_bits`](Self::from_bits).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ControlA(u32);

impl ControlA {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
    pub const fn bits(self) -> u32 {
        self.0
    }
    /// Set the number of transfers in the buffer (BTSIZE).
    pub const fn with_buffer_size(self, size: u16) -> Self {
        Self((self.0 & !CTRLA::BTSIZE_MASK) | size as u32)
    }
    pub const fn buffer_size(self) -> u16 {
        (self.0 & CTRLA::BTSIZE_MASK) as u16
    }
}

/// Control B word: descriptor fetch, flow control and address increment.
///
/// The driver owns the descriptor fetch bits. It sets them for the final
/// buffer of a transfer, and clears them for every buffer that's followed
/// by another descriptor. Whatever you put there is overwritten.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ControlB(u32);

impl ControlB {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
    pub const fn bits(self) -> u32 {
        self.0
    }
    pub(crate) const fn fetch_disabled(self) -> Self {
        Self(self.0 | CTRLB::FETCH_DISABLE)
    }
    pub(crate) const fn fetch_enabled(self) -> Self {
        Self(self.0 & !CTRLB::FETCH_DISABLE)
    }
    /// Returns `true` if the DMAC stops after this buffer.
    pub const fn is_last(self) -> bool {
        self.0 & CTRLB::FETCH_DISABLE == CTRLB::FETCH_DISABLE
    }
}

/// One buffer's worth of transfer parameters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer {
    pub source: u32,
    pub destination: u32,
    pub control_a: ControlA,
    pub control_b: ControlB,
}

/// A transfer descriptor, as the DMAC fetches it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(4))]
pub struct Descriptor {
    source: u32,
    destination: u32,
    control_a: u32,
    control_b: u32,
    next: u32,
}

impl Descriptor {
    /// An unused descriptor, for building storage arrays.
    pub const fn new() -> Self {
        Self {
            source: 0,
            destination: 0,
            control_a: 0,
            control_b: 0,
            next: 0,
        }
    }

    pub fn transfer(&self) -> Transfer {
        Transfer {
            source: self.source,
            destination: self.destination,
            control_a: ControlA(self.control_a),
            control_b: ControlB(self.control_b),
        }
    }

    /// Bus address of the next descriptor, or zero.
    pub fn next(&self) -> u32 {
        self.next
    }

    /// Returns `true` if the DMAC stops after this descriptor.
    pub fn is_terminal(&self) -> bool {
        self.next == 0 && ControlB(self.control_b).is_last()
    }
}

/// Address of `desc` as seen by the DMAC, a 32-bit bus master.
pub(crate) fn bus_address(desc: &Descriptor) -> u32 {
    ptr::from_ref(desc) as usize as u32
}

/// An ordered, acyclic list of descriptors in caller-owned storage.
///
/// ```
/// use sam4e_dmac::{Chain, ControlA, Descriptor, Transfer};
///
/// let mut storage = [Descriptor::new(); 3];
/// let mut chain = Chain::new(&mut storage);
/// for offset in 0..3 {
///     chain.push(Transfer {
///         source: 0x2000_0000 + offset * 64,
///         destination: 0x2000_1000 + offset * 64,
///         control_a: ControlA::default().with_buffer_size(16),
///         ..Default::default()
///     }).unwrap();
/// }
/// assert_eq!(chain.len(), 3);
/// assert!(chain.iter().last().unwrap().is_terminal());
/// ```
pub struct Chain<'c> {
    storage: &'c mut [Descriptor],
    len: usize,
}

impl<'c> Chain<'c> {
    /// Start an empty chain in `storage`.
    pub fn new(storage: &'c mut [Descriptor]) -> Self {
        Self { storage, len: 0 }
    }

    /// Append a buffer to the end of the chain.
    ///
    /// The new descriptor becomes the terminal node. The one before it now
    /// links here and keeps descriptor fetch enabled.
    pub fn push(&mut self, transfer: Transfer) -> Result<()> {
        if self.len == self.storage.len() {
            return Err(ConfigurationError::ChainFull.into());
        }
        self.storage[self.len] = Descriptor {
            source: transfer.source,
            destination: transfer.destination,
            control_a: transfer.control_a.bits(),
            control_b: transfer.control_b.fetch_disabled().bits(),
            next: 0,
        };
        if let Some(prev) = self.len.checked_sub(1) {
            let next = bus_address(&self.storage[self.len]);
            let prev = &mut self.storage[prev];
            prev.next = next;
            prev.control_b = ControlB(prev.control_b).fetch_enabled().bits();
        }
        self.len += 1;
        Ok(())
    }

    /// Bus address of the first descriptor, for the channel's descriptor
    /// register.
    pub fn head(&self) -> Option<u32> {
        self.storage[..self.len].first().map(bus_address)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of descriptors this chain can hold.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.storage[..self.len].iter()
    }

    /// Drop every descriptor, keeping the storage.
    pub fn clear(&mut self) {
        self.storage[..self.len].fill(Descriptor::new());
        self.len = 0;
    }

    /// Release the storage.
    pub fn into_storage(self) -> &'c mut [Descriptor] {
        self.storage
    }
}

impl core::fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
