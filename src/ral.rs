//! A RAL-like module to support DMAC register access
//!
//! The register block in [`dmac`] mirrors the physical layout. Drivers
//! never touch it directly; they go through [`Instance`], which splits
//! register access by access mode. A write-only register has no read
//! operation, and a clear-on-read register can only be read through
//! [`Instance::read_clear`], so the hardware contract is visible in every
//! call site.

#![allow(
    non_snake_case, // Compatibility with RAL
)]

pub mod dmac;

use ral_registers::{RORegister, RWRegister, WORegister};

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

/// Read-write registers.
///
/// Channel registers carry the channel number, `0..4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadWrite {
    Gcfg,
    En,
    Sreq,
    Creq,
    Last,
    Saddr(u8),
    Daddr(u8),
    Dscr(u8),
    CtrlA(u8),
    CtrlB(u8),
    Cfg(u8),
    Wpmr,
}

/// Write-only registers. Each one sets or clears bits elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOnly {
    /// Sets interrupt mask bits.
    Ebcier,
    /// Clears interrupt mask bits.
    Ebcidr,
    /// Requests channel enable.
    Cher,
    /// Requests channel disable.
    Chdr,
}

/// Read-only registers without read side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadOnly {
    Ebcimr,
    Chsr,
}

/// Read-only registers that clear the bits they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClearOnRead {
    Ebcisr,
    Wpsr,
}

/// Identity of any DMAC register.
///
/// Used to report which register a rejected write targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Gcfg,
    En,
    Sreq,
    Creq,
    Last,
    Ebcier,
    Ebcidr,
    Ebcimr,
    Ebcisr,
    Cher,
    Chdr,
    Chsr,
    Saddr(u8),
    Daddr(u8),
    Dscr(u8),
    CtrlA(u8),
    CtrlB(u8),
    Cfg(u8),
    Wpmr,
    Wpsr,
}

impl Register {
    /// Byte offset from the start of the DMAC block.
    pub const fn offset(self) -> usize {
        const fn channel(n: u8, word: usize) -> usize {
            dmac::CHANNEL_BLOCK + dmac::CHANNEL_STRIDE * n as usize + 4 * word
        }
        match self {
            Register::Gcfg => 0x00,
            Register::En => 0x04,
            Register::Sreq => 0x08,
            Register::Creq => 0x0C,
            Register::Last => 0x10,
            Register::Ebcier => 0x18,
            Register::Ebcidr => 0x1C,
            Register::Ebcimr => 0x20,
            Register::Ebcisr => 0x24,
            Register::Cher => 0x28,
            Register::Chdr => 0x2C,
            Register::Chsr => 0x30,
            Register::Saddr(n) => channel(n, 0),
            Register::Daddr(n) => channel(n, 1),
            Register::Dscr(n) => channel(n, 2),
            Register::CtrlA(n) => channel(n, 3),
            Register::CtrlB(n) => channel(n, 4),
            Register::Cfg(n) => channel(n, 5),
            Register::Wpmr => 0x1E4,
            Register::Wpsr => 0x1E8,
        }
    }

    /// Decodes a byte offset, as reported by the write protect status register.
    pub fn from_offset(offset: usize) -> Option<Self> {
        let global = match offset {
            0x00 => Some(Register::Gcfg),
            0x04 => Some(Register::En),
            0x08 => Some(Register::Sreq),
            0x0C => Some(Register::Creq),
            0x10 => Some(Register::Last),
            0x18 => Some(Register::Ebcier),
            0x1C => Some(Register::Ebcidr),
            0x20 => Some(Register::Ebcimr),
            0x24 => Some(Register::Ebcisr),
            0x28 => Some(Register::Cher),
            0x2C => Some(Register::Chdr),
            0x30 => Some(Register::Chsr),
            0x1E4 => Some(Register::Wpmr),
            0x1E8 => Some(Register::Wpsr),
            _ => None,
        };
        if global.is_some() {
            return global;
        }
        let relative = offset.checked_sub(dmac::CHANNEL_BLOCK)?;
        let n = relative / dmac::CHANNEL_STRIDE;
        if n >= dmac::CHANNELS || relative % 4 != 0 {
            return None;
        }
        let n = n as u8;
        match (relative % dmac::CHANNEL_STRIDE) / 4 {
            0 => Some(Register::Saddr(n)),
            1 => Some(Register::Daddr(n)),
            2 => Some(Register::Dscr(n)),
            3 => Some(Register::CtrlA(n)),
            4 => Some(Register::CtrlB(n)),
            5 => Some(Register::Cfg(n)),
            _ => None,
        }
    }

    /// Returns `true` if the write protect lock guards this register.
    pub const fn is_protected(self) -> bool {
        matches!(
            self,
            Register::Gcfg
                | Register::En
                | Register::Saddr(_)
                | Register::Daddr(_)
                | Register::Dscr(_)
                | Register::CtrlA(_)
                | Register::CtrlB(_)
                | Register::Cfg(_)
        )
    }
}

impl From<ReadWrite> for Register {
    fn from(reg: ReadWrite) -> Self {
        match reg {
            ReadWrite::Gcfg => Register::Gcfg,
            ReadWrite::En => Register::En,
            ReadWrite::Sreq => Register::Sreq,
            ReadWrite::Creq => Register::Creq,
            ReadWrite::Last => Register::Last,
            ReadWrite::Saddr(n) => Register::Saddr(n),
            ReadWrite::Daddr(n) => Register::Daddr(n),
            ReadWrite::Dscr(n) => Register::Dscr(n),
            ReadWrite::CtrlA(n) => Register::CtrlA(n),
            ReadWrite::CtrlB(n) => Register::CtrlB(n),
            ReadWrite::Cfg(n) => Register::Cfg(n),
            ReadWrite::Wpmr => Register::Wpmr,
        }
    }
}

impl From<WriteOnly> for Register {
    fn from(reg: WriteOnly) -> Self {
        match reg {
            WriteOnly::Ebcier => Register::Ebcier,
            WriteOnly::Ebcidr => Register::Ebcidr,
            WriteOnly::Cher => Register::Cher,
            WriteOnly::Chdr => Register::Chdr,
        }
    }
}

impl From<ReadOnly> for Register {
    fn from(reg: ReadOnly) -> Self {
        match reg {
            ReadOnly::Ebcimr => Register::Ebcimr,
            ReadOnly::Chsr => Register::Chsr,
        }
    }
}

impl From<ClearOnRead> for Register {
    fn from(reg: ClearOnRead) -> Self {
        match reg {
            ClearOnRead::Ebcisr => Register::Ebcisr,
            ClearOnRead::Wpsr => Register::Wpsr,
        }
    }
}

/// Access to one DMAC register file.
///
/// # Safety
///
/// Implementations must reach a single DMAC instance, and the DMAC driver
/// assumes it's the only software touching those registers. Channel numbers
/// passed in are always less than four.
pub unsafe trait Instance {
    /// Reads a read-write register.
    fn read(&self, reg: ReadWrite) -> u32;
    /// Writes a read-write register.
    fn write(&self, reg: ReadWrite, value: u32);
    /// Writes a set / clear register. There is nothing to read back.
    fn write_only(&self, reg: WriteOnly, value: u32);
    /// Reads a read-only register.
    fn read_only(&self, reg: ReadOnly) -> u32;
    /// Reads, and therefore clears, a clear-on-read register.
    fn read_clear(&self, reg: ClearOnRead) -> u32;
}

// Safety: forwards to the referenced instance, which upholds the contract.
unsafe impl<T: Instance + ?Sized> Instance for &T {
    fn read(&self, reg: ReadWrite) -> u32 {
        (**self).read(reg)
    }
    fn write(&self, reg: ReadWrite, value: u32) {
        (**self).write(reg, value)
    }
    fn write_only(&self, reg: WriteOnly, value: u32) {
        (**self).write_only(reg, value)
    }
    fn read_only(&self, reg: ReadOnly) -> u32 {
        (**self).read_only(reg)
    }
    fn read_clear(&self, reg: ClearOnRead) -> u32 {
        (**self).read_clear(reg)
    }
}

/// Memory-mapped DMAC registers.
pub struct Mmio(Static<dmac::RegisterBlock>);

impl Mmio {
    /// Use the DMAC registers found at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to the start of a DMAC register block, and the
    /// returned object must be the only one that points there.
    pub const unsafe fn new(base: *const ()) -> Self {
        Self(Static(base.cast()))
    }

    /// Use the SAM4E DMAC.
    ///
    /// # Safety
    ///
    /// See [`new`](Self::new). Call this once.
    pub const unsafe fn sam4e() -> Self {
        Self::new(dmac::BASE as *const ())
    }

    fn channel(&self, n: u8) -> &dmac::ChannelRegisters {
        &self.0.CH[n as usize]
    }
}

// Safety: there is only one Mmio per register block. Sending it moves the
// only handle.
unsafe impl Send for Mmio {}
// Safety: every method is a single 32-bit volatile access. Callers that
// need read-modify-write sequences serialize them with a critical section.
unsafe impl Sync for Mmio {}

// Safety: caller of Mmio::new promised a valid, unique block.
unsafe impl Instance for Mmio {
    fn read(&self, reg: ReadWrite) -> u32 {
        match reg {
            ReadWrite::Gcfg => self.0.GCFG.read(),
            ReadWrite::En => self.0.EN.read(),
            ReadWrite::Sreq => self.0.SREQ.read(),
            ReadWrite::Creq => self.0.CREQ.read(),
            ReadWrite::Last => self.0.LAST.read(),
            ReadWrite::Saddr(n) => self.channel(n).SADDR.read(),
            ReadWrite::Daddr(n) => self.channel(n).DADDR.read(),
            ReadWrite::Dscr(n) => self.channel(n).DSCR.read(),
            ReadWrite::CtrlA(n) => self.channel(n).CTRLA.read(),
            ReadWrite::CtrlB(n) => self.channel(n).CTRLB.read(),
            ReadWrite::Cfg(n) => self.channel(n).CFG.read(),
            ReadWrite::Wpmr => self.0.WPMR.read(),
        }
    }

    fn write(&self, reg: ReadWrite, value: u32) {
        match reg {
            ReadWrite::Gcfg => self.0.GCFG.write(value),
            ReadWrite::En => self.0.EN.write(value),
            ReadWrite::Sreq => self.0.SREQ.write(value),
            ReadWrite::Creq => self.0.CREQ.write(value),
            ReadWrite::Last => self.0.LAST.write(value),
            ReadWrite::Saddr(n) => self.channel(n).SADDR.write(value),
            ReadWrite::Daddr(n) => self.channel(n).DADDR.write(value),
            ReadWrite::Dscr(n) => self.channel(n).DSCR.write(value),
            ReadWrite::CtrlA(n) => self.channel(n).CTRLA.write(value),
            ReadWrite::CtrlB(n) => self.channel(n).CTRLB.write(value),
            ReadWrite::Cfg(n) => self.channel(n).CFG.write(value),
            ReadWrite::Wpmr => self.0.WPMR.write(value),
        }
    }

    fn write_only(&self, reg: WriteOnly, value: u32) {
        match reg {
            WriteOnly::Ebcier => self.0.EBCIER.write(value),
            WriteOnly::Ebcidr => self.0.EBCIDR.write(value),
            WriteOnly::Cher => self.0.CHER.write(value),
            WriteOnly::Chdr => self.0.CHDR.write(value),
        }
    }

    fn read_only(&self, reg: ReadOnly) -> u32 {
        match reg {
            ReadOnly::Ebcimr => self.0.EBCIMR.read(),
            ReadOnly::Chsr => self.0.CHSR.read(),
        }
    }

    fn read_clear(&self, reg: ClearOnRead) -> u32 {
        match reg {
            ClearOnRead::Ebcisr => self.0.EBCISR.read(),
            ClearOnRead::Wpsr => self.0.WPSR.read(),
        }
    }
}
