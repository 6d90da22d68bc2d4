//! Write protection.

use crate::ral::{
    dmac::{WPMR, WPSR},
    ClearOnRead, Instance, ReadWrite, Register,
};
use crate::{ConfigurationError, Dmac, Result};

/// The key that unlocks the write protect mode register.
pub const KEY: u32 = WPMR::KEY;

/// The DMAC's write protect lock.
///
/// While locked, the DMAC ignores writes to the global configuration, the
/// global enable, and every channel's configuration registers. The driver
/// reports those writes as [`Error::WriteProtect`](crate::Error::WriteProtect).
pub struct WriteProtect<'d, I> {
    dmac: &'d Dmac<I>,
}

/// A write that the lock rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Violation {
    offset: u16,
}

impl Violation {
    /// Byte offset of the register that the rejected write targeted.
    pub fn offset(&self) -> u16 {
        self.offset
    }
    /// The register that the rejected write targeted, if it's a known register.
    pub fn register(&self) -> Option<Register> {
        Register::from_offset(self.offset as usize)
    }
}

impl<'d, I: Instance> WriteProtect<'d, I> {
    pub(crate) fn new(dmac: &'d Dmac<I>) -> Self {
        Self { dmac }
    }

    /// Engage the lock.
    pub fn lock(&self, key: u32) -> Result<()> {
        self.set(key, true)
    }

    /// Release the lock.
    pub fn unlock(&self, key: u32) -> Result<()> {
        self.set(key, false)
    }

    fn set(&self, key: u32, locked: bool) -> Result<()> {
        if key != KEY {
            tracing::warn!(key, "rejecting write protect key");
            return Err(ConfigurationError::InvalidKey.into());
        }
        let wpen = if locked { WPMR::WPEN } else { 0 };
        // Serialized with protected writes, see Dmac::write_protected.
        critical_section::with(|_| {
            self.dmac
                .registers()
                .write(ReadWrite::Wpmr, WPMR::with_key(key) | wpen);
        });
        tracing::debug!(locked, "write protect");
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.dmac.is_locked()
    }

    /// Take the record of the last rejected write.
    ///
    /// The hardware clears the record when it's read, so a second call
    /// returns `None` unless another write was rejected in between.
    pub fn violation(&self) -> Option<Violation> {
        let wpsr = critical_section::with(|_| {
            self.dmac.registers().read_clear(ClearOnRead::Wpsr)
        });
        (wpsr & WPSR::WPVS != 0).then(|| Violation {
            offset: WPSR::source(wpsr),
        })
    }
}
