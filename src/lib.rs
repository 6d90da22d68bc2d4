//! Direct Memory Access Controller (DMAC) driver for SAM4E processors.
//!
//! `sam4e-dmac` manages the four channels of the DMAC:
//!
//! - single buffer and linked descriptor transfers, through [`Channel`]s.
//! - buffer, chain and error interrupts, through [`Interrupts`].
//! - the key-gated write protect lock, through [`WriteProtect`].
//!
//! It doesn't know why a transfer happens. Peripheral drivers build the
//! control words for their transfers, and this driver makes sure that a
//! channel is only reprogrammed while it's stopped, that descriptor chains
//! outlive the transfers that use them, and that status registers with read
//! side effects have a single reader.
//!
//! # Getting started
//!
//! Create one [`Dmac`] for the peripheral, then claim channels from it.
//!
//! ```no_run
//! use sam4e_dmac::{ControlA, Dmac, Events, Mmio, State, Transfer};
//!
//! // Safety: we only create one Mmio for the DMAC.
//! let dmac = Dmac::new(unsafe { Mmio::sam4e() });
//! dmac.enable().unwrap();
//! dmac.interrupts().enable(Events::channel(0));
//!
//! let mut channel = dmac.channel(0).unwrap();
//! # let (src, dst) = (0x2000_0000, 0x2000_1000);
//! channel
//!     .configure(Transfer {
//!         source: src,
//!         destination: dst,
//!         control_a: ControlA::default().with_buffer_size(64),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! // Safety: src and dst stay valid until the transfer is done.
//! unsafe { channel.enable() }.unwrap();
//! while channel.status() != State::Disabled {}
//! ```
//!
//! For chained transfers, lay out a [`Chain`] of [`Descriptor`]s and hand
//! it to [`Channel::configure_chain`].
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicU8, Ordering};

pub mod channel;
mod descriptor;
mod error;
mod interrupt;
#[cfg(test)]
mod model;
mod protect;
pub mod ral;

pub use channel::{Channel, Request, Side, State};
pub use descriptor::{Chain, ControlA, ControlB, Descriptor, Transfer};
pub use error::{ConfigurationError, Error};
pub use interrupt::{Events, Interrupts};
pub use protect::{Violation, WriteProtect, KEY};
pub use ral::{Instance, Mmio, Register};

use ral::{
    dmac::{CHANNELS, CHSR, EN, GCFG},
    ClearOnRead, ReadOnly, ReadWrite, WriteOnly,
};

/// A DMA result
pub type Result<T> = core::result::Result<T, Error>;

/// How the DMAC picks between channels that want the bus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Arbitration {
    /// The highest numbered channel wins.
    #[default]
    FixedPriority,
    /// Channels take turns.
    RoundRobin,
}

/// Settings shared by every channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlobalConfig {
    pub arbitration: Arbitration,
}

impl GlobalConfig {
    const fn bits(self) -> u32 {
        match self.arbitration {
            Arbitration::FixedPriority => 0,
            Arbitration::RoundRobin => GCFG::ARB_CFG,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        let arbitration = if bits & GCFG::ARB_CFG != 0 {
            Arbitration::RoundRobin
        } else {
            Arbitration::FixedPriority
        };
        Self { arbitration }
    }
}

/// A DMAC driver.
///
/// This is the one handle to the DMAC registers. It hands out each
/// [`Channel`] at most once at a time, and remembers which channels reported
/// a transfer error until that error is acknowledged.
pub struct Dmac<I> {
    registers: I,
    /// One bit per channel handed out.
    claims: AtomicU8,
    /// One bit per channel with an unacknowledged error.
    faults: AtomicU8,
}

impl<I: Instance> Dmac<I> {
    /// The number of DMA channels.
    pub const CHANNEL_COUNT: u8 = CHANNELS as u8;

    /// Create the DMAC driver.
    ///
    /// Every channel is disabled, every interrupt is masked, and any stale
    /// interrupt status is discarded. Global settings and the write protect
    /// lock are left alone.
    pub fn new(registers: I) -> Self {
        let all = (1u32 << CHANNELS) - 1;
        registers.write_only(WriteOnly::Chdr, all);
        registers.write_only(WriteOnly::Ebcidr, Events::all().bits());
        let _ = registers.read_clear(ClearOnRead::Ebcisr);
        Self {
            registers,
            claims: AtomicU8::new(0),
            faults: AtomicU8::new(0),
        }
    }

    pub(crate) fn registers(&self) -> &I {
        &self.registers
    }

    /// Claim the DMA channel described by `index`.
    ///
    /// Returns an error if there's no such channel, or if the channel is
    /// already claimed. Drop the channel to return it.
    pub fn channel<'c>(&self, index: u8) -> Result<Channel<'_, 'c, I>> {
        check_channel(index)?;
        let bit = 1 << index;
        if self.claims.fetch_or(bit, Ordering::AcqRel) & bit != 0 {
            return Err(ConfigurationError::AlreadyClaimed(index).into());
        }
        Ok(Channel::new(self, index))
    }

    pub(crate) fn release(&self, index: u8) {
        self.claims.fetch_and(!(1 << index), Ordering::AcqRel);
    }

    /// The state of channel `index`, whether or not it's claimed.
    pub fn status(&self, index: u8) -> Result<State> {
        check_channel(index)?;
        Ok(self.state(index))
    }

    pub(crate) fn state(&self, index: u8) -> State {
        if self.is_faulted(index) {
            return State::ErrorLatched;
        }
        let chsr = self.registers.read_only(ReadOnly::Chsr);
        match (chsr & CHSR::ena(index) != 0, chsr & CHSR::susp(index) != 0) {
            (true, true) => State::Suspended,
            (true, false) => State::Active,
            (false, _) => State::Disabled,
        }
    }

    pub(crate) fn latch_faults(&self, channels: u8) {
        self.faults.fetch_or(channels, Ordering::AcqRel);
    }

    pub(crate) fn is_faulted(&self, index: u8) -> bool {
        self.faults.load(Ordering::Acquire) & (1 << index) != 0
    }

    /// Clears the error latch for `index`, returning `true` if it was set.
    pub(crate) fn clear_fault(&self, index: u8) -> bool {
        let bit = 1 << index;
        self.faults.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }

    /// Interrupt mask and status.
    pub fn interrupts(&self) -> Interrupts<'_, I> {
        Interrupts::new(self)
    }

    /// The write protect lock.
    pub fn write_protect(&self) -> WriteProtect<'_, I> {
        WriteProtect::new(self)
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.registers.read(ReadWrite::Wpmr) & ral::dmac::WPMR::WPEN != 0
    }

    /// Write a register that the write protect lock guards.
    ///
    /// While locked, the write still goes out so that the DMAC records the
    /// violation, but the DMAC drops it. The lock can't change between the
    /// check and the write; [`WriteProtect`] takes the same critical section.
    pub(crate) fn write_protected(&self, reg: ReadWrite, value: u32) -> Result<()> {
        let locked = critical_section::with(|_| {
            let locked = self.is_locked();
            self.registers.write(reg, value);
            locked
        });
        if locked {
            let register = Register::from(reg);
            tracing::warn!(?register, "write rejected, DMAC is locked");
            return Err(Error::WriteProtect { register });
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        let all = (1u32 << CHANNELS) - 1;
        if self.registers.read_only(ReadOnly::Chsr) & all != 0 {
            return Err(ConfigurationError::ChannelsActive.into());
        }
        Ok(())
    }

    /// Apply global settings.
    ///
    /// Every channel must be stopped.
    pub fn set_global_config(&self, config: GlobalConfig) -> Result<()> {
        self.ensure_idle()?;
        self.write_protected(ReadWrite::Gcfg, config.bits())?;
        tracing::debug!(?config, "DMAC global configuration");
        Ok(())
    }

    pub fn global_config(&self) -> GlobalConfig {
        GlobalConfig::from_bits(self.registers.read(ReadWrite::Gcfg))
    }

    /// Turn on the controller. Channels only run while it's on.
    pub fn enable(&self) -> Result<()> {
        self.set_enabled(true)
    }

    /// Turn off the controller. Every channel must be stopped.
    pub fn disable(&self) -> Result<()> {
        self.set_enabled(false)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        let value = if enabled { EN::ENABLE } else { 0 };
        self.write_protected(ReadWrite::En, value)?;
        tracing::debug!(enabled, "DMAC enable");
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.registers.read(ReadWrite::En) & EN::ENABLE != 0
    }
}

fn check_channel(index: u8) -> Result<()> {
    if (index as usize) < CHANNELS {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidChannel(index).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::ral::{dmac::WPMR, ClearOnRead, ReadOnly, ReadWrite, WriteOnly};
    use core::sync::atomic::AtomicU32;
    use std::{sync::Barrier, thread, time::Duration};

    /// Register file whose first channel address write stalls, long enough
    /// for another thread to try to engage the lock.
    struct Stalling {
        wpmr: AtomicU32,
        saddr: AtomicU32,
        stalled: Barrier,
    }

    unsafe impl Instance for Stalling {
        fn read(&self, reg: ReadWrite) -> u32 {
            match reg {
                ReadWrite::Wpmr => self.wpmr.load(Ordering::SeqCst),
                ReadWrite::Saddr(_) => self.saddr.load(Ordering::SeqCst),
                _ => 0,
            }
        }
        fn write(&self, reg: ReadWrite, value: u32) {
            match reg {
                ReadWrite::Wpmr => self.wpmr.store(value, Ordering::SeqCst),
                ReadWrite::Saddr(_) => {
                    self.stalled.wait();
                    thread::sleep(Duration::from_millis(20));
                    if self.wpmr.load(Ordering::SeqCst) & WPMR::WPEN == 0 {
                        self.saddr.store(value, Ordering::SeqCst);
                    }
                }
                _ => {}
            }
        }
        fn write_only(&self, _: WriteOnly, _: u32) {}
        fn read_only(&self, _: ReadOnly) -> u32 {
            0
        }
        fn read_clear(&self, _: ClearOnRead) -> u32 {
            0
        }
    }

    #[test]
    fn lock_waits_for_a_protected_write() {
        let registers = Stalling {
            wpmr: AtomicU32::new(0),
            saddr: AtomicU32::new(0),
            stalled: Barrier::new(2),
        };
        let dmac = Dmac::new(&registers);
        thread::scope(|s| {
            s.spawn(|| {
                registers.stalled.wait();
                dmac.write_protect().lock(KEY).unwrap();
            });
            // Ok means the write landed.
            assert_eq!(dmac.write_protected(ReadWrite::Saddr(0), 0x2000_0000), Ok(()));
            assert_eq!(registers.saddr.load(Ordering::SeqCst), 0x2000_0000);
        });
        assert!(dmac.is_locked());
    }

    #[test]
    fn new_resets_the_controller() {
        let model = Model::new();
        model.raise(Events::BTC1 | Events::ERR0);
        let dmac = Dmac::new(&model);
        assert_eq!(dmac.interrupts().pending(), Events::empty());
        assert_eq!(dmac.interrupts().current_mask(), Events::empty());
        for n in 0..Dmac::<&Model>::CHANNEL_COUNT {
            assert_eq!(dmac.status(n), Ok(State::Disabled));
        }
    }

    #[test]
    fn global_config_round_trip() {
        let model = Model::new();
        let dmac = Dmac::new(&model);
        assert_eq!(dmac.global_config(), GlobalConfig::default());
        let config = GlobalConfig {
            arbitration: Arbitration::RoundRobin,
        };
        dmac.set_global_config(config).unwrap();
        assert_eq!(dmac.global_config(), config);
    }

    #[test]
    fn global_config_needs_idle_channels() {
        let model = Model::new();
        let dmac = Dmac::new(&model);
        let mut ch = dmac.channel(1).unwrap();
        ch.configure(Transfer {
            control_a: ControlA::default().with_buffer_size(2),
            ..Default::default()
        })
        .unwrap();
        unsafe { ch.enable() }.unwrap();

        let config = GlobalConfig {
            arbitration: Arbitration::RoundRobin,
        };
        assert_eq!(
            dmac.set_global_config(config),
            Err(Error::Configuration(ConfigurationError::ChannelsActive))
        );
        assert_eq!(
            dmac.disable(),
            Err(Error::Configuration(ConfigurationError::ChannelsActive))
        );
        model.step();
        model.step();
        dmac.set_global_config(config).unwrap();
    }

    #[test]
    fn global_config_is_write_protected() {
        let model = Model::new();
        let dmac = Dmac::new(&model);
        dmac.write_protect().lock(KEY).unwrap();
        let config = GlobalConfig {
            arbitration: Arbitration::RoundRobin,
        };
        assert_eq!(
            dmac.set_global_config(config),
            Err(Error::WriteProtect {
                register: Register::Gcfg
            })
        );
        assert_eq!(dmac.global_config(), GlobalConfig::default());
        assert!(!dmac.is_enabled());
    }

    #[test]
    fn enable_controller() {
        let model = Model::new();
        let dmac = Dmac::new(&model);
        dmac.enable().unwrap();
        assert!(dmac.is_enabled());
        dmac.disable().unwrap();
        assert!(!dmac.is_enabled());
    }
}
