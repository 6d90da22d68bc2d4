//! DMA channels.
//!
//! A [`Channel`] is claimed from the [`Dmac`](crate::Dmac) and programs one
//! of its four transfer engines. The usual sequence is
//!
//! 1. [`configure`](Channel::configure) a single buffer, or
//!    [`configure_chain`](Channel::configure_chain) a descriptor chain.
//! 2. [`enable`](Channel::enable) the channel.
//! 3. wait for [`status`](Channel::status) to report
//!    [`Disabled`](State::Disabled), or for the completion interrupt.
//!
//! Every configuration method requires a disabled channel. Nothing is queued:
//! a request against a running channel fails right away.

use crate::descriptor::{Chain, Descriptor, Transfer};
use crate::ral::{
    dmac::{CHSR, HANDSHAKE},
    Instance, ReadOnly, ReadWrite, Register, WriteOnly,
};
use crate::{ConfigurationError, Dmac, Error, Result};

/// The lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Stopped. The only state that accepts configuration.
    Disabled,
    /// Transferring, or waiting for a peripheral request.
    Active,
    /// Enabled, with CHSR reporting a suspend.
    Suspended,
    /// The DMAC reported an error. Disable, then acknowledge.
    ErrorLatched,
}

/// Software handshaking requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// One single transfer.
    Single,
    /// One chunk transfer.
    Chunk,
}

/// The side of a transfer that a software request stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    const fn bit(self, channel: u8) -> u32 {
        match self {
            Side::Source => HANDSHAKE::source(channel),
            Side::Destination => HANDSHAKE::destination(channel),
        }
    }
}

/// A DMA channel
///
/// There's at most one `Channel` per channel number. Dropping it disables the
/// channel and returns it to the [`Dmac`].
///
/// While it's running a descriptor chain, the channel owns that chain. Get it
/// back with [`take_chain`](Self::take_chain) once the channel is disabled.
pub struct Channel<'d, 'c, I: Instance> {
    /// Our channel number, expected to be between [0, 4)
    index: u8,
    dmac: &'d Dmac<I>,
    chain: Option<Chain<'c>>,
}

impl<'d, 'c, I: Instance> Channel<'d, 'c, I> {
    pub(crate) fn new(dmac: &'d Dmac<I>, index: u8) -> Self {
        Self {
            index,
            dmac,
            chain: None,
        }
    }

    /// Returns the DMA channel number
    pub fn channel(&self) -> u8 {
        self.index
    }

    /// The channel's current state.
    ///
    /// Reading the state has no side effects.
    pub fn status(&self) -> State {
        self.dmac.state(self.index)
    }

    /// Returns an error if the DMAC latched a transfer error on this channel.
    pub fn check(&self) -> Result<()> {
        if self.dmac.is_faulted(self.index) {
            Err(Error::Hardware {
                channel: self.index,
            })
        } else {
            Ok(())
        }
    }

    fn ensure_disabled(&self) -> Result<()> {
        match self.status() {
            State::Disabled => Ok(()),
            state => Err(ConfigurationError::NotDisabled {
                channel: self.index,
                state,
            }
            .into()),
        }
    }

    fn program(&self, transfer: Transfer, descriptor: u32) -> Result<()> {
        let n = self.index;
        tracing::trace!(
            channel = n,
            source = transfer.source,
            destination = transfer.destination,
            descriptor,
            "programming channel"
        );
        self.dmac.write_protected(ReadWrite::Saddr(n), transfer.source)?;
        self.dmac
            .write_protected(ReadWrite::Daddr(n), transfer.destination)?;
        self.dmac
            .write_protected(ReadWrite::CtrlA(n), transfer.control_a.bits())?;
        self.dmac
            .write_protected(ReadWrite::CtrlB(n), transfer.control_b.bits())?;
        self.dmac.write_protected(ReadWrite::Dscr(n), descriptor)
    }

    /// Program a single buffer transfer.
    ///
    /// The channel stays disabled. Any descriptor chain from an earlier
    /// transfer is dropped.
    pub fn configure(&mut self, transfer: Transfer) -> Result<()> {
        self.ensure_disabled()?;
        let transfer = Transfer {
            control_b: transfer.control_b.fetch_disabled(),
            ..transfer
        };
        self.program(transfer, 0)?;
        self.chain = None;
        Ok(())
    }

    /// Program a transfer that runs every descriptor in `chain`.
    ///
    /// The DMAC loads the head descriptor when the channel is enabled. The
    /// channel keeps the chain until you [take it back](Self::take_chain),
    /// even if the write protect lock rejects this call.
    pub fn configure_chain(&mut self, chain: Chain<'c>) -> Result<()> {
        self.ensure_disabled()?;
        if chain.is_empty() {
            return Err(ConfigurationError::ChainEmpty.into());
        }
        self.chain = Some(chain);
        self.program_chain()
    }

    /// Point the channel at the head of its chain, if it has one.
    fn program_chain(&self) -> Result<()> {
        let Some(chain) = self.chain.as_ref() else {
            return Ok(());
        };
        let mut first = chain
            .iter()
            .next()
            .map(Descriptor::transfer)
            .ok_or(ConfigurationError::ChainEmpty)?;
        let head = chain.head().ok_or(ConfigurationError::ChainEmpty)?;
        first.control_b = first.control_b.fetch_enabled();
        self.program(first, head)
    }

    /// Set the channel configuration register (CFG).
    pub fn set_configuration(&mut self, cfg: u32) -> Result<()> {
        self.ensure_disabled()?;
        self.dmac.write_protected(ReadWrite::Cfg(self.index), cfg)
    }

    /// Read back the channel configuration register.
    pub fn configuration(&self) -> u32 {
        self.dmac.registers().read(ReadWrite::Cfg(self.index))
    }

    /// Borrow the descriptor chain, if the channel isn't running it.
    ///
    /// Changes take effect the next time the channel is enabled.
    pub fn chain_mut(&mut self) -> Result<Option<&mut Chain<'c>>> {
        self.ensure_chain_released()?;
        Ok(self.chain.as_mut())
    }

    /// Take back the descriptor chain, if the channel isn't running it.
    pub fn take_chain(&mut self) -> Result<Option<Chain<'c>>> {
        self.ensure_chain_released()?;
        Ok(self.chain.take())
    }

    fn ensure_chain_released(&self) -> Result<()> {
        if self.chain.is_some() && self.status() != State::Disabled {
            return Err(ConfigurationError::ChainArmed.into());
        }
        Ok(())
    }

    /// Request that the channel starts.
    ///
    /// The channel becomes active some time after this call; watch
    /// [`status`](Self::status). The write protect lock refuses this call.
    ///
    /// A channel that holds a chain is reprogrammed from the chain's head
    /// first, so edits made through [`chain_mut`](Self::chain_mut) are
    /// picked up. An emptied chain can't run.
    ///
    /// # Safety
    ///
    /// The DMAC will read and write the memory described by the programmed
    /// addresses, and any chain descriptors, until the channel is disabled.
    /// Caller must make sure that memory stays valid for that long.
    pub unsafe fn enable(&mut self) -> Result<()> {
        self.ensure_disabled()?;
        if self.dmac.is_locked() {
            tracing::warn!(channel = self.index, "enable refused, DMAC is locked");
            return Err(Error::WriteProtect {
                register: Register::Cher,
            });
        }
        self.program_chain()?;
        barrier();
        self.dmac
            .registers()
            .write_only(WriteOnly::Cher, CHSR::ena(self.index));
        tracing::debug!(channel = self.index, "channel enable requested");
        Ok(())
    }

    /// Request that the channel stops.
    ///
    /// The channel may report [`Suspended`](State::Suspended) while it
    /// finishes in-flight work; poll [`status`](Self::status) for
    /// [`Disabled`](State::Disabled). Disabling a disabled channel does
    /// nothing.
    pub fn disable(&mut self) -> Result<()> {
        if self.status() == State::Disabled {
            return Ok(());
        }
        self.dmac
            .registers()
            .write_only(WriteOnly::Chdr, CHSR::ena(self.index));
        tracing::debug!(channel = self.index, "channel disable requested");
        Ok(())
    }

    /// Acknowledge a latched transfer error.
    ///
    /// Call this after [`disable`](Self::disable), once the hardware has
    /// stopped the channel. Returns `true` if there was an error to
    /// acknowledge. The channel is then [`Disabled`](State::Disabled).
    pub fn acknowledge(&mut self) -> Result<bool> {
        if self.dmac.registers().read_only(ReadOnly::Chsr) & CHSR::ena(self.index) != 0 {
            return Err(ConfigurationError::NotDisabled {
                channel: self.index,
                state: self.status(),
            }
            .into());
        }
        let faulted = self.dmac.clear_fault(self.index);
        if faulted {
            tracing::debug!(channel = self.index, "transfer error acknowledged");
        }
        Ok(faulted)
    }

    /// Issue a software handshaking request.
    pub fn request(&self, request: Request, side: Side) {
        let reg = match request {
            Request::Single => ReadWrite::Sreq,
            Request::Chunk => ReadWrite::Creq,
        };
        self.set_handshake(reg, side);
    }

    /// Flag the next software request as the last one.
    pub fn set_last(&self, side: Side) {
        self.set_handshake(ReadWrite::Last, side);
    }

    fn set_handshake(&self, reg: ReadWrite, side: Side) {
        // Read-modify-write on a register shared by every channel.
        critical_section::with(|_| {
            let registers = self.dmac.registers();
            let value = registers.read(reg) | side.bit(self.index);
            registers.write(reg, value);
        });
    }
}

impl<I: Instance> Drop for Channel<'_, '_, I> {
    /// Stops the channel, and waits for the hardware to let go of the
    /// chain and buffers before they return to the caller.
    fn drop(&mut self) {
        let registers = self.dmac.registers();
        let ena = CHSR::ena(self.index);
        registers.write_only(WriteOnly::Chdr, ena);
        while registers.read_only(ReadOnly::Chsr) & ena != 0 {
            core::hint::spin_loop();
        }
        self.dmac.release(self.index);
    }
}

impl<I: Instance> core::fmt::Debug for Channel<'_, '_, I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Channel").field(&self.index).finish()
    }
}

/// Make descriptor and buffer writes visible to the DMAC before it starts.
fn barrier() {
    cfg_if::cfg_if! {
        if #[cfg(all(target_arch = "arm", target_os = "none"))] {
            cortex_m::asm::dsb();
        } else {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}
