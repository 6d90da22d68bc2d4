//! Error and completion interrupts.

use bitflags::bitflags;

use crate::ral::{
    dmac::{CHANNELS, EBCI},
    ClearOnRead, Instance, ReadOnly, WriteOnly,
};
use crate::Dmac;

bitflags! {
    /// Per-channel interrupt events.
    ///
    /// The same layout describes the interrupt mask and the latched status.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Events: u32 {
        /// Channel 0 finished a buffer.
        const BTC0 = 1 << 0;
        const BTC1 = 1 << 1;
        const BTC2 = 1 << 2;
        const BTC3 = 1 << 3;
        /// Channel 0 finished the last buffer of a descriptor chain.
        const CBTC0 = 1 << 8;
        const CBTC1 = 1 << 9;
        const CBTC2 = 1 << 10;
        const CBTC3 = 1 << 11;
        /// Channel 0 hit a bus error.
        const ERR0 = 1 << 16;
        const ERR1 = 1 << 17;
        const ERR2 = 1 << 18;
        const ERR3 = 1 << 19;
    }
}

impl Events {
    /// The bit at `shift + channel`, or nothing for a channel that doesn't exist.
    const fn per_channel(shift: u32, channel: u8) -> Self {
        if channel as usize >= CHANNELS {
            return Self::empty();
        }
        Self::from_bits_truncate(1 << (shift + channel as u32))
    }

    /// Buffer complete on `channel`.
    pub const fn buffer_complete(channel: u8) -> Self {
        Self::per_channel(EBCI::BTC_SHIFT, channel)
    }

    /// Chained buffer complete on `channel`.
    pub const fn chain_complete(channel: u8) -> Self {
        Self::per_channel(EBCI::CBTC_SHIFT, channel)
    }

    /// Error on `channel`.
    pub const fn error(channel: u8) -> Self {
        Self::per_channel(EBCI::ERR_SHIFT, channel)
    }

    /// Every event that `channel` can raise.
    pub const fn channel(channel: u8) -> Self {
        Self::buffer_complete(channel)
            .union(Self::chain_complete(channel))
            .union(Self::error(channel))
    }

    /// Channels with an error event, one bit per channel.
    pub const fn errors(self) -> u8 {
        ((self.bits() >> EBCI::ERR_SHIFT) & EBCI::CHANNEL_MASK) as u8
    }
}

/// Interrupt mask and status for every channel.
pub struct Interrupts<'d, I> {
    dmac: &'d Dmac<I>,
}

impl<'d, I: Instance> Interrupts<'d, I> {
    pub(crate) fn new(dmac: &'d Dmac<I>) -> Self {
        Self { dmac }
    }

    /// Unmask `events`. Events that are already unmasked stay that way.
    pub fn enable(&self, events: Events) {
        self.dmac
            .registers()
            .write_only(WriteOnly::Ebcier, events.bits());
    }

    /// Mask `events`. Events outside of `events` are unaffected.
    pub fn disable(&self, events: Events) {
        self.dmac
            .registers()
            .write_only(WriteOnly::Ebcidr, events.bits());
    }

    /// The unmasked events.
    pub fn current_mask(&self) -> Events {
        Events::from_bits_truncate(self.dmac.registers().read_only(ReadOnly::Ebcimr))
    }

    /// Take the latched events.
    ///
    /// Reading the status register clears every event it returns. Call this
    /// from a single place, usually your DMAC interrupt handler; any other
    /// caller would consume events that the handler expects to see.
    ///
    /// Error events mark their channel as [`ErrorLatched`](crate::State::ErrorLatched).
    pub fn pending(&self) -> Events {
        critical_section::with(|_| {
            let raw = self.dmac.registers().read_clear(ClearOnRead::Ebcisr);
            let events = Events::from_bits_truncate(raw);
            if !events.is_empty() {
                tracing::trace!(events = events.bits(), "DMAC interrupt status");
            }
            let errors = events.errors();
            if errors != 0 {
                tracing::warn!(channels = errors, "DMAC transfer error");
                self.dmac.latch_faults(errors);
            }
            events
        })
    }
}
