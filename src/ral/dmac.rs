//! DMAC register block and fields

use super::{RORegister, RWRegister, WORegister};

/// Physical address of the DMAC on the SAM4E.
pub const BASE: usize = 0x400C_0000;

/// Number of hardware channels.
pub const CHANNELS: usize = 4;

/// DMAC registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Global Configuration Register
    pub GCFG: RWRegister<u32>,
    /// Enable Register
    pub EN: RWRegister<u32>,
    /// Software Single Request Register
    pub SREQ: RWRegister<u32>,
    /// Software Chunk Transfer Request Register
    pub CREQ: RWRegister<u32>,
    /// Software Last Transfer Flag Register
    pub LAST: RWRegister<u32>,
    _reserved0: [u32; 1],
    /// Error, Chained Buffer and Buffer Transfer Completed Interrupt Enable Register
    pub EBCIER: WORegister<u32>,
    /// Error, Chained Buffer and Buffer Transfer Completed Interrupt Disable Register
    pub EBCIDR: WORegister<u32>,
    /// Error, Chained Buffer and Buffer Transfer Completed Mask Register
    pub EBCIMR: RORegister<u32>,
    /// Error, Chained Buffer and Buffer Transfer Completed Status Register
    ///
    /// Reading this register clears it.
    pub EBCISR: RORegister<u32>,
    /// Channel Handler Enable Register
    pub CHER: WORegister<u32>,
    /// Channel Handler Disable Register
    pub CHDR: WORegister<u32>,
    /// Channel Handler Status Register
    pub CHSR: RORegister<u32>,
    _reserved1: [u32; 2],
    /// Per-channel registers
    pub CH: [ChannelRegisters; CHANNELS],
    _reserved2: [u32; 66],
    /// Write Protect Mode Register
    pub WPMR: RWRegister<u32>,
    /// Write Protect Status Register
    ///
    /// Reading this register clears it.
    pub WPSR: RORegister<u32>,
}

/// One channel's block of configuration registers.
#[repr(C)]
pub struct ChannelRegisters {
    /// Source Address Register
    pub SADDR: RWRegister<u32>,
    /// Destination Address Register
    pub DADDR: RWRegister<u32>,
    /// Descriptor Address Register
    pub DSCR: RWRegister<u32>,
    /// Control A Register
    pub CTRLA: RWRegister<u32>,
    /// Control B Register
    pub CTRLB: RWRegister<u32>,
    /// Configuration Register
    pub CFG: RWRegister<u32>,
    _reserved: [u32; 4],
}

/// Offset of the first channel block.
pub const CHANNEL_BLOCK: usize = 0x3C;
/// Distance between two channel blocks.
pub const CHANNEL_STRIDE: usize = 0x28;

const _: () = assert!(core::mem::offset_of!(RegisterBlock, LAST) == 0x10);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, EBCIER) == 0x18);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, CHSR) == 0x30);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, CH) == CHANNEL_BLOCK);
const _: () = assert!(core::mem::size_of::<ChannelRegisters>() == CHANNEL_STRIDE);
const _: () = assert!(core::mem::offset_of!(ChannelRegisters, CFG) == 0x14);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, WPMR) == 0x1E4);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, WPSR) == 0x1E8);

pub mod EN {
    pub const ENABLE: u32 = 1 << 0;
}

pub mod GCFG {
    /// Round robin arbitration when set, fixed priority when clear.
    pub const ARB_CFG: u32 = 1 << 4;
}

/// Bit layout shared by SREQ, CREQ and LAST.
///
/// Two bits per channel: source request first, then destination.
pub mod HANDSHAKE {
    pub const fn source(channel: u8) -> u32 {
        1 << (2 * channel as u32)
    }
    pub const fn destination(channel: u8) -> u32 {
        1 << (2 * channel as u32 + 1)
    }
}

/// Bit layout shared by EBCIER, EBCIDR, EBCIMR and EBCISR.
pub mod EBCI {
    pub const BTC_SHIFT: u32 = 0;
    pub const CBTC_SHIFT: u32 = 8;
    pub const ERR_SHIFT: u32 = 16;
    pub const CHANNEL_MASK: u32 = 0xF;
}

/// Bit layout shared by CHER, CHDR and CHSR.
pub mod CHSR {
    pub const fn ena(channel: u8) -> u32 {
        1 << channel
    }
    pub const fn susp(channel: u8) -> u32 {
        1 << (8 + channel)
    }
}

pub mod CTRLA {
    pub const BTSIZE_MASK: u32 = 0xFFFF;
}

pub mod CTRLB {
    /// Source address is not refreshed from a descriptor fetch.
    pub const SRC_DSCR: u32 = 1 << 16;
    /// Destination address is not refreshed from a descriptor fetch.
    pub const DST_DSCR: u32 = 1 << 20;
    /// Both fetch-disable bits; set on the final buffer of a transfer.
    pub const FETCH_DISABLE: u32 = SRC_DSCR | DST_DSCR;
}

pub mod WPMR {
    pub const WPEN: u32 = 1 << 0;
    pub const WPKEY_SHIFT: u32 = 8;
    /// "DMA" in ASCII.
    pub const KEY: u32 = 0x44_4D_41;
    pub const fn with_key(key: u32) -> u32 {
        key << WPKEY_SHIFT
    }
}

pub mod WPSR {
    pub const WPVS: u32 = 1 << 0;
    pub const WPVSRC_SHIFT: u32 = 8;
    pub const WPVSRC_MASK: u32 = 0xFFFF;
    pub const fn source(wpsr: u32) -> u16 {
        ((wpsr >> WPVSRC_SHIFT) & WPVSRC_MASK) as u16
    }
}
