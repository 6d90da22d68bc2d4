//! A software DMAC for tests.
//!
//! Registers live in plain memory, but the model reproduces the hardware
//! behavior the driver depends on: clear-on-read status, write protection,
//! channel enable / disable requests, buffer countdown and descriptor
//! fetches. Time advances when a test calls [`Model::step`], which moves
//! one unit of data on every running channel. A channel that's finishing
//! its buffer after a disable request also moves one unit each time
//! software polls CHSR, so busy-waiting on a stop terminates.

use core::cell::Cell;

use crate::descriptor::Descriptor;
use crate::interrupt::Events;
use crate::ral::{
    dmac::{CHANNELS, CHSR, CTRLA, WPMR, WPSR},
    ClearOnRead, Instance, ReadOnly, ReadWrite, Register, WriteOnly,
};
use crate::ControlB;

const WORDS: usize = Register::Wpsr.offset() / 4 + 1;

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    /// Units left in the current buffer.
    remaining: u32,
    /// The current buffer came from a descriptor fetch.
    chained: bool,
    /// An error froze the channel.
    faulted: bool,
    /// Fail on the next step.
    fail: bool,
}

pub struct Model {
    words: [Cell<u32>; WORDS],
    channels: [Cell<Progress>; CHANNELS],
    /// Upper address bits of mapped descriptor storage.
    memory: Cell<usize>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            words: core::array::from_fn(|_| Cell::new(0)),
            channels: core::array::from_fn(|_| Cell::new(Progress::default())),
            memory: Cell::new(0),
        }
    }

    fn word(&self, reg: Register) -> &Cell<u32> {
        &self.words[reg.offset() / 4]
    }

    /// Peek at a register without any side effect.
    pub fn register(&self, reg: Register) -> u32 {
        self.word(reg).get()
    }

    fn set_bits(&self, reg: Register, bits: u32) {
        let word = self.word(reg);
        word.set(word.get() | bits);
    }

    fn clear_bits(&self, reg: Register, bits: u32) {
        let word = self.word(reg);
        word.set(word.get() & !bits);
    }

    fn progress(&self, n: u8, f: impl FnOnce(&mut Progress)) {
        let cell = &self.channels[n as usize];
        let mut progress = cell.get();
        f(&mut progress);
        cell.set(progress);
    }

    /// Latch interrupt events, as if the hardware raised them.
    pub fn raise(&self, events: Events) {
        self.set_bits(Register::Ebcisr, events.bits());
    }

    /// Make the next step on channel `n` fail with a bus error.
    pub fn fail(&self, n: u8) {
        self.progress(n, |p| p.fail = true);
    }

    /// Let descriptor fetches reach `storage`.
    ///
    /// The DMAC only sees 32-bit addresses, so the model borrows the upper
    /// bits of the host address from `storage`.
    pub fn map_descriptors(&self, storage: &[Descriptor]) {
        self.memory
            .set(storage.as_ptr() as usize & !(u32::MAX as usize));
    }

    fn is_enabled(&self, n: u8) -> bool {
        self.register(Register::Chsr) & CHSR::ena(n) != 0
    }

    fn start(&self, n: u8) {
        if self.is_enabled(n) {
            return;
        }
        self.set_bits(Register::Chsr, CHSR::ena(n));
        self.channels[n as usize].set(Progress::default());
        if ControlB::from_bits(self.register(Register::CtrlB(n))).is_last() {
            let remaining = self.register(Register::CtrlA(n)) & CTRLA::BTSIZE_MASK;
            self.progress(n, |p| p.remaining = remaining);
        } else {
            self.fetch(n);
        }
    }

    fn fetch(&self, n: u8) {
        let address = self.register(Register::Dscr(n));
        if address == 0 {
            // Asked to fetch past the end of a chain.
            self.error(n);
            return;
        }
        let ptr = (self.memory.get() | address as usize) as *const Descriptor;
        // Safety: tests map their descriptor storage before arming a chain,
        // and the channel owns the chain while it runs.
        let desc = unsafe { ptr.read_volatile() };
        let transfer = desc.transfer();
        self.word(Register::Saddr(n)).set(transfer.source);
        self.word(Register::Daddr(n)).set(transfer.destination);
        self.word(Register::CtrlA(n)).set(transfer.control_a.bits());
        self.word(Register::CtrlB(n)).set(transfer.control_b.bits());
        self.word(Register::Dscr(n)).set(desc.next());
        self.progress(n, |p| {
            p.remaining = transfer.control_a.buffer_size() as u32;
            p.chained = true;
        });
    }

    fn stop(&self, n: u8) {
        if !self.is_enabled(n) {
            return;
        }
        if self.channels[n as usize].get().faulted {
            self.clear_bits(Register::Chsr, CHSR::ena(n) | CHSR::susp(n));
        } else {
            self.set_bits(Register::Chsr, CHSR::susp(n));
        }
    }

    fn error(&self, n: u8) {
        self.raise(Events::error(n));
        self.progress(n, |p| p.faulted = true);
        if self.register(Register::Chsr) & CHSR::susp(n) != 0 {
            // Already asked to stop.
            self.clear_bits(Register::Chsr, CHSR::ena(n) | CHSR::susp(n));
        }
    }

    fn complete(&self, n: u8) {
        self.raise(Events::buffer_complete(n));
        let chsr = self.register(Register::Chsr);
        if chsr & CHSR::susp(n) != 0 {
            self.clear_bits(Register::Chsr, CHSR::ena(n) | CHSR::susp(n));
        } else if ControlB::from_bits(self.register(Register::CtrlB(n))).is_last() {
            if self.channels[n as usize].get().chained {
                self.raise(Events::chain_complete(n));
            }
            self.clear_bits(Register::Chsr, CHSR::ena(n));
        } else {
            self.fetch(n);
        }
    }

    /// Move one unit of data on every running channel.
    pub fn step(&self) {
        for n in 0..CHANNELS as u8 {
            self.step_channel(n);
        }
    }

    fn step_channel(&self, n: u8) {
        if !self.is_enabled(n) {
            return;
        }
        let progress = self.channels[n as usize].get();
        if progress.faulted {
            return;
        }
        if progress.fail {
            self.error(n);
            return;
        }
        let remaining = progress.remaining.saturating_sub(1);
        self.progress(n, |p| p.remaining = remaining);
        if remaining == 0 {
            self.complete(n);
        }
    }

    /// Let every channel with a pending disable request make progress.
    fn drain(&self) {
        let chsr = self.register(Register::Chsr);
        for n in 0..CHANNELS as u8 {
            if chsr & CHSR::susp(n) != 0 {
                self.step_channel(n);
            }
        }
    }
}

fn channels(bits: u32) -> impl Iterator<Item = u8> {
    (0..CHANNELS as u8).filter(move |&n| bits & (1 << n) != 0)
}

// Safety: the model is its own register file.
unsafe impl Instance for Model {
    fn read(&self, reg: ReadWrite) -> u32 {
        self.register(reg.into())
    }

    fn write(&self, reg: ReadWrite, value: u32) {
        let reg = Register::from(reg);
        if reg == Register::Wpmr {
            if value >> WPMR::WPKEY_SHIFT == WPMR::KEY {
                self.word(reg).set(value);
            }
        } else if reg.is_protected() && self.register(Register::Wpmr) & WPMR::WPEN != 0 {
            self.word(Register::Wpsr)
                .set(WPSR::WPVS | ((reg.offset() as u32) << WPSR::WPVSRC_SHIFT));
        } else {
            self.word(reg).set(value);
        }
    }

    fn write_only(&self, reg: WriteOnly, value: u32) {
        match reg {
            WriteOnly::Ebcier => self.set_bits(Register::Ebcimr, value & Events::all().bits()),
            WriteOnly::Ebcidr => self.clear_bits(Register::Ebcimr, value),
            WriteOnly::Cher => channels(value).for_each(|n| self.start(n)),
            WriteOnly::Chdr => channels(value).for_each(|n| self.stop(n)),
        }
    }

    fn read_only(&self, reg: ReadOnly) -> u32 {
        let value = self.register(reg.into());
        if reg == ReadOnly::Chsr {
            self.drain();
        }
        value
    }

    fn read_clear(&self, reg: ClearOnRead) -> u32 {
        self.word(reg.into()).replace(0)
    }
}
