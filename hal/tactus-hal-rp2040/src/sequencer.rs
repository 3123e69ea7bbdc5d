//! PIO/DMA output pipeline
//!
//! The buffered program executes on PIO0 state machine 0, fed by a
//! DMA channel streaming the command buffer into its TX FIFO. Once
//! armed, the pipeline runs with hardware timing, fully independent
//! of both CPU cores.
//!
//! Pipeline microprogram contract:
//! - first FIFO word: 0 = start immediately, nonzero = hold until the
//!   trigger input goes high
//! - then per step: an output word driven onto the 16 output pins,
//!   followed by an encoded hold value counted down at the timing
//!   base; a zero hold raises the end-of-program IRQ flag and parks
//!
//! The hold countdown plus the fixed per-step instructions give the
//! minimum pulse width the core's `HOLD_OFFSET` compensates for.

use embassy_rp::pac;
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::{
    Common, Config, Direction as PioDirection, Pin as OutPin, ShiftConfig, ShiftDirection,
    StateMachine,
};
use embassy_rp::Peri;
use fixed::types::U24F8;

use tactus_core::engine::{Pipeline, StartMode};

use crate::outputs;

/// PIO state machine index used by the pipeline
pub const SM: usize = 0;

/// DMA channel streaming the command buffer
pub const DMA_CH: usize = 0;

/// GPIO sampled by the hardware-trigger wait (must match the asm below)
pub const TRIGGER_GPIO: u8 = 16;

/// The output pipeline driver.
///
/// Owns the state machine and DMA channel for the lifetime of the
/// firmware; each run goes through `arm`/`teardown` via the
/// [`Pipeline`] trait.
pub struct PioSequencer<'d> {
    sm: StateMachine<'d, PIO0, SM>,
    /// Instruction memory offset of the program entry point
    origin: u8,
    _out_pins: [OutPin<'d, PIO0>; outputs::OUTPUT_WIDTH as usize],
    _trigger_pin: OutPin<'d, PIO0>,
    _dma: Peri<'d, DMA_CH0>,
}

impl<'d> PioSequencer<'d> {
    /// Load the pipeline microprogram and configure the state machine.
    ///
    /// `out_pins` are the 16 sequenced outputs in pin order;
    /// `trigger_pin` is the hardware-trigger input (GPIO 16). All
    /// must come from `common.make_pio_pin`.
    pub fn new(
        common: &mut Common<'d, PIO0>,
        mut sm: StateMachine<'d, PIO0, SM>,
        out_pins: [OutPin<'d, PIO0>; outputs::OUTPUT_WIDTH as usize],
        trigger_pin: OutPin<'d, PIO0>,
        dma: Peri<'d, DMA_CH0>,
    ) -> Self {
        let prg = pio::pio_asm!(
            ".wrap_target",
            "entry:",
            "    pull block          ; start mode word, pushed by the CPU",
            "    mov x, osr",
            "    jmp !x step         ; zero = software start",
            "    wait 1 gpio 16      ; hardware trigger",
            "step:",
            "    pull block          ; output word (DMA stream)",
            "    out pins, 16",
            "    pull block          ; encoded hold value",
            "    mov x, osr",
            "    jmp !x finish       ; zero = wait/stop sentinel",
            "hold:",
            "    jmp x-- hold        ; one timing-base tick per count",
            "    jmp step",
            "finish:",
            "    irq wait 0 rel      ; end-of-program signal, then park",
            ".wrap",
        );

        let installed = common.load_program(&prg.program);
        let origin = installed.origin;

        let pin_refs: [&OutPin<'d, PIO0>; outputs::OUTPUT_WIDTH as usize] =
            core::array::from_fn(|i| &out_pins[i]);

        let mut cfg = Config::default();
        cfg.use_program(&installed, &[]);
        cfg.set_out_pins(&pin_refs);
        cfg.shift_out = ShiftConfig {
            threshold: 32,
            direction: ShiftDirection::Right,
            auto_fill: false,
        };
        // Timing base = one system clock per instruction
        cfg.clock_divider = U24F8::from_num(1);

        sm.set_config(&cfg);
        sm.set_pin_dirs(PioDirection::Out, &pin_refs);
        sm.set_pin_dirs(PioDirection::In, &[&trigger_pin]);

        Self {
            sm,
            origin,
            _out_pins: out_pins,
            _trigger_pin: trigger_pin,
            _dma: dma,
        }
    }

    /// Program the DMA channel to stream `words` into the TX FIFO and
    /// start it
    fn start_stream(&mut self, words: &[u32]) {
        let ch = pac::DMA.ch(DMA_CH);
        ch.read_addr().write_value(words.as_ptr() as u32);
        ch.write_addr()
            .write_value(pac::PIO0.txf(SM).as_ptr() as u32);
        ch.trans_count().write_value(words.len() as u32);
        ch.ctrl_trig().write(|w| {
            w.set_incr_read(true);
            w.set_incr_write(false);
            w.set_data_size(pac::dma::vals::DataSize::SIZE_WORD);
            // Pace the stream on the TX FIFO of our state machine
            w.set_treq_sel(pac::dma::vals::TreqSel::PIO0_TX0);
            // Chain to self = chaining disabled
            w.set_chain_to(DMA_CH as u8);
            w.set_en(true);
        });
    }

    /// Abort any in-flight stream
    fn abort_stream(&mut self) {
        pac::DMA
            .chan_abort()
            .write(|w| w.set_chan_abort(1 << DMA_CH));
        while pac::DMA.chan_abort().read().chan_abort() != 0 {}
    }
}

impl Pipeline for PioSequencer<'_> {
    /// Reset the state machine and start it on `words`.
    ///
    /// The sequence is order-sensitive: the SM must be stopped and
    /// its FIFOs cleared before anything is pushed, or words from a
    /// previous run leak into this one. The DMA keeps reading `words`
    /// until completion or teardown; the caller keeps the buffer
    /// untouched for that whole window (state-gating protocol).
    fn arm(&mut self, start: StartMode, words: &[u32]) {
        self.sm.set_enable(false);
        self.sm.clear_fifos();
        self.sm.restart();

        // Reclaim the output pins in case a manual write moved them
        // to SIO since the last run
        outputs::claim_for_pio();

        // Start-mode word goes ahead of the DMA stream
        let accepted = self.sm.tx().try_push(start.first_word());
        debug_assert!(accepted, "tx fifo was just cleared");

        // Rewind to the program entry point
        let jmp = pio::InstructionOperands::JMP {
            condition: pio::JmpCondition::Always,
            address: self.origin,
        }
        .encode();
        unsafe {
            self.sm.exec_instr(jmp);
        }

        self.start_stream(words);
        self.sm.set_enable(true);
    }

    fn done(&self) -> bool {
        pac::PIO0.irq().read().irq() & (1 << SM) != 0
    }

    fn clear_done(&mut self) {
        // Write-one-to-clear; harmless if the flag never rose
        pac::PIO0.irq().write(|w| w.set_irq(1 << SM));
    }

    fn teardown(&mut self) {
        self.abort_stream();
        self.sm.set_enable(false);
        self.sm.clear_fifos();
    }
}
