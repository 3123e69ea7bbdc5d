//! Buffered output program storage
//!
//! The command buffer is a flat sequence of 32-bit words, two per
//! program step: the output word driven onto the pins, then the hold
//! value that tells the output pipeline how long to keep it there.
//!
//! Hold values are stored pre-encoded for the pipeline's timing base:
//! a requested rep count `r >= 1` is stored as `r - 4` to absorb the
//! fixed per-step pulse overhead, and `0` is stored unchanged as the
//! wait/stop sentinel. Storing the encoded form keeps the arming path
//! a straight memory stream with no per-word conversion.

use heapless::Vec;

/// Pipeline overhead compensation, in timing-base ticks.
///
/// The output pipeline spends this many ticks per step before the
/// programmable hold begins, so requested rep counts are offset by it.
pub const HOLD_OFFSET: u32 = 4;

/// Words per program step (output word + hold value).
pub const PAIR_WORDS: usize = 2;

/// Words kept free at the top of the buffer.
///
/// Appends refuse before the buffer is completely full so the arming
/// path never streams a truncated final pair.
pub const MARGIN_WORDS: usize = 2;

/// Result of validating an output word against the pin mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordCheck {
    /// All set bits fall inside the output pin mask
    InMask,
    /// Bits set outside the mask; the word is stored anyway so the
    /// pair stays positionally aligned, but the caller should report it
    OutOfMask,
}

/// Errors from appending a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppendError {
    /// Appending would cross the capacity margin; nothing was stored
    Full,
}

/// Errors from editing the last pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EditError {
    /// Buffer holds no pairs to edit
    Empty,
}

/// An encoded hold value as stored in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hold(u32);

impl Hold {
    /// Encode a requested rep count for storage
    pub fn encode(raw_reps: u32) -> Self {
        if raw_reps == 0 {
            Hold(0)
        } else {
            // Matches the pipeline contract bit for bit: counts below
            // the overhead wrap, exactly as the original device stored
            // them. There is no minimum-reps validation.
            Hold(raw_reps.wrapping_sub(HOLD_OFFSET))
        }
    }

    /// The stored (encoded) word
    pub fn stored(self) -> u32 {
        self.0
    }

    /// True if this hold is the wait/stop sentinel
    pub fn is_wait(self) -> bool {
        self.0 == 0
    }

    /// Reconstruct the requested rep count, or `None` for a wait
    pub fn reps(self) -> Option<u32> {
        if self.is_wait() {
            None
        } else {
            Some(self.0.wrapping_add(HOLD_OFFSET))
        }
    }
}

/// One stored program step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotPair {
    /// Output word driven onto the pins
    pub output: u32,
    /// Encoded hold value
    pub hold: Hold,
}

/// Ordered storage for a buffered output program.
///
/// `WORDS` is the flat word capacity (two words per step). The
/// firmware instantiates the full device capacity; tests use small
/// buffers. Length is always even: pairs are written and overwritten
/// atomically, never a lone output or hold word.
#[derive(Debug)]
pub struct CommandBuffer<const WORDS: usize> {
    words: Vec<u32, WORDS>,
    output_mask: u32,
}

impl<const WORDS: usize> CommandBuffer<WORDS> {
    /// Create an empty buffer validating against `output_mask`.
    ///
    /// Const so the firmware can place its full-capacity instance in a
    /// static.
    pub const fn new(output_mask: u32) -> Self {
        Self {
            words: Vec::new(),
            output_mask,
        }
    }

    /// The pin mask output words are validated against
    pub fn output_mask(&self) -> u32 {
        self.output_mask
    }

    /// Remove all stored pairs
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Number of stored words (always even)
    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    /// Number of stored pairs
    pub fn pair_count(&self) -> usize {
        self.words.len() / PAIR_WORDS
    }

    /// True if no pairs are stored
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// True if another append would be refused
    pub fn is_full(&self) -> bool {
        self.words.len() + PAIR_WORDS > WORDS - MARGIN_WORDS
    }

    /// The raw word stream, as consumed by the output pipeline
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    fn check(&self, output: u32) -> WordCheck {
        if output & !self.output_mask != 0 {
            WordCheck::OutOfMask
        } else {
            WordCheck::InMask
        }
    }

    /// Append one step.
    ///
    /// The capacity margin is checked first; a full buffer stores
    /// nothing. An out-of-mask output word is stored regardless and
    /// reported through the returned [`WordCheck`] - rejecting it
    /// would silently shift every later hold value onto the wrong
    /// output word.
    pub fn append(&mut self, output: u32, raw_reps: u32) -> Result<WordCheck, AppendError> {
        if self.is_full() {
            return Err(AppendError::Full);
        }
        let check = self.check(output);
        // Both pushes are infallible after the margin check
        let _ = self.words.push(output);
        let _ = self.words.push(Hold::encode(raw_reps).stored());
        Ok(check)
    }

    /// Overwrite the most recently appended pair in place
    pub fn edit_last(&mut self, output: u32, raw_reps: u32) -> Result<WordCheck, EditError> {
        let len = self.words.len();
        if len < PAIR_WORDS {
            return Err(EditError::Empty);
        }
        let check = self.check(output);
        self.words[len - 2] = output;
        self.words[len - 1] = Hold::encode(raw_reps).stored();
        Ok(check)
    }

    /// The most recently appended pair, if any
    pub fn current(&self) -> Option<SlotPair> {
        let len = self.words.len();
        if len < PAIR_WORDS {
            return None;
        }
        Some(SlotPair {
            output: self.words[len - 2],
            hold: Hold(self.words[len - 1]),
        })
    }

    /// Iterate over stored pairs in program order.
    ///
    /// Lazy and restartable; used by the dump command.
    pub fn pairs(&self) -> impl Iterator<Item = SlotPair> + '_ {
        self.words.chunks_exact(PAIR_WORDS).map(|pair| SlotPair {
            output: pair[0],
            hold: Hold(pair[1]),
        })
    }
}
