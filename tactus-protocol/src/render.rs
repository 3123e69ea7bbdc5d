//! Response rendering
//!
//! The fixed response line formats, written into any
//! [`core::fmt::Write`] sink so they render identically into the
//! console UART and into host-test strings. Formats are part of the
//! wire protocol: existing host software parses them.

use core::fmt::{self, Write};

use tactus_core::buffer::{SlotPair, HOLD_OFFSET};

/// Render one dump line pair for the `dmp` command.
///
/// The hold transform is inverted here: encoded holds print as the
/// originally requested rep count, the zero sentinel prints as `Wait`.
pub fn write_pair<W: Write>(w: &mut W, pair: SlotPair) -> fmt::Result {
    writeln!(w, "do_cmd: {:04x}", pair.output)?;
    match pair.hold.reps() {
        None => writeln!(w, "\tWait"),
        Some(reps) => writeln!(w, "\tnumber of reps: {}", reps),
    }
}

/// Render the last stored pair for the `cur` command.
///
/// The `Reps:` line is printed unconditionally from the raw stored
/// word plus the offset, so a wait pair reads `Reps: 4` followed by
/// the `Wait` marker line.
pub fn write_current<W: Write>(w: &mut W, pair: SlotPair) -> fmt::Result {
    writeln!(w, "Output: {:x}", pair.output)?;
    writeln!(w, "Reps: {}", pair.hold.stored().wrapping_add(HOLD_OFFSET))?;
    if pair.hold.is_wait() {
        writeln!(w, "Wait")?;
    }
    Ok(())
}

/// Render the `sts` response from the two status codes
pub fn write_status<W: Write>(w: &mut W, run_code: u8, clock_code: u8) -> fmt::Result {
    writeln!(w, "run-status:{} clock-status:{}", run_code, clock_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;
    use tactus_core::buffer::CommandBuffer;

    #[test]
    fn test_dump_format() {
        let mut buf: CommandBuffer<8> = CommandBuffer::new(0xFFFF);
        buf.append(0x0001, 10).unwrap();
        buf.append(0x0002, 0).unwrap();

        let mut out: String<128> = String::new();
        for pair in buf.pairs() {
            write_pair(&mut out, pair).unwrap();
        }

        assert_eq!(
            out.as_str(),
            "do_cmd: 0001\n\tnumber of reps: 10\ndo_cmd: 0002\n\tWait\n"
        );
    }

    #[test]
    fn test_current_format() {
        let mut buf: CommandBuffer<8> = CommandBuffer::new(0xFFFF);
        buf.append(0xBEEF, 0x20).unwrap();

        let mut out: String<64> = String::new();
        write_current(&mut out, buf.current().unwrap()).unwrap();
        assert_eq!(out.as_str(), "Output: beef\nReps: 32\n");

        buf.edit_last(0xBEEF, 0).unwrap();
        out.clear();
        write_current(&mut out, buf.current().unwrap()).unwrap();
        // The sentinel still gets a Reps: line (stored 0 plus the
        // offset) before the Wait marker
        assert_eq!(out.as_str(), "Output: beef\nReps: 4\nWait\n");
    }

    #[test]
    fn test_status_format() {
        let mut out: String<64> = String::new();
        write_status(&mut out, 2, 1).unwrap();
        assert_eq!(out.as_str(), "run-status:2 clock-status:1\n");
    }
}
