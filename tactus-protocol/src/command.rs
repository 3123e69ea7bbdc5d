//! Command line parsing
//!
//! Commands are identified by their first three bytes; anything after
//! the prefix is ignored unless the command takes arguments. Numeric
//! arguments are hexadecimal except for `clk set`, which takes a
//! decimal frequency - a quirk of the wire protocol that existing
//! host software depends on.

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// `ver` - report the firmware version
    Version,
    /// `sts` - report run and clock status codes
    Status,
    /// `deb` - enable verbose diagnostics
    DebugOn,
    /// `ndb` - disable verbose diagnostics
    DebugOff,
    /// `abt` - request an abort of the current run
    Abort,
    /// `cls` - clear the command buffer
    Clear,
    /// `run` - start execution, waiting for the hardware trigger
    Run,
    /// `swr` - start execution immediately (software start)
    SoftwareRun,
    /// `man <hex>` - drive the output pins directly
    ManualWrite(u32),
    /// `gto` - read back the current output pin state
    ReadOutputs,
    /// `add` - enter line-batch append mode
    AddMode,
    /// `dmp` - print every stored pair
    Dump,
    /// `edt` - overwrite the last stored pair
    Edit,
    /// `cur` - print the last stored pair
    Current,
    /// `clk int` / `clk ext` / `clk set <hz>`
    Clock(ClockCommand),
    /// `frq` - print measured clock frequencies
    MeasureFreqs,
}

/// Clock subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockCommand {
    /// Revert to the internal calibrated default
    Internal,
    /// Lock to the external sync pin
    External,
    /// Reprogram the frequency of whichever source is active
    Set(u32),
}

/// Why a line failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Shorter than the 3-byte command prefix
    TooShort,
    /// Prefix (or subcommand) not recognized
    Unknown,
    /// Command recognized but its argument was missing or malformed
    BadArgument,
}

/// One line read inside append or edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairLine {
    /// Line beginning with `end` - leave append mode
    End,
    /// Two hex fields parsed successfully
    Pair { output: u32, reps: u32 },
    /// Fewer than two hex fields - re-prompt on the same slot
    Incomplete,
}

/// Parse a hex token, accepting an optional `0x`/`0X` prefix
fn parse_hex(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

fn parse_dec(token: &str) -> Option<u32> {
    if token.is_empty() {
        return None;
    }
    token.parse::<u32>().ok()
}

impl Command {
    /// Parse one console line.
    ///
    /// Lines shorter than three bytes are invalid outright; otherwise
    /// the first three bytes select the command.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        if line.len() < 3 {
            return Err(ParseError::TooShort);
        }

        // Byte-boundary-safe slicing: a multi-byte character spanning
        // the prefix cannot be a valid command anyway
        let prefix = line.get(..3).ok_or(ParseError::Unknown)?;
        let mut args = line.get(3..).unwrap_or("").split_ascii_whitespace();

        match prefix {
            "ver" => Ok(Command::Version),
            "sts" => Ok(Command::Status),
            "deb" => Ok(Command::DebugOn),
            "ndb" => Ok(Command::DebugOff),
            "abt" => Ok(Command::Abort),
            "cls" => Ok(Command::Clear),
            "run" => Ok(Command::Run),
            "swr" => Ok(Command::SoftwareRun),
            "man" => {
                let value = args
                    .next()
                    .and_then(parse_hex)
                    .ok_or(ParseError::BadArgument)?;
                Ok(Command::ManualWrite(value))
            }
            "gto" => Ok(Command::ReadOutputs),
            "add" => Ok(Command::AddMode),
            "dmp" => Ok(Command::Dump),
            "edt" => Ok(Command::Edit),
            "cur" => Ok(Command::Current),
            "frq" => Ok(Command::MeasureFreqs),
            "clk" => match args.next() {
                Some("int") => Ok(Command::Clock(ClockCommand::Internal)),
                Some("ext") => Ok(Command::Clock(ClockCommand::External)),
                Some("set") => {
                    let hz = args
                        .next()
                        .and_then(parse_dec)
                        .ok_or(ParseError::BadArgument)?;
                    Ok(Command::Clock(ClockCommand::Set(hz)))
                }
                _ => Err(ParseError::Unknown),
            },
            _ => Err(ParseError::Unknown),
        }
    }

    /// True for commands legal only in the idle window (anything that
    /// mutates the buffer, the pins, or the clock, plus their
    /// queries). The always-allowed tier is version, status, the
    /// debug toggles, and abort.
    pub fn requires_idle(self) -> bool {
        !matches!(
            self,
            Command::Version
                | Command::Status
                | Command::DebugOn
                | Command::DebugOff
                | Command::Abort
        )
    }
}

impl PairLine {
    /// Parse one line inside append/edit mode.
    ///
    /// Exactly two hex fields are read; a third field, if present, is
    /// ignored. Anything short of two parsable fields is
    /// [`PairLine::Incomplete`], which the caller silently re-prompts
    /// rather than rejecting.
    pub fn parse(line: &str) -> Self {
        if line.get(..3) == Some("end") {
            return PairLine::End;
        }

        let mut fields = line.split_ascii_whitespace();
        let output = fields.next().and_then(parse_hex);
        let reps = fields.next().and_then(parse_hex);

        match (output, reps) {
            (Some(output), Some(reps)) => PairLine::Pair { output, reps },
            _ => PairLine::Incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("ver"), Ok(Command::Version));
        assert_eq!(Command::parse("sts"), Ok(Command::Status));
        assert_eq!(Command::parse("deb"), Ok(Command::DebugOn));
        assert_eq!(Command::parse("ndb"), Ok(Command::DebugOff));
        assert_eq!(Command::parse("abt"), Ok(Command::Abort));
        assert_eq!(Command::parse("cls"), Ok(Command::Clear));
        assert_eq!(Command::parse("run"), Ok(Command::Run));
        assert_eq!(Command::parse("swr"), Ok(Command::SoftwareRun));
        assert_eq!(Command::parse("gto"), Ok(Command::ReadOutputs));
        assert_eq!(Command::parse("add"), Ok(Command::AddMode));
        assert_eq!(Command::parse("dmp"), Ok(Command::Dump));
        assert_eq!(Command::parse("edt"), Ok(Command::Edit));
        assert_eq!(Command::parse("cur"), Ok(Command::Current));
        assert_eq!(Command::parse("frq"), Ok(Command::MeasureFreqs));
    }

    #[test]
    fn test_prefix_matching_ignores_trailing_bytes() {
        // Only the first three bytes identify the command
        assert_eq!(Command::parse("version"), Ok(Command::Version));
        assert_eq!(Command::parse("running"), Ok(Command::Run));
    }

    #[test]
    fn test_short_and_unknown_lines() {
        assert_eq!(Command::parse(""), Err(ParseError::TooShort));
        assert_eq!(Command::parse("ab"), Err(ParseError::TooShort));
        assert_eq!(Command::parse("xyz"), Err(ParseError::Unknown));
        // Case sensitive
        assert_eq!(Command::parse("VER"), Err(ParseError::Unknown));
    }

    #[test]
    fn test_manual_write_argument() {
        assert_eq!(Command::parse("man ff"), Ok(Command::ManualWrite(0xFF)));
        assert_eq!(Command::parse("man 0xBEEF"), Ok(Command::ManualWrite(0xBEEF)));
        assert_eq!(Command::parse("man"), Err(ParseError::BadArgument));
        assert_eq!(Command::parse("man zz"), Err(ParseError::BadArgument));
    }

    #[test]
    fn test_clock_subcommands() {
        assert_eq!(
            Command::parse("clk int"),
            Ok(Command::Clock(ClockCommand::Internal))
        );
        assert_eq!(
            Command::parse("clk ext"),
            Ok(Command::Clock(ClockCommand::External))
        );
        // Frequency is decimal, not hex
        assert_eq!(
            Command::parse("clk set 100000000"),
            Ok(Command::Clock(ClockCommand::Set(100_000_000)))
        );
        assert_eq!(Command::parse("clk set ff"), Err(ParseError::BadArgument));
        assert_eq!(Command::parse("clk set"), Err(ParseError::BadArgument));
        assert_eq!(Command::parse("clk"), Err(ParseError::Unknown));
        assert_eq!(Command::parse("clk foo"), Err(ParseError::Unknown));
    }

    #[test]
    fn test_idle_window_classification() {
        let always_allowed = [
            Command::Version,
            Command::Status,
            Command::DebugOn,
            Command::DebugOff,
            Command::Abort,
        ];
        for cmd in always_allowed {
            assert!(!cmd.requires_idle(), "{:?} must pass the gate", cmd);
        }

        let idle_only = [
            Command::Clear,
            Command::Run,
            Command::SoftwareRun,
            Command::ManualWrite(0xFF),
            Command::ReadOutputs,
            Command::AddMode,
            Command::Dump,
            Command::Edit,
            Command::Current,
            Command::Clock(ClockCommand::Internal),
            Command::Clock(ClockCommand::External),
            Command::Clock(ClockCommand::Set(100_000_000)),
            Command::MeasureFreqs,
        ];
        for cmd in idle_only {
            assert!(cmd.requires_idle(), "{:?} must be gated on idle", cmd);
        }
    }

    #[test]
    fn test_pair_line_two_fields() {
        assert_eq!(
            PairLine::parse("1 a"),
            PairLine::Pair {
                output: 0x1,
                reps: 0xA
            }
        );
        // Third field is read but ignored - two-field wire behavior
        assert_eq!(
            PairLine::parse("ffff 0 1"),
            PairLine::Pair {
                output: 0xFFFF,
                reps: 0
            }
        );
    }

    #[test]
    fn test_pair_line_end_and_incomplete() {
        assert_eq!(PairLine::parse("end"), PairLine::End);
        assert_eq!(PairLine::parse("end of input"), PairLine::End);
        assert_eq!(PairLine::parse(""), PairLine::Incomplete);
        assert_eq!(PairLine::parse("12"), PairLine::Incomplete);
        assert_eq!(PairLine::parse("12 zz"), PairLine::Incomplete);
        assert_eq!(PairLine::parse("nonsense"), PairLine::Incomplete);
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(parse_hex("ff"), Some(0xFF));
        assert_eq!(parse_hex("0xff"), Some(0xFF));
        assert_eq!(parse_hex("0Xff"), Some(0xFF));
        assert_eq!(parse_hex("0x"), None);
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("10g"), None);
        // 32-bit overflow is a parse failure, not a wrap
        assert_eq!(parse_hex("1ffffffff"), None);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(line in "\\PC*") {
            let _ = Command::parse(&line);
            let _ = PairLine::parse(&line);
        }

        #[test]
        fn prop_pair_roundtrip(output in 0u32..=0xFFFF_FFFF, reps in 0u32..=0xFFFF_FFFF) {
            let mut line = heapless::String::<32>::new();
            core::fmt::write(&mut line, format_args!("{:x} {:x}", output, reps)).unwrap();
            prop_assert_eq!(PairLine::parse(&line), PairLine::Pair { output, reps });
        }
    }
}
