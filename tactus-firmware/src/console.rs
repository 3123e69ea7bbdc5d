//! Serial console line I/O
//!
//! Interactive line editing over the buffered console UART: echo,
//! backspace, CR/LF termination. Outbound text uses `\n` internally
//! and is expanded to `\r\n` on the wire, so response formats stay
//! identical between firmware and host tests.

use core::fmt::{self, Write as FmtWrite};

use defmt::warn;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};
use heapless::String;

/// Scratch capacity for one formatted response chunk
const FMT_CHUNK: usize = 256;

pub struct Console {
    tx: BufferedUartTx,
    rx: BufferedUartRx,
}

impl Console {
    pub fn new(tx: BufferedUartTx, rx: BufferedUartRx) -> Self {
        Self { tx, rx }
    }

    async fn send(&mut self, bytes: &[u8]) {
        if self.tx.write_all(bytes).await.is_err() {
            warn!("console write failed");
        }
    }

    /// Write a string, expanding `\n` to `\r\n`
    pub async fn write_str(&mut self, s: &str) {
        let mut rest = s;
        while let Some(nl) = rest.find('\n') {
            self.send(rest[..nl].as_bytes()).await;
            self.send(b"\r\n").await;
            rest = &rest[nl + 1..];
        }
        self.send(rest.as_bytes()).await;
    }

    /// Format into a bounded scratch buffer and write it out.
    ///
    /// Responses longer than the scratch buffer are dropped with a
    /// warning; every fixed response format fits well within it.
    pub async fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        let mut chunk: String<FMT_CHUNK> = String::new();
        if chunk.write_fmt(args).is_ok() {
            self.write_str(&chunk).await;
        } else {
            warn!("console response truncated, dropped");
        }
    }

    /// Read one line with echo, returning it without the terminator.
    ///
    /// Input beyond `buf` is discarded. Non-printing bytes other than
    /// backspace and the terminators are ignored.
    pub async fn read_line<'b>(&mut self, buf: &'b mut [u8]) -> &'b str {
        let mut len = 0;
        loop {
            let mut byte = [0u8; 1];
            match self.rx.read(&mut byte).await {
                Ok(n) if n > 0 => {}
                Ok(_) => continue,
                Err(_) => {
                    warn!("console read failed");
                    continue;
                }
            }

            match byte[0] {
                b'\r' | b'\n' => {
                    self.send(b"\r\n").await;
                    break;
                }
                0x08 | 0x7F => {
                    if len > 0 {
                        len -= 1;
                        // Rub out the echoed character
                        self.send(b"\x08 \x08").await;
                    }
                }
                b @ 0x20..=0x7E => {
                    if len < buf.len() {
                        buf[len] = b;
                        len += 1;
                        self.send(&byte).await;
                    }
                }
                _ => {}
            }
        }

        // Only printable ASCII was stored
        core::str::from_utf8(&buf[..len]).unwrap_or("")
    }
}
