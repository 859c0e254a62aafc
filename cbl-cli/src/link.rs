//! Serial exchange layer.
//!
//! One [`Link::exchange`] call is one protocol exchange: write the
//! request frame, then read the single reply. The bootloader answers a
//! failed CRC with one NACK byte and drops unrecognized commands without
//! any reply at all, so the read timeout is the only way to notice the
//! latter.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cbl::protocol::{ACK, NACK};
use log::{debug, trace};

/// A request/reply link to the bootloader over any byte stream.
pub struct Link<P> {
    port: P,
}

impl Link<Box<dyn serialport::SerialPort>> {
    /// Open a serial port at `baud` with the given read timeout.
    pub fn open(port_name: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud)
            .timeout(timeout)
            .open()
            .with_context(|| format!("failed to open serial port {port_name}"))?;
        debug!("opened {port_name} at {baud} baud");
        Ok(Self { port })
    }
}

impl<P: Read + Write> Link<P> {
    /// Wrap an already-open byte stream.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Send one request frame and read the reply payload.
    ///
    /// Returns the result bytes following `[ACK, reply_len]`. A NACK
    /// reply (the device's CRC verdict) and an unrecognizable first byte
    /// both fail the exchange.
    pub fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        trace!("sending {} byte(s)", request.len());
        self.port
            .write_all(request)
            .context("failed to send request frame")?;
        self.port.flush().context("failed to flush request frame")?;

        let mut marker = [0u8; 1];
        self.port
            .read_exact(&mut marker)
            .context("no reply from the bootloader (dropped frame or wrong port?)")?;

        match marker[0] {
            NACK => bail!("bootloader rejected the frame (CRC mismatch)"),
            ACK => {},
            other => bail!("unexpected reply marker 0x{other:02X}"),
        }

        let mut reply_len = [0u8; 1];
        self.port
            .read_exact(&mut reply_len)
            .context("reply truncated after ACK")?;

        let mut payload = vec![0u8; usize::from(reply_len[0])];
        self.port
            .read_exact(&mut payload)
            .context("reply payload truncated")?;
        trace!("received {} result byte(s)", payload.len());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// In-memory port: scripted reply in, recorded request out.
    struct FakePort {
        reply: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn link_with_reply(reply: Vec<u8>) -> Link<FakePort> {
        Link::new(FakePort {
            reply: Cursor::new(reply),
            sent: Vec::new(),
        })
    }

    #[test]
    fn ack_reply_returns_the_payload() {
        let mut link = link_with_reply(vec![ACK, 2, 0x13, 0x04]);
        let payload = link.exchange(&[0x05, 0x12]).unwrap();
        assert_eq!(payload, vec![0x13, 0x04]);
    }

    #[test]
    fn nack_reply_is_an_error() {
        let mut link = link_with_reply(vec![NACK]);
        let err = link.exchange(&[0x05, 0x12]).unwrap_err();
        assert!(err.to_string().contains("CRC"));
    }

    #[test]
    fn silence_is_an_error() {
        let mut link = link_with_reply(Vec::new());
        assert!(link.exchange(&[0x05, 0x12]).is_err());
    }

    #[test]
    fn unexpected_marker_is_an_error() {
        let mut link = link_with_reply(vec![0x55]);
        assert!(link.exchange(&[0x05, 0x12]).is_err());
    }
}
