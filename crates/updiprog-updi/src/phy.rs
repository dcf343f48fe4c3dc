//! Echo-verified byte layer
//!
//! The single-wire link loops every transmitted byte back to the receiver.
//! [`Phy`] sends one byte at a time and checks its echo before moving on,
//! and collects responses with a bounded number of read slices.

use std::thread;
use std::time::Duration;

use updiprog_core::error::{Result, TransportError};
use updiprog_core::retry::Retry;
use updiprog_core::transport::{LineSettings, Transport};

use crate::protocol::BREAK;

/// Physical layer on top of a raw transport
pub struct Phy<T: Transport> {
    transport: T,
    settings: LineSettings,
    recv: Retry,
    byte_delay: Duration,
}

impl<T: Transport> Phy<T> {
    /// Wrap a transport
    ///
    /// `recv` bounds how many read slices a response may take, `byte_delay`
    /// is slept after every echoed byte.
    pub fn new(transport: T, settings: LineSettings, recv: Retry, byte_delay: Duration) -> Self {
        Self {
            transport,
            settings,
            recv,
            byte_delay,
        }
    }

    /// Current line settings
    pub fn settings(&self) -> LineSettings {
        self.settings
    }

    /// Reconfigure the line to the normal UPDI framing and drop stale bytes
    pub fn open_line(&mut self) -> Result<()> {
        self.transport.configure(&self.settings)?;
        self.transport.clear()
    }

    /// Send bytes, checking the echo of each one
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        log::trace!("updi send {:02X?}", data);
        for &byte in data {
            let written = self.transport.write(&[byte])?;
            if written != 1 {
                return Err(TransportError::ShortWrite {
                    expected: 1,
                    written,
                }
                .into());
            }

            let mut echo = [0u8; 1];
            self.recv(&mut echo)?;
            if echo[0] != byte {
                return Err(TransportError::EchoMismatch {
                    sent: byte,
                    echoed: echo[0],
                }
                .into());
            }

            if !self.byte_delay.is_zero() {
                thread::sleep(self.byte_delay);
            }
        }
        Ok(())
    }

    /// Fill `buf` from the link
    ///
    /// Reading goes on while bytes keep arriving. Once the first slice comes
    /// back empty, or the attempt budget is spent, a partial buffer is a
    /// [`TransportError::ShortRead`].
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
        let received = self.recv_some(buf)?;
        if received != buf.len() {
            return Err(TransportError::ShortRead {
                expected: buf.len(),
                received,
            }
            .into());
        }
        log::trace!("updi recv {:02X?}", buf);
        Ok(())
    }

    fn recv_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut received = 0;
        let transport = &mut self.transport;
        self.recv.poll(|attempt| {
            received += transport.read(&mut buf[received..])?;
            let done = received == buf.len();
            let stalled = attempt == 0 && received == 0;
            Ok((done || stalled).then_some(()))
        })?;
        Ok(received)
    }

    /// Send a BREAK character at the current framing
    pub fn send_break(&mut self) -> Result<()> {
        self.send(&[BREAK])
    }

    /// Reset the target's UPDI block with two long zero characters
    ///
    /// The characters go out at 300 baud, one stop bit. Their echoes are
    /// read and discarded, then the normal framing is restored.
    pub fn double_break(&mut self) -> Result<()> {
        log::debug!("updi: sending double break");
        self.transport.configure(&LineSettings::double_break())?;
        let written = self.transport.write(&[BREAK, BREAK])?;
        if written != 2 {
            return Err(TransportError::ShortWrite {
                expected: 2,
                written,
            }
            .into());
        }
        // The slow echo is drained but not compared
        let mut echo = [0u8; 2];
        let n = self.transport.read(&mut echo)?;
        log::trace!("double break echo {:02X?}", &echo[..n]);
        self.open_line()
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Access the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the underlying transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use updiprog_core::error::Error;

    /// Loopback that can corrupt or drop bytes
    struct Loopback {
        rx: VecDeque<u8>,
        flip: bool,
        mute: bool,
        chunk: usize,
        reads: usize,
    }

    impl Loopback {
        fn new() -> Self {
            Self {
                rx: VecDeque::new(),
                flip: false,
                mute: false,
                chunk: usize::MAX,
                reads: 0,
            }
        }
    }

    impl Transport for Loopback {
        fn write(&mut self, data: &[u8]) -> Result<usize> {
            if !self.mute {
                for &b in data {
                    self.rx.push_back(if self.flip { !b } else { b });
                }
            }
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reads += 1;
            let n = buf.len().min(self.rx.len()).min(self.chunk);
            for (slot, b) in buf.iter_mut().zip(self.rx.drain(..n)) {
                *slot = b;
            }
            Ok(n)
        }

        fn configure(&mut self, _settings: &LineSettings) -> Result<()> {
            Ok(())
        }

        fn clear(&mut self) -> Result<()> {
            self.rx.clear();
            Ok(())
        }
    }

    fn phy(lb: Loopback) -> Phy<Loopback> {
        Phy::new(
            lb,
            LineSettings::updi(115200),
            Retry::new(30, Duration::ZERO),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_send_checks_echo() {
        let mut p = phy(Loopback::new());
        p.send(&[0x55, 0x80]).unwrap();
        assert!(p.transport_mut().rx.is_empty());
    }

    #[test]
    fn test_echo_mismatch() {
        let mut lb = Loopback::new();
        lb.flip = true;
        let err = phy(lb).send(&[0x55]).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::EchoMismatch {
                sent: 0x55,
                echoed: 0xAA
            })
        ));
    }

    #[test]
    fn test_missing_echo_is_short_read() {
        let mut lb = Loopback::new();
        lb.mute = true;
        let mut p = phy(lb);
        let err = p.send(&[0x55]).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::ShortRead {
                expected: 1,
                received: 0
            })
        ));
        // no progress on the first slice ends the read right away
        assert_eq!(p.transport_mut().reads, 1);
    }

    #[test]
    fn test_recv_tolerates_partial_reads() {
        let mut lb = Loopback::new();
        lb.rx.extend([1, 2, 3, 4, 5]);
        lb.chunk = 2;
        let mut p = phy(lb);
        let mut buf = [0u8; 5];
        p.recv(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5]);
        assert_eq!(p.transport_mut().reads, 3);
    }

    #[test]
    fn test_recv_gives_up_after_budget() {
        let mut lb = Loopback::new();
        lb.rx.extend([1, 2]);
        let mut p = Phy::new(
            lb,
            LineSettings::updi(115200),
            Retry::new(4, Duration::ZERO),
            Duration::ZERO,
        );
        let mut buf = [0u8; 3];
        let err = p.recv(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::ShortRead {
                expected: 3,
                received: 2
            })
        ));
        assert_eq!(p.transport_mut().reads, 4);
    }
}
