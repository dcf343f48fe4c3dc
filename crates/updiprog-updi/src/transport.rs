//! Serial port transport for the UPDI link
//!
//! A USB-UART with TX and RX tied together through a resistor gives the
//! half-duplex single-wire link UPDI needs. Every transmitted byte comes back
//! as an echo, which the PHY layer checks.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort};
use updiprog_core::error::{Result, TransportError};
use updiprog_core::transport::{LineSettings, Parity, StopBits, Transport};

/// Read timeout slice; the PHY retries on top of this
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open a serial port with the given line settings
    pub fn open(device: &str, settings: &LineSettings) -> Result<Self> {
        let port = serialport::new(device, settings.baud)
            .data_bits(DataBits::Eight)
            .parity(parity(settings.parity))
            .stop_bits(stop_bits(settings.stop_bits))
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Open {
                port: device.to_string(),
                message: e.to_string(),
            })?;

        log::info!("Opened serial port {} at {} baud", device, settings.baud);

        Ok(Self {
            port,
            name: device.to_string(),
        })
    }

    /// Port name this transport was opened with
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn parity(p: Parity) -> serialport::Parity {
    match p {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
    }
}

fn stop_bits(s: StopBits) -> serialport::StopBits {
    match s {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn serial_err(e: impl ToString) -> TransportError {
    TransportError::Serial(e.to_string())
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = self.port.write(data).map_err(serial_err)?;
        self.port.flush().map_err(serial_err)?;
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(serial_err(e).into()),
        }
    }

    fn configure(&mut self, settings: &LineSettings) -> Result<()> {
        self.port.set_baud_rate(settings.baud).map_err(serial_err)?;
        self.port
            .set_parity(parity(settings.parity))
            .map_err(serial_err)?;
        self.port
            .set_stop_bits(stop_bits(settings.stop_bits))
            .map_err(serial_err)?;
        log::debug!(
            "{}: {} baud, {:?} parity, {:?} stop bits",
            self.name,
            settings.baud,
            settings.parity,
            settings.stop_bits
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::All).map_err(serial_err)?;
        Ok(())
    }
}
