// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::io::{Read, Write};
use std::time::Duration;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort as SerialPortTrait, StopBits};
use crate::error::Result;

#[cfg(target_family = "unix")]
use std::fs::{File, OpenOptions};
#[cfg(target_family = "unix")]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(target_family = "unix")]
use std::os::unix::io::AsRawFd;
#[cfg(target_family = "unix")]
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};

/// How long a read without a deadline blocks before reporting `WouldBlock`
const IDLE_POLL: Duration = Duration::from_secs(1);

// ============================================================================
// Transport Trait
// ============================================================================

/// Result of a single-byte read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Byte(u8),
    /// Nothing arrived before the timeout
    WouldBlock,
    /// The line reported no data at all
    EndOfStream,
}

/// Byte channel needed by the link establishment loops
pub trait Transport: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Reads one byte, waiting at most `timeout` (or an idle poll interval when `None`)
    fn read_byte(&mut self, timeout: Option<Duration>) -> std::io::Result<ReadOutcome>;
}

// ============================================================================
// Serial Port Implementation
// ============================================================================

/// Line settings applied when the port is opened
#[derive(Debug, Clone, Copy)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// Raw serial line backed by the serialport crate
pub struct SerialTransport {
    port: Box<dyn SerialPortTrait>,
    /// Device settings in place before the port was opened
    #[cfg(target_family = "unix")]
    saved: SavedTermios,
}

impl SerialTransport {
    pub fn open(port_name: &str, settings: LineSettings) -> Result<Self> {
        // Must run before serialport switches the line to raw mode
        #[cfg(target_family = "unix")]
        let saved = SavedTermios::capture(port_name)?;

        let port = serialport::new(port_name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .timeout(IDLE_POLL)
            .open()?;

        // Stale bytes from an earlier session must not reach the validator
        port.clear(ClearBuffer::All)?;
        log::info!(
            "Opened {}: {} baud, {:?}, {:?}, {:?}",
            port_name, settings.baud_rate, settings.data_bits, settings.parity, settings.stop_bits
        );

        Ok(SerialTransport {
            port,
            #[cfg(target_family = "unix")]
            saved,
        })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Option<Duration>) -> std::io::Result<ReadOutcome> {
        self.port.set_timeout(timeout.unwrap_or(IDLE_POLL))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(ReadOutcome::EndOfStream),
            Ok(_) => Ok(ReadOutcome::Byte(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut
                || e.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(e) = self.port.clear(ClearBuffer::All) {
            log::warn!("Failed to flush serial port on close: {}", e);
        }

        #[cfg(target_family = "unix")]
        if let Err(e) = self.saved.restore() {
            log::warn!("Failed to restore serial port settings: {}", e);
        }

        log::debug!("Serial port closed");
    }
}

// ============================================================================
// Saved Line Settings
// ============================================================================

/// Terminal attributes of a device, captured so they can be reinstated later.
///
/// Holds its own descriptor on the device: termios state belongs to the tty,
/// not to a descriptor, so restoring through it affects the port serialport opened.
#[cfg(target_family = "unix")]
struct SavedTermios {
    device: File,
    termios: Termios,
}

#[cfg(target_family = "unix")]
impl SavedTermios {
    fn capture(port_name: &str) -> std::io::Result<Self> {
        // Non-blocking so the open does not wait for carrier detect
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NOCTTY | nix::libc::O_NONBLOCK)
            .open(port_name)?;
        Self::from_device(device)
    }

    fn from_device(device: File) -> std::io::Result<Self> {
        let termios = tcgetattr(device.as_raw_fd())?;
        Ok(SavedTermios { device, termios })
    }

    fn restore(&self) -> std::io::Result<()> {
        tcsetattr(self.device.as_raw_fd(), SetArg::TCSANOW, &self.termios)?;
        Ok(())
    }
}

// ============================================================================
// Mock Transport for Testing
// ============================================================================

#[cfg(test)]
pub struct MockTransport {
    // Scripted reads (None = deadline expiry, end of script = end of stream)
    read_script: Vec<Option<u8>>,
    read_pos: usize,
    // Script positions that first report end of stream once
    end_of_stream_at: Vec<usize>,
    // Track what was written
    write_log: Vec<u8>,
    write_calls: usize,
    // Expected writes for verification
    expected_writes: Vec<u8>,
    expected_write_calls: Option<usize>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockTransport {
            read_script: responses,
            read_pos: 0,
            end_of_stream_at: Vec::new(),
            write_log: Vec::new(),
            write_calls: 0,
            expected_writes,
            expected_write_calls: None,
        }
    }

    /// Report end of stream once before the scripted read at `pos`
    pub fn end_of_stream_at(mut self, pos: usize) -> Self {
        self.end_of_stream_at.push(pos);
        self
    }

    /// Also require the writes to arrive in exactly `calls` write calls
    pub fn expect_write_calls(mut self, calls: usize) -> Self {
        self.expected_write_calls = Some(calls);
        self
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.write_log.extend_from_slice(buf);
        self.write_calls += 1;
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Option<Duration>) -> std::io::Result<ReadOutcome> {
        if let Some(i) = self.end_of_stream_at.iter().position(|&pos| pos == self.read_pos) {
            self.end_of_stream_at.remove(i);
            return Ok(ReadOutcome::EndOfStream);
        }

        match self.read_script.get(self.read_pos) {
            None => Ok(ReadOutcome::EndOfStream),
            Some(entry) => {
                self.read_pos += 1;
                Ok(entry.map_or(ReadOutcome::WouldBlock, ReadOutcome::Byte))
            }
        }
    }
}

#[cfg(test)]
impl Drop for MockTransport {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.read_pos,
            self.read_script.len(),
            "MockTransport dropped with {} unconsumed responses (read {} of {} bytes)",
            self.read_script.len() - self.read_pos,
            self.read_pos,
            self.read_script.len()
        );

        assert!(
            self.end_of_stream_at.is_empty(),
            "MockTransport dropped with end of stream markers never reached: {:?}",
            self.end_of_stream_at
        );

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockTransport write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );

        if let Some(calls) = self.expected_write_calls {
            assert_eq!(self.write_calls, calls, "MockTransport write call count mismatch");
        }
    }
}

/// Transport whose reads always fail, for error propagation tests
#[cfg(test)]
pub struct BrokenTransport;

#[cfg(test)]
impl Transport for BrokenTransport {
    fn write_all(&mut self, _buf: &[u8]) -> std::io::Result<()> {
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Option<Duration>) -> std::io::Result<ReadOutcome> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "line dropped"))
    }
}

// ============================================================================
// Tests
// ============================================================================
