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

use std::time::Duration;
use serialport::{DataBits, Parity, StopBits};
use crate::error::{LinkError, Result};
use crate::serial::LineSettings;

/// Number of SET transmissions before the transmitter gives up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Seconds to wait for UA after each SET
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Longest wait for UA accepted from the command line
pub const MAX_TIMEOUT_SECS: u64 = 3600;

pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Retry budget of the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HandshakeConfig {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl HandshakeConfig {
    pub fn new(max_retries: u32, timeout: Duration) -> Result<Self> {
        if max_retries == 0 {
            return Err(LinkError::config("retries must be at least 1"));
        }
        if timeout.is_zero() {
            return Err(LinkError::config("timeout must be greater than zero"));
        }
        if timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
            return Err(LinkError::config(format!(
                "timeout must be at most {} seconds, got {}",
                MAX_TIMEOUT_SECS,
                timeout.as_secs()
            )));
        }
        Ok(HandshakeConfig { max_retries, timeout })
    }
}

// ============================================================================
// Line Setting Parsers
// ============================================================================

pub fn parse_data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(LinkError::config(format!("data bits must be 5, 6, 7 or 8, got {}", bits))),
    }
}

pub fn parse_parity(parity: &str) -> Result<Parity> {
    match parity.to_ascii_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(LinkError::config(format!(
            "parity must be 'none', 'odd' or 'even', got '{}'",
            parity
        ))),
    }
}

pub fn parse_stop_bits(bits: u8) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(LinkError::config(format!("stop bits must be 1 or 2, got {}", bits))),
    }
}

pub fn line_settings(baud_rate: u32, data_bits: u8, parity: &str, stop_bits: u8) -> Result<LineSettings> {
    if baud_rate == 0 {
        return Err(LinkError::config("baud rate must be greater than zero"));
    }
    Ok(LineSettings {
        baud_rate,
        data_bits: parse_data_bits(data_bits)?,
        parity: parse_parity(parity)?,
        stop_bits: parse_stop_bits(stop_bits)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handshake() {
        let config = HandshakeConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_handshake_validation() {
        assert!(HandshakeConfig::new(5, Duration::from_millis(500)).is_ok());
        assert!(matches!(
            HandshakeConfig::new(0, Duration::from_secs(3)),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            HandshakeConfig::new(3, Duration::ZERO),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn test_handshake_rejects_huge_timeout() {
        assert!(HandshakeConfig::new(3, Duration::from_secs(MAX_TIMEOUT_SECS)).is_ok());
        assert!(matches!(
            HandshakeConfig::new(3, Duration::from_secs(MAX_TIMEOUT_SECS + 1)),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            HandshakeConfig::new(3, Duration::from_secs(u64::MAX)),
            Err(LinkError::Config(_))
        ));
    }

    #[test]
    fn test_line_settings() {
        let settings = line_settings(38400, 8, "None", 1).expect("valid settings");
        assert_eq!(settings.baud_rate, 38400);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);

        assert_eq!(parse_parity("EVEN").unwrap(), Parity::Even);
        assert_eq!(parse_data_bits(7).unwrap(), DataBits::Seven);
        assert_eq!(parse_stop_bits(2).unwrap(), StopBits::Two);
    }

    #[test]
    fn test_line_settings_rejects_bad_values() {
        assert!(line_settings(0, 8, "none", 1).is_err());
        assert!(line_settings(9600, 9, "none", 1).is_err());
        assert!(line_settings(9600, 8, "mark", 1).is_err());
        assert!(line_settings(9600, 8, "none", 3).is_err());
    }
}
