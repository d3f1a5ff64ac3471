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

// Logical link establishment (SET/UA) over a serial line
mod config;
mod error;
mod protocol;
mod receiver;
mod serial;
mod transmitter;
mod validator;

use clap::{Parser, Subcommand};
use std::time::Duration;
use config::{DEFAULT_BAUD_RATE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, HandshakeConfig};
use error::LinkError;
use serial::SerialTransport;

const EXIT_ESTABLISHED: i32 = 0;

/// Exit status for I/O and configuration errors
const EXIT_FAILURE: i32 = 1;

/// Exit status when the transmitter runs out of retries
const EXIT_NOT_ESTABLISHED: i32 = 2;

#[derive(Parser)]
#[command(name = "linkup")]
#[command(about = "Establish a logical link over RS-232 with a SET/UA handshake", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Baud rate
    #[arg(short, long, global = true, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, global = true, default_value = "8", value_name = "BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, global = true, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, global = true, default_value = "1", value_name = "BITS")]
    stop_bits: u8,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send SET and wait for UA
    Transmit {
        /// Serial port to use (e.g., /dev/ttyS1 or COM1)
        port: String,

        /// Number of SET frames to send before giving up
        #[arg(short, long, default_value_t = DEFAULT_MAX_RETRIES)]
        retries: u32,

        /// Seconds to wait for UA after each SET
        #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
        timeout: u64,
    },
    /// Wait for SET and answer with UA
    Receive {
        /// Serial port to use (e.g., /dev/ttyS2 or COM2)
        port: String,
    },
}

impl Commands {
    fn port(&self) -> &str {
        match self {
            Commands::Transmit { port, .. } | Commands::Receive { port } => port,
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = run(&cli);
    match &result {
        Ok(()) => {}
        Err(LinkError::EstablishmentFailed { attempts }) => {
            log::error!("Maximum retries reached after {} attempts, link not established", attempts);
        }
        Err(e) => log::error!("{}", e),
    }

    std::process::exit(exit_code(&result));
}

fn exit_code(result: &Result<(), LinkError>) -> i32 {
    match result {
        Ok(()) => EXIT_ESTABLISHED,
        Err(LinkError::EstablishmentFailed { .. }) => EXIT_NOT_ESTABLISHED,
        Err(LinkError::Io(_) | LinkError::Serial(_) | LinkError::Config(_)) => EXIT_FAILURE,
    }
}

fn run(cli: &Cli) -> Result<(), LinkError> {
    let settings = config::line_settings(cli.baud, cli.data_bits, &cli.parity, cli.stop_bits)?;

    let handshake = match &cli.command {
        Commands::Transmit { retries, timeout, .. } => {
            Some(HandshakeConfig::new(*retries, Duration::from_secs(*timeout))?)
        }
        Commands::Receive { .. } => None,
    };

    // Dropping the transport restores the line settings on every path
    let serial_port = SerialTransport::open(cli.command.port(), settings)?;

    match handshake {
        Some(handshake) => {
            let attempts = transmitter::connect(Box::new(serial_port), handshake)?;
            log::info!("Link established after {} attempt(s)", attempts);
        }
        None => {
            log::info!("Waiting for SET frame...");
            receiver::accept(Box::new(serial_port))?;
            log::info!("Link established");
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(())), 0);
        assert_eq!(exit_code(&Err(LinkError::EstablishmentFailed { attempts: 3 })), 2);
        assert_eq!(exit_code(&Err(LinkError::config("retries must be at least 1"))), 1);

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "line dropped");
        assert_eq!(exit_code(&Err(LinkError::Io(io))), 1);

        let serial = serialport::Error::new(serialport::ErrorKind::NoDevice, "no such port");
        assert_eq!(exit_code(&Err(LinkError::Serial(serial))), 1);
    }

    #[test]
    fn test_cli_parses_transmit() {
        let cli = Cli::try_parse_from(["linkup", "transmit", "/dev/ttyS1", "--retries", "5", "--timeout", "2"])
            .expect("should parse");
        assert_eq!(cli.command.port(), "/dev/ttyS1");
        assert_eq!(cli.baud, DEFAULT_BAUD_RATE);
        match cli.command {
            Commands::Transmit { retries, timeout, .. } => {
                assert_eq!(retries, 5);
                assert_eq!(timeout, 2);
            }
            Commands::Receive { .. } => panic!("expected transmit"),
        }
    }

    #[test]
    fn test_cli_requires_port() {
        assert!(Cli::try_parse_from(["linkup", "receive"]).is_err());
    }
}
