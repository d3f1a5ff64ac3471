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

use thiserror::Error;

/// Errors that end a transmitter or receiver run
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial line failed while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial device could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// No UA arrived within the retry budget
    #[error("connection not established after {attempts} attempts")]
    EstablishmentFailed { attempts: u32 },
}

impl LinkError {
    pub fn config(msg: impl Into<String>) -> Self {
        LinkError::Config(msg.into())
    }

    /// Annotates an I/O error with the state machine state it occurred in
    pub(crate) fn in_state<S>(e: std::io::Error) -> Self {
        let type_name = std::any::type_name::<S>();
        let state_name = type_name.split("::").last().unwrap_or(type_name);
        LinkError::Io(std::io::Error::new(
            e.kind(),
            format!("{} (in state: {})", e, state_name),
        ))
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Waiting;

    #[test]
    fn test_in_state_keeps_kind_and_names_state() {
        let e = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "line dropped");
        match LinkError::in_state::<Waiting>(e) {
            LinkError::Io(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::BrokenPipe);
                assert_eq!(inner.to_string(), "line dropped (in state: Waiting)");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_establishment_failed_message() {
        let e = LinkError::EstablishmentFailed { attempts: 3 };
        assert_eq!(e.to_string(), "connection not established after 3 attempts");
    }
}
