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

//! Link control frame constants

/// Number of bytes in a supervision frame
pub const FRAME_SIZE: usize = 5;

/// Frame delimiter, first and last byte of every frame
pub const FLAG: u8 = 0x7E;

/// Address field of frames sent by the transmitter (initiator)
pub const A_TRANSMITTER: u8 = 0x03;

/// Address field of frames sent by the receiver (responder)
pub const A_RECEIVER: u8 = 0x01;

/// Set up - transmitter requests connection establishment
pub const C_SET: u8 = 0x03;

/// Unnumbered acknowledgement - receiver confirms SET
pub const C_UA: u8 = 0x07;

/// Block check character over the address and control fields
pub const fn bcc(address: u8, control: u8) -> u8 {
    address ^ control
}

/// Builds a supervision frame for the given address and control fields
pub const fn supervision_frame(address: u8, control: u8) -> [u8; FRAME_SIZE] {
    [FLAG, address, control, bcc(address, control), FLAG]
}

/// SET frame as sent by the transmitter
pub const SET_FRAME: [u8; FRAME_SIZE] = supervision_frame(A_TRANSMITTER, C_SET);

/// UA frame as sent by the receiver
pub const UA_FRAME: [u8; FRAME_SIZE] = supervision_frame(A_RECEIVER, C_UA);

/// Formats frame bytes for logging, e.g. `7E 03 03 00 7E`
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
