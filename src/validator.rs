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

//! Byte-at-a-time recognition of a single expected supervision frame.
//!
//! The validator is fed one received byte per call and reports whether the
//! bytes seen so far complete the frame it was built for. Any mismatch drops
//! the partial frame and restarts the search for an opening flag, so line
//! noise never desynchronises the receiver for longer than one frame.

use crate::protocol::{FLAG, FRAME_SIZE, bcc};

/// Result of feeding one byte to the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a complete frame yet
    Pending,
    /// The expected frame was received; holds the bytes as received
    Matched([u8; FRAME_SIZE]),
    /// A partial frame was discarded and the search restarted
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStart,
    AwaitAddress,
    AwaitControl,
    AwaitChecksum,
    AwaitEnd,
}

pub struct FrameValidator {
    address: u8,
    control: u8,
    state: State,
    frame: [u8; FRAME_SIZE],
}

impl FrameValidator {
    /// Creates a validator that accepts only frames carrying `address` and `control`
    pub fn new(address: u8, control: u8) -> Self {
        FrameValidator {
            address,
            control,
            state: State::AwaitStart,
            frame: [0; FRAME_SIZE],
        }
    }

    pub fn feed(&mut self, byte: u8) -> Outcome {
        match self.state {
            State::AwaitStart => {
                if byte == FLAG {
                    self.frame[0] = byte;
                    self.state = State::AwaitAddress;
                }
                Outcome::Pending
            }
            State::AwaitAddress => {
                if byte == self.address {
                    self.frame[1] = byte;
                    self.state = State::AwaitControl;
                    Outcome::Pending
                } else if byte == FLAG {
                    // Back-to-back flags: this one opens the frame
                    self.frame[0] = byte;
                    Outcome::Pending
                } else {
                    self.reject()
                }
            }
            State::AwaitControl => {
                if byte == self.control {
                    self.frame[2] = byte;
                    self.state = State::AwaitChecksum;
                    Outcome::Pending
                } else {
                    self.reject()
                }
            }
            State::AwaitChecksum => {
                if byte == bcc(self.frame[1], self.frame[2]) {
                    self.frame[3] = byte;
                    self.state = State::AwaitEnd;
                    Outcome::Pending
                } else {
                    self.reject()
                }
            }
            State::AwaitEnd => {
                if byte == FLAG {
                    self.frame[4] = byte;
                    let frame = self.frame;
                    self.reset();
                    Outcome::Matched(frame)
                } else {
                    self.reject()
                }
            }
        }
    }

    /// Drops any partially received frame
    pub fn reset(&mut self) {
        self.state = State::AwaitStart;
        self.frame = [0; FRAME_SIZE];
    }

    /// True while a frame has been opened but not yet completed
    pub fn in_frame(&self) -> bool {
        self.state != State::AwaitStart
    }

    fn reject(&mut self) -> Outcome {
        log::debug!(
            "Discarded partial frame: {}",
            crate::protocol::hex(&self.frame[..self.received()])
        );
        self.reset();
        Outcome::Rejected
    }

    fn received(&self) -> usize {
        match self.state {
            State::AwaitStart => 0,
            State::AwaitAddress => 1,
            State::AwaitControl => 2,
            State::AwaitChecksum => 3,
            State::AwaitEnd => 4,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::*;

    fn set_validator() -> FrameValidator {
        FrameValidator::new(A_TRANSMITTER, C_SET)
    }

    /// Feeds all bytes and returns every frame matched along the way
    fn feed_all(validator: &mut FrameValidator, bytes: &[u8]) -> Vec<[u8; FRAME_SIZE]> {
        bytes
            .iter()
            .filter_map(|&b| match validator.feed(b) {
                Outcome::Matched(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_matches_exact_frame() {
        let mut v = set_validator();
        let outcomes: Vec<Outcome> = SET_FRAME.iter().map(|&b| v.feed(b)).collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Pending,
                Outcome::Pending,
                Outcome::Pending,
                Outcome::Pending,
                Outcome::Matched(SET_FRAME),
            ]
        );
        assert!(!v.in_frame());
    }

    #[test]
    fn test_noise_before_frame_is_discarded() {
        let mut v = set_validator();
        let mut stream = vec![0x00, 0x55, 0x03, 0xFF];
        stream.extend_from_slice(&SET_FRAME);
        assert_eq!(feed_all(&mut v, &stream), vec![SET_FRAME]);
    }

    #[test]
    fn test_stray_leading_flag() {
        let mut v = set_validator();
        let mut stream = vec![FLAG, FLAG];
        stream.extend_from_slice(&SET_FRAME);
        assert_eq!(feed_all(&mut v, &stream), vec![SET_FRAME]);
    }

    #[test]
    fn test_bad_checksum_then_good_frame() {
        let mut v = set_validator();
        let mut stream = vec![FLAG, A_TRANSMITTER, C_SET, 0x55, FLAG];
        stream.extend_from_slice(&SET_FRAME);
        assert_eq!(feed_all(&mut v, &stream), vec![SET_FRAME]);
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let mut v = set_validator();
        assert_eq!(v.feed(FLAG), Outcome::Pending);
        assert_eq!(v.feed(A_TRANSMITTER), Outcome::Pending);
        assert_eq!(v.feed(C_SET), Outcome::Pending);
        assert_eq!(v.feed(0x01), Outcome::Rejected);
        assert!(!v.in_frame());
    }

    #[test]
    fn test_wrong_frame_type_is_not_matched() {
        // A well-formed UA is not what a SET validator is looking for
        let mut v = set_validator();
        assert!(feed_all(&mut v, &UA_FRAME).is_empty());

        let mut v = FrameValidator::new(A_RECEIVER, C_UA);
        assert!(feed_all(&mut v, &SET_FRAME).is_empty());
        assert_eq!(feed_all(&mut v, &UA_FRAME), vec![UA_FRAME]);
    }

    #[test]
    fn test_wrong_address_is_rejected() {
        let mut v = set_validator();
        v.feed(FLAG);
        assert_eq!(v.feed(A_RECEIVER), Outcome::Rejected);
    }

    #[test]
    fn test_missing_end_flag_is_rejected() {
        let mut v = set_validator();
        for &b in &SET_FRAME[..4] {
            assert_eq!(v.feed(b), Outcome::Pending);
        }
        assert_eq!(v.feed(0x00), Outcome::Rejected);
    }

    #[test]
    fn test_flag_mid_frame_is_not_a_restart() {
        // Only the address position resynchronises on a flag
        let mut v = set_validator();
        let stream = [FLAG, A_TRANSMITTER, FLAG, A_TRANSMITTER, C_SET, 0x00, FLAG];
        assert!(feed_all(&mut v, &stream).is_empty());
    }

    #[test]
    fn test_consecutive_frames() {
        let mut v = set_validator();
        let mut stream = SET_FRAME.to_vec();
        stream.extend_from_slice(&SET_FRAME);
        assert_eq!(feed_all(&mut v, &stream), vec![SET_FRAME, SET_FRAME]);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut v = set_validator();
        for &b in &SET_FRAME[..3] {
            v.feed(b);
        }
        assert!(v.in_frame());
        v.reset();
        assert!(!v.in_frame());
        assert!(feed_all(&mut v, &SET_FRAME[3..]).is_empty());
    }
}
