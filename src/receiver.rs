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

use std::marker::PhantomData;
use crate::error::{LinkError, Result};
use crate::protocol::*;
use crate::serial::{ReadOutcome, Transport};
use crate::validator::{FrameValidator, Outcome};

// ============================================================================
// States
// ============================================================================

pub struct WaitSet;
pub struct SendUa;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct ReceiverFsm<State> {
    state: PhantomData<State>,
    serial: Box<dyn Transport>,
    validator: FrameValidator,
    received: [u8; FRAME_SIZE],
}

/// What a single step of the receiver produced
pub enum ReceiverStep {
    Next(Box<dyn ReceiverState>),
    /// UA sent; holds the SET frame that was answered
    Replied([u8; FRAME_SIZE]),
}

// ============================================================================
// Trait
// ============================================================================

pub trait ReceiverState: Send {
    fn step(self: Box<Self>) -> Result<ReceiverStep>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> ReceiverFsm<S> {
    fn transition<T>(self: Box<Self>) -> Box<ReceiverFsm<T>> {
        let fsm = *self;
        Box::new(ReceiverFsm {
            state: PhantomData,
            serial: fsm.serial,
            validator: fsm.validator,
            received: fsm.received,
        })
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl ReceiverState for ReceiverFsm<WaitSet> {
    fn step(self: Box<Self>) -> Result<ReceiverStep> {
        let mut fsm = self;

        // No deadline: the transmitter owns the retry budget
        match fsm.serial.read_byte(None).map_err(LinkError::in_state::<WaitSet>)? {
            ReadOutcome::Byte(byte) => match fsm.validator.feed(byte) {
                Outcome::Matched(frame) => {
                    log::info!("SET frame received: {}", hex(&frame));
                    fsm.received = frame;
                    let next = fsm.transition::<SendUa>();
                    Ok(ReceiverStep::Next(next))
                }
                Outcome::Pending | Outcome::Rejected => Ok(ReceiverStep::Next(fsm)),
            },
            ReadOutcome::WouldBlock | ReadOutcome::EndOfStream => Ok(ReceiverStep::Next(fsm)),
        }
    }
}

impl ReceiverState for ReceiverFsm<SendUa> {
    fn step(self: Box<Self>) -> Result<ReceiverStep> {
        let mut fsm = self;
        fsm.serial.write_all(&UA_FRAME).map_err(LinkError::in_state::<SendUa>)?;
        log::info!("UA frame sent: {}", hex(&UA_FRAME));
        Ok(ReceiverStep::Replied(fsm.received))
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl ReceiverFsm<WaitSet> {
    pub fn new(serial: Box<dyn Transport>) -> Box<dyn ReceiverState> {
        Box::new(ReceiverFsm {
            state: PhantomData::<WaitSet>,
            serial,
            validator: FrameValidator::new(A_TRANSMITTER, C_SET),
            received: [0; FRAME_SIZE],
        })
    }
}

/// Steps the receiver until a SET has been answered with UA
pub fn run(mut state: Box<dyn ReceiverState>) -> Result<[u8; FRAME_SIZE]> {
    loop {
        match state.step()? {
            ReceiverStep::Next(next) => state = next,
            ReceiverStep::Replied(frame) => return Ok(frame),
        }
    }
}

pub fn accept(serial: Box<dyn Transport>) -> Result<[u8; FRAME_SIZE]> {
    run(ReceiverFsm::new(serial))
}

// ============================================================================
// Tests
// ============================================================================
