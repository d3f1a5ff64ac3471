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
use std::time::{Duration, Instant};
use crate::config::HandshakeConfig;
use crate::error::{LinkError, Result};
use crate::protocol::*;
use crate::serial::{ReadOutcome, Transport};
use crate::validator::{FrameValidator, Outcome};

// ============================================================================
// Deadline
// ============================================================================

/// Expiry of the current attempt, checked against the monotonic clock
#[derive(Debug, Default)]
struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    fn arm(&mut self, timeout: Duration) -> Result<()> {
        debug_assert!(self.expires_at.is_none(), "previous attempt's deadline still armed");
        let expires_at = Instant::now()
            .checked_add(timeout)
            .ok_or_else(|| LinkError::config(format!("timeout of {:?} is out of range", timeout)))?;
        self.expires_at = Some(expires_at);
        Ok(())
    }

    fn disarm(&mut self) {
        self.expires_at = None;
    }

    /// Time left before expiry, `None` when disarmed
    fn remaining(&self) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

// ============================================================================
// States
// ============================================================================

pub struct Sending;
pub struct Waiting;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct TransmitterFsm<State> {
    state: PhantomData<State>,
    serial: Box<dyn Transport>,
    config: HandshakeConfig,
    validator: FrameValidator,
    deadline: Deadline,
    attempts: u32,
}

/// What a single step of the transmitter produced
pub enum TransmitterStep {
    Next(Box<dyn TransmitterState>),
    /// UA received; holds the number of SET frames sent
    Connected(u32),
}

// ============================================================================
// Trait
// ============================================================================

pub trait TransmitterState: Send {
    fn step(self: Box<Self>) -> Result<TransmitterStep>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> TransmitterFsm<S> {
    fn transition<T>(self: Box<Self>) -> Box<TransmitterFsm<T>> {
        let fsm = *self;
        Box::new(TransmitterFsm {
            state: PhantomData,
            serial: fsm.serial,
            config: fsm.config,
            validator: fsm.validator,
            deadline: fsm.deadline,
            attempts: fsm.attempts,
        })
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl TransmitterState for TransmitterFsm<Sending> {
    fn step(self: Box<Self>) -> Result<TransmitterStep> {
        let mut fsm = self;
        fsm.attempts += 1;

        fsm.serial.write_all(&SET_FRAME).map_err(LinkError::in_state::<Sending>)?;
        log::info!(
            "SET frame sent (attempt {}/{}): {}",
            fsm.attempts, fsm.config.max_retries, hex(&SET_FRAME)
        );

        let timeout = fsm.config.timeout;
        fsm.deadline.arm(timeout)?;
        let next = fsm.transition::<Waiting>();
        Ok(TransmitterStep::Next(next))
    }
}

impl TransmitterState for TransmitterFsm<Waiting> {
    fn step(self: Box<Self>) -> Result<TransmitterStep> {
        let mut fsm = self;

        let remaining = match fsm.deadline.remaining() {
            Some(left) if !left.is_zero() => left,
            _ => return fsm.abandon_attempt("Timeout waiting for UA"),
        };

        match fsm.serial.read_byte(Some(remaining)) {
            Ok(ReadOutcome::Byte(byte)) => match fsm.validator.feed(byte) {
                Outcome::Matched(frame) => {
                    fsm.deadline.disarm();
                    log::info!("UA frame received: {}", hex(&frame));
                    Ok(TransmitterStep::Connected(fsm.attempts))
                }
                Outcome::Pending | Outcome::Rejected => Ok(TransmitterStep::Next(fsm)),
            },
            Ok(ReadOutcome::WouldBlock) => fsm.abandon_attempt("Timeout waiting for UA"),
            Ok(ReadOutcome::EndOfStream) => fsm.abandon_attempt("No bytes received"),
            Err(e) => {
                fsm.deadline.disarm();
                Err(LinkError::in_state::<Waiting>(e))
            }
        }
    }
}

impl TransmitterFsm<Waiting> {
    /// Clears the deadline and any partial UA so the next attempt starts clean
    fn end_attempt(&mut self) {
        self.deadline.disarm();
        if self.validator.in_frame() {
            log::debug!("Dropping partial UA from attempt {}", self.attempts);
        }
        self.validator.reset();
    }

    /// Ends the current attempt and either resends SET or gives up
    fn abandon_attempt(mut self: Box<Self>, reason: &str) -> Result<TransmitterStep> {
        self.end_attempt();
        log::warn!("{} (attempt {}/{})", reason, self.attempts, self.config.max_retries);

        if self.attempts >= self.config.max_retries {
            return Err(LinkError::EstablishmentFailed { attempts: self.attempts });
        }

        let next = self.transition::<Sending>();
        Ok(TransmitterStep::Next(next))
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl TransmitterFsm<Sending> {
    pub fn new(serial: Box<dyn Transport>, config: HandshakeConfig) -> Box<dyn TransmitterState> {
        Box::new(TransmitterFsm {
            state: PhantomData::<Sending>,
            serial,
            config,
            validator: FrameValidator::new(A_RECEIVER, C_UA),
            deadline: Deadline::default(),
            attempts: 0,
        })
    }
}

/// Steps the transmitter until UA arrives or the retry budget is spent.
/// Returns the number of attempts it took.
pub fn run(mut state: Box<dyn TransmitterState>) -> Result<u32> {
    loop {
        match state.step()? {
            TransmitterStep::Next(next) => state = next,
            TransmitterStep::Connected(attempts) => return Ok(attempts),
        }
    }
}

pub fn connect(serial: Box<dyn Transport>, config: HandshakeConfig) -> Result<u32> {
    run(TransmitterFsm::new(serial, config))
}

// ============================================================================
// Tests
// ============================================================================
