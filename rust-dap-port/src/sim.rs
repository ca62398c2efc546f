// Copyright 2024 Kenta Ida
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Software pin bank.
//!
//! [`SimulatedBank`] models the electrical behavior of a GPIO block closely
//! enough to unit test the mode and signal layers on the host: every pin has a
//! mode and an output latch, the outside world can drive or pull a pin, and
//! every change of an observable line level is recorded so tests can look for
//! glitches and contention.

use crate::bank::PinBank;
use crate::signal::{ElectricalMode, PinId};
use embedded_hal::digital::v2::PinState;
use heapless::Vec;

const LOG_CAPACITY: usize = 256;

/// One observable change of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub pin: PinId,
    /// `None` when nothing drives the line.
    pub line: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SimPin {
    mode: ElectricalMode,
    latch: bool,
    external: Option<bool>,
}

impl SimPin {
    const RESET: Self = Self {
        mode: ElectricalMode::HighZ,
        latch: false,
        external: None,
    };

    fn line(&self) -> Option<bool> {
        match self.mode {
            ElectricalMode::OutputPushPull => Some(self.latch),
            ElectricalMode::OutputOpenDrainPullUp if !self.latch => Some(false),
            ElectricalMode::OutputOpenDrainPullUp | ElectricalMode::InputPullUp => {
                Some(self.external.unwrap_or(true))
            }
            ElectricalMode::InputFloating | ElectricalMode::HighZ => self.external,
        }
    }

    fn contended(&self) -> bool {
        match (self.mode, self.external) {
            (ElectricalMode::OutputPushPull, Some(external)) => external != self.latch,
            // Driving low against a target that pulls high is what open-drain is for.
            _ => false,
        }
    }
}

/// GPIO block with `PORTS` ports of `PINS` pins each, all starting in HighZ.
#[derive(Debug, Clone)]
pub struct SimulatedBank<const PORTS: usize, const PINS: usize> {
    pins: [[SimPin; PINS]; PORTS],
    native_open_drain: bool,
    log: Vec<Transition, LOG_CAPACITY>,
    log_overflow: bool,
    contentions: usize,
}

impl<const PORTS: usize, const PINS: usize> Default for SimulatedBank<PORTS, PINS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const PORTS: usize, const PINS: usize> SimulatedBank<PORTS, PINS> {
    pub fn new() -> Self {
        Self {
            pins: [[SimPin::RESET; PINS]; PORTS],
            native_open_drain: true,
            log: Vec::new(),
            log_overflow: false,
            contentions: 0,
        }
    }

    /// Bank whose outputs cannot be open-drain, like an STM32F1.
    pub fn without_open_drain() -> Self {
        Self {
            native_open_drain: false,
            ..Self::new()
        }
    }

    fn pin(&self, pin: PinId) -> &SimPin {
        debug_assert!(
            (pin.port as usize) < PORTS && (pin.index as usize) < PINS,
            "pin out of range"
        );
        &self.pins[pin.port as usize][pin.index as usize]
    }

    fn update(&mut self, pin: PinId, f: impl FnOnce(&mut SimPin)) {
        debug_assert!(
            (pin.port as usize) < PORTS && (pin.index as usize) < PINS,
            "pin out of range"
        );
        let state = &mut self.pins[pin.port as usize][pin.index as usize];
        let before = state.line();
        f(state);
        let after = state.line();
        let contended = state.contended();
        if contended {
            self.contentions += 1;
        }
        if before != after && self.log.push(Transition { pin, line: after }).is_err() {
            self.log_overflow = true;
        }
    }

    /// Drives `pin` from outside the probe; `None` stops driving it.
    pub fn drive_external(&mut self, pin: PinId, level: Option<bool>) {
        self.update(pin, |state| state.external = level);
    }

    pub fn mode(&self, pin: PinId) -> ElectricalMode {
        self.pin(pin).mode
    }

    pub fn latch(&self, pin: PinId) -> bool {
        self.pin(pin).latch
    }

    /// Level seen on the wire, `None` when floating.
    pub fn line(&self, pin: PinId) -> Option<bool> {
        self.pin(pin).line()
    }

    /// Recorded line changes, oldest first.
    pub fn transitions(&self) -> &[Transition] {
        debug_assert!(!self.log_overflow, "transition log overflowed");
        &self.log
    }

    /// Line levels taken by one pin, oldest first.
    pub fn history(&self, pin: PinId) -> impl Iterator<Item = Option<bool>> + '_ {
        self.log
            .iter()
            .filter(move |transition| transition.pin == pin)
            .map(|transition| transition.line)
    }

    pub fn clear_transitions(&mut self) {
        self.log.clear();
        self.log_overflow = false;
    }

    /// Number of operations that left a push-pull output fighting an external driver.
    pub fn contentions(&self) -> usize {
        self.contentions
    }
}

impl<const PORTS: usize, const PINS: usize> PinBank for SimulatedBank<PORTS, PINS> {
    const TURNAROUND_CYCLES: u32 = 2;
    const WRITE_CYCLES: u32 = 1;

    fn configure(&mut self, pin: PinId, mode: ElectricalMode, level: PinState) {
        debug_assert!(
            self.native_open_drain || mode != ElectricalMode::OutputOpenDrainPullUp,
            "open-drain requested from a bank without it"
        );
        self.update(pin, |state| {
            state.latch = level == PinState::High;
            state.mode = mode;
        });
    }

    fn set(&mut self, pin: PinId, level: PinState) {
        self.update(pin, |state| state.latch = level == PinState::High);
    }

    fn get(&self, pin: PinId) -> bool {
        self.pin(pin).line().unwrap_or(false)
    }

    fn native_open_drain(&self) -> bool {
        self.native_open_drain
    }
}
