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

//! STM32F1 GPIO ports as a [`PinBank`].
//!
//! Levels are latched through BSRR, which sets or resets a single bit in one
//! store, before the 4-bit CNF/MODE field in CRL/CRH is rewritten. A pin
//! therefore never shows a stale latch value when it turns into an output.

use crate::pac::gpioa::RegisterBlock;
use embedded_hal::digital::v2::PinState;
use rust_dap_port::{ElectricalMode, PinBank, PinId, SignalMap};

const PINS_PER_PORT: u8 = 16;

// CNF[1:0] MODE[1:0]
const CR_ANALOG: u32 = 0b0000;
const CR_INPUT_FLOATING: u32 = 0b0100;
const CR_INPUT_PULL: u32 = 0b1000;
const CR_OUTPUT_10MHZ: u32 = 0b0001;
const CR_OUTPUT_50MHZ: u32 = 0b0011;
const CR_OPEN_DRAIN: u32 = 0b0100;

/// Configuration nibble for `mode`.
pub const fn cr_bits(mode: ElectricalMode, fast: bool) -> u32 {
    let speed = if fast { CR_OUTPUT_50MHZ } else { CR_OUTPUT_10MHZ };
    match mode {
        ElectricalMode::OutputPushPull => speed,
        ElectricalMode::OutputOpenDrainPullUp => speed | CR_OPEN_DRAIN,
        ElectricalMode::InputFloating => CR_INPUT_FLOATING,
        // The pull direction follows the ODR bit, which `configure` latches first.
        ElectricalMode::InputPullUp => CR_INPUT_PULL,
        ElectricalMode::HighZ => CR_ANALOG,
    }
}

/// GPIO ports of an STM32F1, indexed by [`PinId::port`].
pub struct Stm32f1Bank<const PORTS: usize> {
    ports: [&'static RegisterBlock; PORTS],
    /// Pins switched at 50 MHz output speed, one mask per port.
    fast: [u16; PORTS],
}

impl<const PORTS: usize> Stm32f1Bank<PORTS> {
    /// # Safety
    ///
    /// Nothing else may access the register blocks in `ports` while the bank
    /// exists. Their port clocks must be enabled.
    pub unsafe fn new(ports: [&'static RegisterBlock; PORTS]) -> Self {
        Self {
            ports,
            fast: [0; PORTS],
        }
    }

    /// Uses the fast output speed for every fast-toggle pin of `map`.
    pub fn with_fast_outputs(mut self, map: &SignalMap) -> Self {
        for (_, desc) in map.iter() {
            if desc.fast_toggle {
                debug_assert!((desc.pin.port as usize) < PORTS);
                self.fast[desc.pin.port as usize] |= 1 << desc.pin.index;
            }
        }
        self
    }

    #[inline(always)]
    fn port(&self, pin: PinId) -> &'static RegisterBlock {
        debug_assert!(
            (pin.port as usize) < PORTS && pin.index < PINS_PER_PORT,
            "pin out of range"
        );
        self.ports[pin.port as usize]
    }

    #[inline(always)]
    fn latch(port: &RegisterBlock, index: u8, level: PinState) {
        let value = match level {
            PinState::High => 1 << index,
            PinState::Low => 1 << (index + PINS_PER_PORT),
        };
        // SAFETY: every BSRR bit pattern is valid; zero bits are ignored.
        port.bsrr.write(|w| unsafe { w.bits(value) });
    }
}

impl<const PORTS: usize> PinBank for Stm32f1Bank<PORTS> {
    // Cortex-M3 timings of the inlined sequence: BSRR store 2, CRx load 2,
    // mask and or 2, CRx store 2.
    const TURNAROUND_CYCLES: u32 = 8;
    // Mask shift 1, BSRR or BSRR-reset store 1 after the address is hoisted.
    const WRITE_CYCLES: u32 = 2;
    // Four byte loads 2 each (line tag, direction flag, level, buffer tag),
    // three compare-and-branch 1 each, flag store 1.
    const DISPATCH_CYCLES: u32 = 12;

    #[inline(always)]
    fn configure(&mut self, pin: PinId, mode: ElectricalMode, level: PinState) {
        debug_assert!(mode != ElectricalMode::OutputOpenDrainPullUp, "no output pull-up on STM32F1");
        let port = self.port(pin);
        Self::latch(port, pin.index, level);

        let fast = self.fast[pin.port as usize] & (1 << pin.index) != 0;
        let bits = cr_bits(mode, fast);
        // SAFETY: only this pin's CNF/MODE nibble changes, to a valid encoding.
        if pin.index < 8 {
            let shift = pin.index as u32 * 4;
            port.crl
                .modify(|r, w| unsafe { w.bits((r.bits() & !(0xf << shift)) | (bits << shift)) });
        } else {
            let shift = (pin.index as u32 - 8) * 4;
            port.crh
                .modify(|r, w| unsafe { w.bits((r.bits() & !(0xf << shift)) | (bits << shift)) });
        }
    }

    #[inline(always)]
    fn set(&mut self, pin: PinId, level: PinState) {
        Self::latch(self.port(pin), pin.index, level);
    }

    #[inline(always)]
    fn get(&self, pin: PinId) -> bool {
        self.port(pin).idr.read().bits() & (1 << pin.index) != 0
    }

    fn native_open_drain(&self) -> bool {
        false
    }
}
