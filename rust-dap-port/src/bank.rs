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

use crate::signal::{ElectricalMode, PinId};
use embedded_hal::digital::v2::PinState;

/// Electrical control of the probe's GPIO pins.
///
/// One implementation exists per microcontroller family. All operations are
/// non-blocking, O(1) and infallible. Passing a pin that does not exist on
/// the device is a contract violation: implementations `debug_assert!` on it
/// and the behavior in release builds is unspecified.
pub trait PinBank {
    /// Cycle cost of one `configure` call on a fast-toggle pin, which is what
    /// a data-line turnaround consists of.
    const TURNAROUND_CYCLES: u32;

    /// Cycle cost of one `set` call.
    const WRITE_CYCLES: u32;

    /// Fixed cost of the turnaround fast path around its pin accesses: the
    /// cached line and direction flag tests and the flag store.
    const DISPATCH_CYCLES: u32 = 0;

    /// Switches `pin` to `mode` with its output latch preset to `level`.
    ///
    /// The latch is written before the direction changes, so a pin that
    /// becomes an output starts at `level` and never shows the previous latch
    /// value. For input modes `level` is only retained in the latch.
    fn configure(&mut self, pin: PinId, mode: ElectricalMode, level: PinState);

    /// Drives the output latch of `pin`.
    fn set(&mut self, pin: PinId, level: PinState);

    /// Samples the line level of `pin`.
    fn get(&self, pin: PinId) -> bool;

    /// Whether [`ElectricalMode::OutputOpenDrainPullUp`] is available in
    /// hardware. When it is not, the caller emulates it by releasing the line
    /// as a pulled-up input and driving low as a push-pull output.
    fn native_open_drain(&self) -> bool {
        true
    }
}

impl<B: PinBank> PinBank for &mut B {
    const TURNAROUND_CYCLES: u32 = B::TURNAROUND_CYCLES;
    const WRITE_CYCLES: u32 = B::WRITE_CYCLES;
    const DISPATCH_CYCLES: u32 = B::DISPATCH_CYCLES;

    #[inline(always)]
    fn configure(&mut self, pin: PinId, mode: ElectricalMode, level: PinState) {
        (**self).configure(pin, mode, level)
    }
    #[inline(always)]
    fn set(&mut self, pin: PinId, level: PinState) {
        (**self).set(pin, level)
    }
    #[inline(always)]
    fn get(&self, pin: PinId) -> bool {
        (**self).get(pin)
    }
    fn native_open_drain(&self) -> bool {
        (**self).native_open_drain()
    }
}
