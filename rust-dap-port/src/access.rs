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

//! Per-signal operations used by the protocol engine.

use crate::bank::PinBank;
use crate::error::DapPortError;
use crate::port::{DapPort, DeviceReset};
use crate::signal::{ElectricalMode, LogicalSignal, OperatingMode, SwjPins};
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::PinState;

impl<B: PinBank, R: DeviceReset<B>> DapPort<B, R> {
    /// Reads the logical value of `signal`.
    ///
    /// `Ok(None)` means the board has no input path for this line; no level
    /// is made up for it.
    pub fn read(&self, signal: LogicalSignal) -> Result<Option<bool>, DapPortError> {
        let desc = match self.map.get(signal) {
            Some(desc) => desc,
            None if signal.is_led() => return Ok(None),
            None => return Err(DapPortError::UnsupportedSignal(signal)),
        };
        if !desc.sense {
            return Ok(None);
        }
        Ok(Some(desc.polarity.from_line(self.bank.get(desc.pin))))
    }

    /// Writes the logical value of `signal`.
    ///
    /// Signals that are not driven in the current mode only remember the
    /// value; it is not put on the pin. LEDs missing on this board accept the
    /// write and do nothing.
    #[inline(always)]
    pub fn write(&mut self, signal: LogicalSignal, value: bool) -> Result<(), DapPortError> {
        let desc = match self.map.get(signal) {
            Some(desc) => *desc,
            None if signal.is_led() => return Ok(()),
            None => return Err(DapPortError::UnsupportedSignal(signal)),
        };
        self.levels[signal.index()] = value;
        if signal.is_led() || self.is_driven(signal) {
            self.drive(&desc, desc.polarity.to_level(value));
        }
        Ok(())
    }

    /// Hands the data line to the probe, restoring the last written level.
    ///
    /// Checked form of [`DapPort::turn_data`].
    pub fn enable_output(&mut self, signal: LogicalSignal) -> Result<(), DapPortError> {
        if signal != LogicalSignal::Data {
            return Err(DapPortError::NotBidirectional(signal));
        }
        self.map.resolve(signal)?;
        self.turn_data(true);
        Ok(())
    }

    /// Hands the data line to the target.
    ///
    /// Checked form of [`DapPort::turn_data`].
    pub fn disable_output(&mut self, signal: LogicalSignal) -> Result<(), DapPortError> {
        if signal != LogicalSignal::Data {
            return Err(DapPortError::NotBidirectional(signal));
        }
        self.map.resolve(signal)?;
        self.turn_data(false);
        Ok(())
    }

    /// Data-line turnaround for the bit engine: `output` hands the line to
    /// the probe, otherwise to the target.
    ///
    /// Works on the line resolved at setup, with no lookup or validation.
    /// Costs [`DapPort::turnaround_cost`] cycles, which [`DapPort::new`]
    /// checked against the configured budget. Does nothing while Off, on
    /// boards without a data line, or when the line already points that way.
    #[inline(always)]
    pub fn turn_data(&mut self, output: bool) {
        let Some(line) = self.turnaround else {
            return;
        };
        if self.data_output == output {
            return;
        }
        let level = line
            .polarity
            .to_level(self.levels[LogicalSignal::Data.index()]);
        if output {
            self.bank
                .configure(line.pin, ElectricalMode::OutputPushPull, level);
            if let Some(buffer) = line.buffer {
                self.bank.set(buffer, PinState::High);
            }
        } else {
            if let Some(buffer) = line.buffer {
                self.bank.set(buffer, PinState::Low);
            }
            self.bank
                .configure(line.pin, ElectricalMode::InputFloating, level);
        }
        self.data_output = output;
    }

    /// Runs the board specific reset sequence, if there is one.
    pub fn device_reset(&mut self) -> bool {
        self.reset.device_reset(&mut self.bank, &self.map)
    }

    pub fn led_connect(&mut self, on: bool) {
        // LEDs never fail: absent ones are skipped.
        let _ = self.write(LogicalSignal::LedConnect, on);
    }

    pub fn led_running(&mut self, on: bool) {
        let _ = self.write(LogicalSignal::LedRun, on);
    }

    /// DAP_SWJ_Pins: writes the `select`ed pins from `output`, waits up to
    /// `wait_us` for them to read back as written, and returns the state of
    /// every pin that can be sensed.
    pub fn swj_pins<D: DelayUs<u32>>(
        &mut self,
        output: SwjPins,
        select: SwjPins,
        wait_us: u32,
        delay: &mut D,
    ) -> SwjPins {
        for signal in LogicalSignal::ALL {
            let Some(bit) = signal.swj_pin() else {
                continue;
            };
            if select.contains(bit) && self.map.contains(signal) {
                let _ = self.write(signal, output.contains(bit));
            }
        }

        let mut waited = 0;
        while waited < wait_us {
            let settled = (self.sample_swj_pins() ^ output) & select & self.sensed_swj_pins();
            if settled.is_empty() {
                break;
            }
            delay.delay_us(1);
            waited += 1;
        }

        self.sample_swj_pins()
    }

    fn sensed_swj_pins(&self) -> SwjPins {
        self.map
            .debug_signals()
            .filter(|(_, desc)| desc.sense)
            .filter_map(|(signal, _)| signal.swj_pin())
            .fold(SwjPins::empty(), |pins, bit| pins | bit)
    }

    fn sample_swj_pins(&self) -> SwjPins {
        LogicalSignal::ALL
            .iter()
            .filter_map(|signal| match (signal.swj_pin(), self.read(*signal)) {
                (Some(bit), Ok(Some(true))) => Some(bit),
                _ => None,
            })
            .fold(SwjPins::empty(), |pins, bit| pins | bit)
    }

    /// Whether `signal` is currently an output of the probe.
    pub(crate) fn is_driven(&self, signal: LogicalSignal) -> bool {
        match (self.mode, signal) {
            (OperatingMode::Off, _) => false,
            (_, LogicalSignal::Data) => self.data_output,
            (_, LogicalSignal::Clk | LogicalSignal::Reset) => true,
            (OperatingMode::Jtag, LogicalSignal::Tdi | LogicalSignal::Trst) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::port::NoDeviceReset;
    use crate::signal_map::SignalMap;
    use crate::sim::Transition;
    use crate::testing::*;

    struct CountingDelay(u32);

    impl DelayUs<u32> for CountingDelay {
        fn delay_us(&mut self, us: u32) {
            self.0 += us;
        }
    }

    #[test]
    fn written_levels_read_back() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Jtag).unwrap();
        for signal in [
            LogicalSignal::Clk,
            LogicalSignal::Data,
            LogicalSignal::Tdi,
            LogicalSignal::Trst,
            LogicalSignal::Reset,
        ] {
            port.write(signal, true).unwrap();
            assert_eq!(port.read(signal), Ok(Some(true)), "{signal:?}");
            port.write(signal, false).unwrap();
            assert_eq!(port.read(signal), Ok(Some(false)), "{signal:?}");
        }
    }

    #[test]
    fn tdo_follows_the_target() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Jtag).unwrap();
        port.bank.drive_external(TDO, Some(true));
        assert_eq!(port.read(LogicalSignal::Tdo), Ok(Some(true)));
        port.bank.drive_external(TDO, Some(false));
        assert_eq!(port.read(LogicalSignal::Tdo), Ok(Some(false)));
    }

    #[test]
    fn turnaround_restores_previous_level() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Swd).unwrap();
        port.write(LogicalSignal::Data, false).unwrap();
        port.disable_output(LogicalSignal::Data).unwrap();
        assert_eq!(port.bank().mode(DATA), ElectricalMode::InputFloating);
        port.bank.drive_external(DATA, Some(true));
        assert_eq!(port.read(LogicalSignal::Data), Ok(Some(true)));
        port.bank.drive_external(DATA, None);
        port.enable_output(LogicalSignal::Data).unwrap();
        assert_eq!(port.bank().mode(DATA), ElectricalMode::OutputPushPull);
        assert_eq!(port.bank().line(DATA), Some(false));
        assert_eq!(port.bank().contentions(), 0);
    }

    #[test]
    fn write_while_target_drives_data_is_deferred() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Swd).unwrap();
        port.disable_output(LogicalSignal::Data).unwrap();
        port.bank.drive_external(DATA, Some(false));
        port.write(LogicalSignal::Data, true).unwrap();
        assert_eq!(port.bank().contentions(), 0);
        port.bank.drive_external(DATA, None);
        port.enable_output(LogicalSignal::Data).unwrap();
        assert_eq!(port.bank().line(DATA), Some(true));
    }

    #[test]
    fn turnaround_only_for_data() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Jtag).unwrap();
        for signal in [LogicalSignal::Clk, LogicalSignal::Tdi, LogicalSignal::Reset] {
            assert_eq!(
                port.enable_output(signal),
                Err(DapPortError::NotBidirectional(signal))
            );
            assert_eq!(
                port.disable_output(signal),
                Err(DapPortError::NotBidirectional(signal))
            );
        }
    }

    #[test]
    fn turnaround_cost_fits_budget() {
        let port = jtag_port();
        assert_eq!(port.turnaround_cost(), 2);
        assert_eq!(port.turnaround_cycles(), 2);
        let port = buffered_port();
        assert_eq!(port.turnaround_cost(), 3);
    }

    #[test]
    fn turn_data_uses_line_resolved_at_setup() {
        let mut port = buffered_port();
        port.turn_data(true);
        assert_eq!(port.bank().mode(DATA), ElectricalMode::HighZ);
        assert!(port.bank().transitions().is_empty());

        port.setup(OperatingMode::Swd).unwrap();
        port.bank.clear_transitions();
        port.turn_data(false);
        assert_eq!(
            port.bank().transitions(),
            [
                Transition {
                    pin: DATA_DIR,
                    line: Some(false)
                },
                Transition {
                    pin: DATA,
                    line: None
                },
            ]
        );
        // Already pointing at the target.
        port.turn_data(false);
        assert_eq!(port.bank().transitions().len(), 2);
        port.turn_data(true);
        assert_eq!(port.bank().line(DATA), Some(true));
        assert_eq!(port.bank().line(DATA_DIR), Some(true));

        port.teardown();
        port.bank.clear_transitions();
        port.turn_data(true);
        assert!(port.bank().transitions().is_empty());
    }

    #[test]
    fn unused_pins_stay_released_in_swd() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Swd).unwrap();
        port.write(LogicalSignal::Tdi, false).unwrap();
        port.write(LogicalSignal::Trst, false).unwrap();
        assert_eq!(port.bank().mode(TDI), ElectricalMode::HighZ);
        assert_eq!(port.bank().line(TRST), None);
    }

    #[test]
    fn writes_while_off_do_not_drive() {
        let mut port = jtag_port();
        port.write(LogicalSignal::Clk, false).unwrap();
        assert_eq!(port.bank().line(CLK), None);
        assert!(port.enable_output(LogicalSignal::Data).is_ok());
        assert_eq!(port.bank().mode(DATA), ElectricalMode::HighZ);
    }

    #[test]
    fn missing_led_is_a_noop() {
        let mut port = jtag_port();
        assert_eq!(port.write(LogicalSignal::LedRun, true), Ok(()));
        assert_eq!(port.read(LogicalSignal::LedRun), Ok(None));
        port.led_running(true);
        port.led_connect(true);
        assert_eq!(port.bank().line(LED_CONNECT), Some(true));
        port.led_connect(false);
        assert_eq!(port.bank().line(LED_CONNECT), Some(false));
    }

    #[test]
    fn unmapped_signal_is_reported() {
        let mut port = swd_only_port();
        port.setup_default().unwrap();
        assert_eq!(
            port.write(LogicalSignal::Tdi, true),
            Err(DapPortError::UnsupportedSignal(LogicalSignal::Tdi))
        );
        assert_eq!(
            port.read(LogicalSignal::Tdo),
            Err(DapPortError::UnsupportedSignal(LogicalSignal::Tdo))
        );
    }

    #[test]
    fn device_reset_reports_hook_result() {
        struct PulseReset;
        impl DeviceReset<TestBank> for PulseReset {
            fn device_reset(&mut self, bank: &mut TestBank, map: &SignalMap) -> bool {
                let reset = map.resolve(LogicalSignal::Reset).unwrap();
                bank.set(reset.pin, PinState::Low);
                bank.set(reset.pin, PinState::High);
                true
            }
        }

        let mut port = jtag_port();
        assert!(!port.device_reset());
        let mut port = port.with_device_reset(PulseReset);
        port.setup(OperatingMode::Swd).unwrap();
        assert!(port.device_reset());
        let port = port.with_device_reset(NoDeviceReset);
        assert_eq!(port.mode(), OperatingMode::Swd);
    }

    #[test]
    fn swj_pins_writes_selected_and_reads_all() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Jtag).unwrap();
        port.bank.drive_external(TDO, Some(true));
        let mut delay = CountingDelay(0);
        let pins = port.swj_pins(
            SwjPins::N_RESET,
            SwjPins::N_RESET | SwjPins::TCK_SWDCLK,
            0,
            &mut delay,
        );
        assert_eq!(port.read(LogicalSignal::Clk), Ok(Some(false)));
        assert!(pins.contains(SwjPins::N_RESET));
        assert!(pins.contains(SwjPins::TDO));
        assert!(!pins.contains(SwjPins::TCK_SWDCLK));
        assert_eq!(delay.0, 0);
    }

    #[test]
    fn swj_pins_waits_for_held_reset() {
        let mut port = jtag_port();
        port.setup(OperatingMode::Jtag).unwrap();
        // Target keeps nRESET low, so the release never reads back.
        port.bank.drive_external(RESET, Some(false));
        let mut delay = CountingDelay(0);
        let pins = port.swj_pins(SwjPins::N_RESET, SwjPins::N_RESET, 50, &mut delay);
        assert!(!pins.contains(SwjPins::N_RESET));
        assert_eq!(delay.0, 50);
    }
}
