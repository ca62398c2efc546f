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

//! Operating mode state machine.
//!
//! [`DapPort`] is the single owner of the probe's pins. It moves the pins
//! between the Off, JTAG and SWD configurations and is the only way the
//! protocol engine reaches the hardware.

use crate::bank::PinBank;
use crate::config::DapConfig;
use crate::error::{ConfigError, DapPortError};
use crate::signal::{
    ElectricalMode, LogicalSignal, OperatingMode, PinDescriptor, PinId, Polarity, Port,
};
use crate::signal_map::SignalMap;
use embedded_hal::digital::v2::PinState;

/// Signals driven in JTAG mode, in the order they are brought up.
const JTAG_OUTPUTS: [LogicalSignal; 5] = [
    LogicalSignal::Clk,
    LogicalSignal::Data,
    LogicalSignal::Reset,
    LogicalSignal::Trst,
    LogicalSignal::Tdi,
];
const SWD_OUTPUTS: [LogicalSignal; 3] = [
    LogicalSignal::Clk,
    LogicalSignal::Data,
    LogicalSignal::Reset,
];
/// Pins SWD leaves alone so targets wired differently see no driver.
const SWD_UNUSED: [LogicalSignal; 3] = [
    LogicalSignal::Tdi,
    LogicalSignal::Tdo,
    LogicalSignal::Trst,
];

/// Board or target specific reset sequence, run by DAP_ResetTarget.
pub trait DeviceReset<B: PinBank> {
    /// Returns `true` when a custom sequence was executed. The protocol engine
    /// toggles nRESET itself otherwise.
    fn device_reset(&mut self, bank: &mut B, map: &SignalMap) -> bool;
}

/// No device specific reset sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDeviceReset;

impl<B: PinBank> DeviceReset<B> for NoDeviceReset {
    fn device_reset(&mut self, _bank: &mut B, _map: &SignalMap) -> bool {
        false
    }
}

/// Data line as the turnaround fast path sees it, resolved when a transport
/// is set up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DataLine {
    pub(crate) pin: PinId,
    pub(crate) buffer: Option<PinId>,
    pub(crate) polarity: Polarity,
}

impl From<&PinDescriptor> for DataLine {
    fn from(desc: &PinDescriptor) -> Self {
        Self {
            pin: desc.pin,
            buffer: desc.buffer,
            polarity: desc.polarity,
        }
    }
}

/// Debug port of the probe: the pin bank, its signal map and the current
/// operating mode.
pub struct DapPort<B: PinBank, R: DeviceReset<B> = NoDeviceReset> {
    pub(crate) bank: B,
    pub(crate) map: SignalMap,
    pub(crate) config: DapConfig,
    pub(crate) mode: OperatingMode,
    /// Last logical value written per signal.
    pub(crate) levels: [bool; LogicalSignal::COUNT],
    /// Probe currently drives the data line.
    pub(crate) data_output: bool,
    /// Set while JTAG or SWD is active and the board has a data line.
    pub(crate) turnaround: Option<DataLine>,
    pub(crate) reset: R,
}

impl<B: PinBank> DapPort<B> {
    /// Takes ownership of the pins and puts them into their power-on state,
    /// see [`DapPort::init`].
    ///
    /// Fails with [`ConfigError::TurnaroundBudget`] when the configured
    /// turnaround budget is below [`DapPort::turnaround_cost`]; the bank is
    /// not touched in that case.
    pub fn new(bank: B, map: SignalMap, config: DapConfig) -> Result<Self, ConfigError> {
        let mut levels = [false; LogicalSignal::COUNT];
        for (signal, desc) in map.iter() {
            levels[signal.index()] = desc.idle;
        }
        let mut port = Self {
            bank,
            map,
            config,
            mode: OperatingMode::Off,
            levels,
            data_output: false,
            turnaround: None,
            reset: NoDeviceReset,
        };
        let required = port.turnaround_cost();
        if config.turnaround_cycles() < required {
            return Err(ConfigError::TurnaroundBudget {
                budget: config.turnaround_cycles(),
                required,
            });
        }
        port.init();
        Ok(port)
    }
}

impl<B: PinBank, R: DeviceReset<B>> DapPort<B, R> {
    /// Installs a device specific reset sequence.
    pub fn with_device_reset<R2: DeviceReset<B>>(self, reset: R2) -> DapPort<B, R2> {
        DapPort {
            bank: self.bank,
            map: self.map,
            config: self.config,
            mode: self.mode,
            levels: self.levels,
            data_output: self.data_output,
            turnaround: self.turnaround,
            reset,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn config(&self) -> &DapConfig {
        &self.config
    }

    pub fn signal_map(&self) -> &SignalMap {
        &self.map
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Documented cycle budget of one data-line turnaround.
    pub fn turnaround_cycles(&self) -> u32 {
        self.config.turnaround_cycles()
    }

    /// Cycles one [`DapPort::turn_data`] costs on this bank and wiring: the
    /// bank's dispatch overhead, the pin reconfiguration and, on buffered
    /// boards, the direction store.
    pub fn turnaround_cost(&self) -> u32 {
        let buffer = match self.map.get(LogicalSignal::Data) {
            Some(desc) if desc.buffer.is_some() => B::WRITE_CYCLES,
            _ => 0,
        };
        B::DISPATCH_CYCLES + B::TURNAROUND_CYCLES + buffer
    }

    /// Puts every pin into its power-on state: buffers pointing at the probe,
    /// LEDs off, debug pins released. An active transport is torn down first.
    pub fn init(&mut self) {
        self.teardown();
        for (signal, desc) in self.map.iter() {
            if let Some(buffer) = desc.buffer {
                self.bank
                    .configure(buffer, ElectricalMode::OutputPushPull, PinState::Low);
            }
            if signal.is_led() {
                self.bank
                    .configure(desc.pin, ElectricalMode::OutputPushPull, desc.idle_level());
            } else {
                self.bank
                    .configure(desc.pin, ElectricalMode::HighZ, desc.idle_level());
            }
            self.levels[signal.index()] = desc.idle;
        }
        self.mode = OperatingMode::Off;
        self.data_output = false;
        self.turnaround = None;
        debug!("port initialized");
    }

    /// Switches to `target`. Changing between JTAG and SWD requires a teardown.
    pub fn setup(&mut self, target: OperatingMode) -> Result<(), DapPortError> {
        match (self.mode, target) {
            (current, target) if current == target => Ok(()),
            (_, OperatingMode::Off) => {
                self.teardown();
                Ok(())
            }
            (OperatingMode::Off, target) => {
                if !self.config.supports(target) {
                    warn!("transport {} not available", target);
                    return Err(DapPortError::TransportUnavailable(target));
                }
                match target {
                    OperatingMode::Jtag => self.enter_jtag(),
                    _ => self.enter_swd(),
                }
                self.turnaround = self.map.get(LogicalSignal::Data).map(DataLine::from);
                self.mode = target;
                debug!("port mode {}", target);
                Ok(())
            }
            (from, to) => {
                warn!("rejected transition {} -> {}", from, to);
                Err(DapPortError::InvalidTransition { from, to })
            }
        }
    }

    /// Switches to the configured default transport.
    pub fn setup_default(&mut self) -> Result<(), DapPortError> {
        self.setup(self.config.default_mode())
    }

    /// Handles the port byte of DAP_Connect and returns the mode now active.
    pub fn connect(&mut self, port: Port) -> Result<OperatingMode, DapPortError> {
        let target = match port {
            Port::Default => self.config.default_mode(),
            Port::Swd => OperatingMode::Swd,
            Port::Jtag => OperatingMode::Jtag,
        };
        self.setup(target)?;
        Ok(target)
    }

    /// Releases every debug pin. Calling it while already Off does nothing.
    ///
    /// Lines the probe drives go to their idle level before they float;
    /// lines the mode left alone are floated without being driven.
    pub fn teardown(&mut self) {
        if self.mode == OperatingMode::Off {
            return;
        }
        for signal in LogicalSignal::ALL {
            if signal.is_led() {
                continue;
            }
            if let Some(desc) = self.map.get(signal).copied() {
                let driven = self.is_driven(signal);
                self.park(&desc, driven);
            }
        }
        debug!("port mode {} -> Off", self.mode);
        self.mode = OperatingMode::Off;
        self.data_output = false;
        self.turnaround = None;
    }

    /// Tears down and hands the pins back.
    pub fn release(mut self) -> B {
        self.teardown();
        self.bank
    }

    fn enter_jtag(&mut self) {
        for signal in JTAG_OUTPUTS {
            self.engage_output(signal);
        }
        if let Some(tdo) = self.map.get(LogicalSignal::Tdo).copied() {
            if let Some(buffer) = tdo.buffer {
                self.bank.set(buffer, PinState::Low);
            }
            self.bank
                .configure(tdo.pin, ElectricalMode::InputFloating, tdo.idle_level());
        }
        self.data_output = true;
    }

    fn enter_swd(&mut self) {
        for signal in SWD_OUTPUTS {
            self.engage_output(signal);
        }
        for signal in SWD_UNUSED {
            if let Some(desc) = self.map.get(signal).copied() {
                if let Some(buffer) = desc.buffer {
                    self.bank.set(buffer, PinState::Low);
                }
                self.bank
                    .configure(desc.pin, ElectricalMode::HighZ, desc.idle_level());
            }
        }
        self.data_output = true;
    }

    /// Drives `signal` at its idle level, then opens its buffer.
    fn engage_output(&mut self, signal: LogicalSignal) {
        let Some(desc) = self.map.get(signal).copied() else {
            return;
        };
        self.levels[signal.index()] = desc.idle;
        let level = desc.idle_level();
        match desc.mode {
            ElectricalMode::OutputOpenDrainPullUp if !self.bank.native_open_drain() => {
                self.emulate_open_drain(&desc, level)
            }
            ElectricalMode::OutputOpenDrainPullUp => {
                self.bank
                    .configure(desc.pin, ElectricalMode::OutputOpenDrainPullUp, level)
            }
            _ => self
                .bank
                .configure(desc.pin, ElectricalMode::OutputPushPull, level),
        }
        if let Some(buffer) = desc.buffer {
            self.bank.set(buffer, PinState::High);
        }
        trace!("{} driven", signal);
    }

    /// Drives the idle level, closes the buffer and only then floats the pin.
    fn park(&mut self, desc: &PinDescriptor, driven: bool) {
        let level = desc.idle_level();
        if driven && desc.mode.is_output() {
            self.drive(desc, level);
        }
        if let Some(buffer) = desc.buffer {
            self.bank.set(buffer, PinState::Low);
        }
        self.bank.configure(desc.pin, ElectricalMode::HighZ, level);
    }

    /// Changes the line level of an engaged output.
    #[inline(always)]
    pub(crate) fn drive(&mut self, desc: &PinDescriptor, level: PinState) {
        if desc.mode == ElectricalMode::OutputOpenDrainPullUp && !self.bank.native_open_drain() {
            self.emulate_open_drain(desc, level);
        } else {
            self.bank.set(desc.pin, level);
        }
    }

    /// Open-drain on hardware without it: pull low actively, release as a
    /// pulled-up input.
    fn emulate_open_drain(&mut self, desc: &PinDescriptor, level: PinState) {
        match level {
            PinState::Low => {
                self.bank
                    .configure(desc.pin, ElectricalMode::OutputPushPull, PinState::Low)
            }
            PinState::High => {
                self.bank
                    .configure(desc.pin, ElectricalMode::InputPullUp, PinState::High)
            }
        }
    }
}
