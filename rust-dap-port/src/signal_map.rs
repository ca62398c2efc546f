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

use crate::config::DapConfig;
use crate::error::{ConfigError, DapPortError};
use crate::signal::{ElectricalMode, LogicalSignal, OperatingMode, PinDescriptor, PinId};

/// Fixed lookup from logical signal to its physical pin.
///
/// Built once at startup and never mutated afterwards. Signals excluded by
/// the configuration are simply absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMap {
    entries: [Option<PinDescriptor>; LogicalSignal::COUNT],
}

impl SignalMap {
    pub fn builder() -> SignalMapBuilder {
        SignalMapBuilder::new()
    }

    #[inline(always)]
    pub fn resolve(&self, signal: LogicalSignal) -> Result<PinDescriptor, DapPortError> {
        self.entries[signal.index()].ok_or(DapPortError::UnsupportedSignal(signal))
    }

    #[inline(always)]
    pub fn get(&self, signal: LogicalSignal) -> Option<&PinDescriptor> {
        self.entries[signal.index()].as_ref()
    }

    pub fn contains(&self, signal: LogicalSignal) -> bool {
        self.entries[signal.index()].is_some()
    }

    /// Mapped signals in discriminant order.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalSignal, &PinDescriptor)> + '_ {
        LogicalSignal::ALL
            .iter()
            .zip(self.entries.iter())
            .filter_map(|(signal, entry)| entry.as_ref().map(|desc| (*signal, desc)))
    }

    /// Mapped debug signals, i.e. everything but the LEDs.
    pub fn debug_signals(&self) -> impl Iterator<Item = (LogicalSignal, &PinDescriptor)> + '_ {
        self.iter().filter(|(signal, _)| !signal.is_led())
    }
}

#[derive(Debug, Clone)]
pub struct SignalMapBuilder {
    entries: [Option<PinDescriptor>; LogicalSignal::COUNT],
    duplicate: Option<LogicalSignal>,
}

impl Default for SignalMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalMapBuilder {
    pub const fn new() -> Self {
        Self {
            entries: [None; LogicalSignal::COUNT],
            duplicate: None,
        }
    }

    pub fn bind(mut self, signal: LogicalSignal, descriptor: PinDescriptor) -> Self {
        let entry = &mut self.entries[signal.index()];
        if entry.is_some() && self.duplicate.is_none() {
            self.duplicate = Some(signal);
        }
        *entry = Some(descriptor);
        self
    }

    /// Validates the table against `config` and drops signals of transports
    /// that are not compiled in.
    pub fn build(self, config: &DapConfig) -> Result<SignalMap, ConfigError> {
        if let Some(signal) = self.duplicate {
            return Err(ConfigError::DuplicateSignal(signal));
        }

        let mut entries = self.entries;
        if !config.supports(OperatingMode::Jtag) {
            for signal in LogicalSignal::ALL {
                if signal.is_jtag_only() {
                    entries[signal.index()] = None;
                }
            }
        }

        for signal in LogicalSignal::ALL {
            if let Some(desc) = &entries[signal.index()] {
                if signal.is_reset_line() && desc.mode != ElectricalMode::OutputOpenDrainPullUp {
                    return Err(ConfigError::ResetNotOpenDrain(signal));
                }
            }
        }

        // Every signal pin and buffer direction pin must be distinct.
        let mut used: [(Option<PinId>, Option<PinId>); LogicalSignal::COUNT] =
            [(None, None); LogicalSignal::COUNT];
        for signal in LogicalSignal::ALL {
            let Some(desc) = &entries[signal.index()] else {
                continue;
            };
            if desc.buffer == Some(desc.pin) {
                return Err(ConfigError::PinConflict {
                    first: signal,
                    second: signal,
                });
            }
            for other in LogicalSignal::ALL.iter().take(signal.index()) {
                let (pin, buffer) = used[other.index()];
                let clash = [Some(desc.pin), desc.buffer]
                    .iter()
                    .flatten()
                    .any(|candidate| Some(*candidate) == pin || Some(*candidate) == buffer);
                if clash {
                    return Err(ConfigError::PinConflict {
                        first: *other,
                        second: signal,
                    });
                }
            }
            used[signal.index()] = (Some(desc.pin), desc.buffer);
        }

        Ok(SignalMap { entries })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Transports;
    use crate::signal::Port;

    fn full_builder() -> SignalMapBuilder {
        SignalMap::builder()
            .bind(LogicalSignal::Clk, PinDescriptor::output(PinId::new(0, 0)).fast())
            .bind(LogicalSignal::Data, PinDescriptor::output(PinId::new(0, 1)).fast())
            .bind(LogicalSignal::Tdi, PinDescriptor::output(PinId::new(0, 2)))
            .bind(LogicalSignal::Tdo, PinDescriptor::input(PinId::new(0, 3)))
            .bind(LogicalSignal::Trst, PinDescriptor::open_drain(PinId::new(0, 4)))
            .bind(LogicalSignal::Reset, PinDescriptor::open_drain(PinId::new(0, 5)))
            .bind(LogicalSignal::LedConnect, PinDescriptor::led(PinId::new(1, 0)))
    }

    #[test]
    fn resolve_returns_bound_descriptor() {
        let map = full_builder().build(&DapConfig::default()).unwrap();
        let data = map.resolve(LogicalSignal::Data).unwrap();
        assert_eq!(data.pin, PinId::new(0, 1));
        assert!(data.fast_toggle);
        assert_eq!(
            map.resolve(LogicalSignal::LedRun),
            Err(DapPortError::UnsupportedSignal(LogicalSignal::LedRun))
        );
        assert_eq!(map.iter().count(), 7);
        assert_eq!(map.debug_signals().count(), 6);
    }

    #[test]
    fn swd_only_build_drops_jtag_signals() {
        let config = DapConfig::builder()
            .transports(Transports::SWD)
            .default_port(Port::Swd)
            .build()
            .unwrap();
        let map = full_builder().build(&config).unwrap();
        assert_eq!(
            map.resolve(LogicalSignal::Tdi),
            Err(DapPortError::UnsupportedSignal(LogicalSignal::Tdi))
        );
        assert!(!map.contains(LogicalSignal::Tdo));
        assert!(!map.contains(LogicalSignal::Trst));
        assert!(map.contains(LogicalSignal::Reset));
    }

    #[test]
    fn shared_pin_is_rejected() {
        let result = full_builder()
            .bind(LogicalSignal::LedRun, PinDescriptor::led(PinId::new(0, 2)))
            .build(&DapConfig::default());
        assert_eq!(
            result,
            Err(ConfigError::PinConflict {
                first: LogicalSignal::Tdi,
                second: LogicalSignal::LedRun
            })
        );
    }

    #[test]
    fn buffer_pin_cannot_alias_a_signal() {
        let result = SignalMap::builder()
            .bind(LogicalSignal::Clk, PinDescriptor::output(PinId::new(0, 0)))
            .bind(
                LogicalSignal::Data,
                PinDescriptor::output(PinId::new(0, 1)).with_buffer(PinId::new(0, 0)),
            )
            .build(&DapConfig::default());
        assert_eq!(
            result,
            Err(ConfigError::PinConflict {
                first: LogicalSignal::Clk,
                second: LogicalSignal::Data
            })
        );
    }

    #[test]
    fn reset_must_be_open_drain() {
        let result = SignalMap::builder()
            .bind(LogicalSignal::Reset, PinDescriptor::output(PinId::new(0, 5)))
            .build(&DapConfig::default());
        assert_eq!(result, Err(ConfigError::ResetNotOpenDrain(LogicalSignal::Reset)));
    }

    #[test]
    fn double_binding_is_rejected() {
        let result = full_builder()
            .bind(LogicalSignal::Clk, PinDescriptor::output(PinId::new(2, 0)))
            .build(&DapConfig::default());
        assert_eq!(result, Err(ConfigError::DuplicateSignal(LogicalSignal::Clk)));
    }
}
