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

//! Build-time probe configuration.
//!
//! Everything here is plain data that is validated once, when the firmware
//! assembles its [`DapConfig`]. Nothing is checked again at pin-operation time.

use crate::error::ConfigError;
use crate::signal::{OperatingMode, Port};
use bitflags::bitflags;

/// Extra wait cycles of one slow-clock delay loop iteration.
pub const DELAY_SLOW_CYCLES: u32 = 3;
/// Wait cycles of the fast (no delay loop) clock path.
pub const DELAY_FAST_CYCLES: u32 = 0;

const MAX_WRITE_CYCLES: u32 = 16;
const MIN_PACKET_SIZE: u32 = 64;
const MAX_PACKET_SIZE: u32 = 1024;

bitflags! {
    /// Debug transports compiled into the probe. Bit values follow DAP_Info capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Transports: u8 {
        const SWD = 0b0000_0001;
        const JTAG = 0b0000_0010;
    }
}

/// Identity of the target device on evaluation boards with a fixed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetDevice {
    pub vendor: &'static str,
    pub name: &'static str,
}

/// Clock generation parameters derived from a requested SWJ frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockTiming {
    /// Toggle without a delay loop.
    pub fast: bool,
    /// Delay loop iterations per half clock period.
    pub delay_cycles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DapConfig {
    cpu_clock_hz: u32,
    io_port_write_cycles: u32,
    turnaround_cycles: u32,
    transports: Transports,
    jtag_device_count: u8,
    default_port: Port,
    default_swj_clock_hz: u32,
    packet_size: u16,
    packet_count: u8,
    target_device: Option<TargetDevice>,
}

impl DapConfig {
    pub fn builder() -> DapConfigBuilder {
        DapConfigBuilder::new()
    }

    pub fn cpu_clock_hz(&self) -> u32 {
        self.cpu_clock_hz
    }

    pub fn io_port_write_cycles(&self) -> u32 {
        self.io_port_write_cycles
    }

    /// Cycle budget of one `enable_output`/`disable_output` call on the data line.
    pub fn turnaround_cycles(&self) -> u32 {
        self.turnaround_cycles
    }

    pub fn transports(&self) -> Transports {
        self.transports
    }

    pub fn supports(&self, mode: OperatingMode) -> bool {
        match mode {
            OperatingMode::Off => true,
            OperatingMode::Jtag => self.transports.contains(Transports::JTAG),
            OperatingMode::Swd => self.transports.contains(Transports::SWD),
        }
    }

    pub fn jtag_device_count(&self) -> u8 {
        self.jtag_device_count
    }

    /// Always `Port::Swd` or `Port::Jtag`.
    pub fn default_port(&self) -> Port {
        self.default_port
    }

    pub fn default_mode(&self) -> OperatingMode {
        match self.default_port {
            Port::Jtag => OperatingMode::Jtag,
            _ => OperatingMode::Swd,
        }
    }

    pub fn default_swj_clock_hz(&self) -> u32 {
        self.default_swj_clock_hz
    }

    pub fn packet_size(&self) -> u16 {
        self.packet_size
    }

    pub fn packet_count(&self) -> u8 {
        self.packet_count
    }

    pub fn target_device(&self) -> Option<TargetDevice> {
        self.target_device
    }

    /// Highest SWJ clock reachable when each half period spends `delay_cycles`
    /// on top of the port write.
    pub fn max_swj_clock_hz(&self, delay_cycles: u32) -> u32 {
        (self.cpu_clock_hz / 2) / (self.io_port_write_cycles + delay_cycles)
    }

    /// Calculates the delay loop setting that produces at most `frequency_hz`.
    pub fn clock_timing(&self, frequency_hz: u32) -> Option<ClockTiming> {
        if frequency_hz == 0 {
            return None;
        }
        if frequency_hz >= self.max_swj_clock_hz(DELAY_FAST_CYCLES) {
            return Some(ClockTiming {
                fast: true,
                delay_cycles: 1,
            });
        }
        let half_period = (self.cpu_clock_hz / 2).div_ceil(frequency_hz);
        let delay_cycles = if half_period > self.io_port_write_cycles {
            (half_period - self.io_port_write_cycles).div_ceil(DELAY_SLOW_CYCLES)
        } else {
            1
        };
        Some(ClockTiming {
            fast: false,
            delay_cycles,
        })
    }

    /// Fastest clock that leaves a whole half period for one data-line turnaround.
    ///
    /// The figure is only as good as `turnaround_cycles`: a budget below the
    /// real cost of the bank overstates it, and the transfer engine then samples
    /// SWDIO before the probe has let go of it.
    pub fn max_turnaround_clock_hz(&self) -> u32 {
        self.cpu_clock_hz / (2 * self.turnaround_cycles)
    }
}

impl Default for DapConfig {
    fn default() -> Self {
        // The builder defaults always validate.
        let builder = DapConfigBuilder::new();
        Self {
            cpu_clock_hz: builder.cpu_clock_hz,
            io_port_write_cycles: builder.io_port_write_cycles,
            turnaround_cycles: builder.io_port_write_cycles,
            transports: builder.transports,
            jtag_device_count: builder.jtag_device_count as u8,
            default_port: builder.default_port,
            default_swj_clock_hz: builder.default_swj_clock_hz,
            packet_size: builder.packet_size as u16,
            packet_count: builder.packet_count as u8,
            target_device: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DapConfigBuilder {
    cpu_clock_hz: u32,
    io_port_write_cycles: u32,
    turnaround_cycles: Option<u32>,
    transports: Transports,
    jtag_device_count: u32,
    default_port: Port,
    default_swj_clock_hz: u32,
    packet_size: u32,
    packet_count: u32,
    target_device: Option<TargetDevice>,
}

impl Default for DapConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DapConfigBuilder {
    pub const fn new() -> Self {
        Self {
            cpu_clock_hz: 72_000_000,
            io_port_write_cycles: 2,
            turnaround_cycles: None,
            transports: Transports::all(),
            jtag_device_count: 1,
            default_port: Port::Jtag,
            default_swj_clock_hz: 1_000_000,
            packet_size: 64,
            packet_count: 32,
            target_device: None,
        }
    }

    pub const fn cpu_clock_hz(mut self, hz: u32) -> Self {
        self.cpu_clock_hz = hz;
        self
    }

    pub const fn io_port_write_cycles(mut self, cycles: u32) -> Self {
        self.io_port_write_cycles = cycles;
        self
    }

    /// Overrides the turnaround budget, which defaults to the port write cost.
    pub const fn turnaround_cycles(mut self, cycles: u32) -> Self {
        self.turnaround_cycles = Some(cycles);
        self
    }

    pub const fn transports(mut self, transports: Transports) -> Self {
        self.transports = transports;
        self
    }

    pub const fn jtag_device_count(mut self, count: u32) -> Self {
        self.jtag_device_count = count;
        self
    }

    pub const fn default_port(mut self, port: Port) -> Self {
        self.default_port = port;
        self
    }

    pub const fn default_swj_clock_hz(mut self, hz: u32) -> Self {
        self.default_swj_clock_hz = hz;
        self
    }

    pub const fn packet_size(mut self, size: u32) -> Self {
        self.packet_size = size;
        self
    }

    pub const fn packet_count(mut self, count: u32) -> Self {
        self.packet_count = count;
        self
    }

    pub const fn target_device(mut self, vendor: &'static str, name: &'static str) -> Self {
        self.target_device = Some(TargetDevice { vendor, name });
        self
    }

    pub fn build(self) -> Result<DapConfig, ConfigError> {
        if self.cpu_clock_hz == 0 {
            return Err(ConfigError::CpuClock);
        }
        if !(1..=MAX_WRITE_CYCLES).contains(&self.io_port_write_cycles) {
            return Err(ConfigError::WriteCycles(self.io_port_write_cycles));
        }
        let turnaround_cycles = self.turnaround_cycles.unwrap_or(self.io_port_write_cycles);
        if turnaround_cycles == 0 {
            return Err(ConfigError::TurnaroundBudget {
                budget: 0,
                required: 1,
            });
        }
        if self.transports.is_empty() {
            return Err(ConfigError::NoTransport);
        }
        let jtag_device_count = u8::try_from(self.jtag_device_count)
            .ok()
            .filter(|count| *count != 0)
            .ok_or(ConfigError::DeviceCount(self.jtag_device_count))?;
        let default_available = match self.default_port {
            Port::Swd => self.transports.contains(Transports::SWD),
            Port::Jtag => self.transports.contains(Transports::JTAG),
            Port::Default => false,
        };
        if !default_available {
            return Err(ConfigError::DefaultPort(self.default_port));
        }
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&self.packet_size) {
            return Err(ConfigError::PacketSize(self.packet_size));
        }
        let packet_count = u8::try_from(self.packet_count)
            .ok()
            .filter(|count| *count != 0)
            .ok_or(ConfigError::PacketCount(self.packet_count))?;
        if let Some(device) = self.target_device {
            if device.vendor.is_empty() || device.name.is_empty() {
                return Err(ConfigError::TargetDevice);
            }
        }

        let config = DapConfig {
            cpu_clock_hz: self.cpu_clock_hz,
            io_port_write_cycles: self.io_port_write_cycles,
            turnaround_cycles,
            transports: self.transports,
            jtag_device_count,
            default_port: self.default_port,
            default_swj_clock_hz: self.default_swj_clock_hz,
            packet_size: self.packet_size as u16,
            packet_count,
            target_device: self.target_device,
        };
        if self.default_swj_clock_hz == 0
            || self.default_swj_clock_hz > config.max_swj_clock_hz(DELAY_FAST_CYCLES)
        {
            return Err(ConfigError::DefaultClock(self.default_swj_clock_hz));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_match_tinyice_header() {
        let config = DapConfig::builder().build().unwrap();
        assert_eq!(config, DapConfig::default());
        assert_eq!(config.cpu_clock_hz(), 72_000_000);
        assert_eq!(config.turnaround_cycles(), 2);
        assert_eq!(config.default_mode(), OperatingMode::Jtag);
        assert_eq!(config.jtag_device_count(), 1);
        assert_eq!(config.packet_size(), 64);
        assert_eq!(config.packet_count(), 32);
        assert!(config.target_device().is_none());
    }

    #[test]
    fn zero_device_count_is_rejected() {
        assert_eq!(
            DapConfig::builder().jtag_device_count(0).build(),
            Err(ConfigError::DeviceCount(0))
        );
        assert_eq!(
            DapConfig::builder().jtag_device_count(256).build(),
            Err(ConfigError::DeviceCount(256))
        );
        assert!(DapConfig::builder().jtag_device_count(255).build().is_ok());
    }

    #[test]
    fn default_port_must_be_compiled_in() {
        assert_eq!(
            DapConfig::builder()
                .transports(Transports::SWD)
                .default_port(Port::Jtag)
                .build(),
            Err(ConfigError::DefaultPort(Port::Jtag))
        );
        assert_eq!(
            DapConfig::builder().default_port(Port::Default).build(),
            Err(ConfigError::DefaultPort(Port::Default))
        );
        let swd_only = DapConfig::builder()
            .transports(Transports::SWD)
            .default_port(Port::Swd)
            .build()
            .unwrap();
        assert!(swd_only.supports(OperatingMode::Swd));
        assert!(!swd_only.supports(OperatingMode::Jtag));
        assert_eq!(swd_only.default_mode(), OperatingMode::Swd);
    }

    #[test]
    fn out_of_range_constants_are_rejected() {
        assert_eq!(
            DapConfig::builder().cpu_clock_hz(0).build(),
            Err(ConfigError::CpuClock)
        );
        assert_eq!(
            DapConfig::builder().io_port_write_cycles(0).build(),
            Err(ConfigError::WriteCycles(0))
        );
        assert_eq!(
            DapConfig::builder().transports(Transports::empty()).build(),
            Err(ConfigError::NoTransport)
        );
        assert_eq!(
            DapConfig::builder().packet_size(32).build(),
            Err(ConfigError::PacketSize(32))
        );
        assert_eq!(
            DapConfig::builder().packet_count(0).build(),
            Err(ConfigError::PacketCount(0))
        );
        assert_eq!(
            DapConfig::builder().default_swj_clock_hz(0).build(),
            Err(ConfigError::DefaultClock(0))
        );
        assert_eq!(
            DapConfig::builder().default_swj_clock_hz(40_000_000).build(),
            Err(ConfigError::DefaultClock(40_000_000))
        );
        assert_eq!(
            DapConfig::builder().target_device("", "STM32F103").build(),
            Err(ConfigError::TargetDevice)
        );
        assert_eq!(
            DapConfig::builder().turnaround_cycles(0).build(),
            Err(ConfigError::TurnaroundBudget {
                budget: 0,
                required: 1
            })
        );
    }

    #[test]
    fn clock_timing_follows_write_cost() {
        let config = DapConfig::default();
        // 36 MHz half-rate clock, 2 cycles per write.
        assert_eq!(config.max_swj_clock_hz(DELAY_FAST_CYCLES), 18_000_000);
        assert_eq!(
            config.clock_timing(18_000_000),
            Some(ClockTiming {
                fast: true,
                delay_cycles: 1
            })
        );
        // 36 cycles per half period, minus 2 for the write, over 3 per loop.
        assert_eq!(
            config.clock_timing(1_000_000),
            Some(ClockTiming {
                fast: false,
                delay_cycles: 12
            })
        );
        assert_eq!(config.clock_timing(0), None);
        assert_eq!(config.max_turnaround_clock_hz(), 18_000_000);
    }

    proptest! {
        #[test]
        fn device_count_accepted_only_in_range(count in 0u32..1024) {
            let result = DapConfig::builder().jtag_device_count(count).build();
            prop_assert_eq!(result.is_ok(), (1..=255).contains(&count));
        }

        #[test]
        fn slower_clocks_never_need_shorter_delays(a in 1u32..18_000_000, b in 1u32..18_000_000) {
            let config = DapConfig::default();
            let (slow, fast) = if a <= b { (a, b) } else { (b, a) };
            let slow = config.clock_timing(slow).unwrap();
            let fast = config.clock_timing(fast).unwrap();
            prop_assert!(slow.delay_cycles >= fast.delay_cycles || fast.fast);
        }
    }
}
