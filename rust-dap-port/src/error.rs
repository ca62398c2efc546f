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

use crate::signal::{LogicalSignal, OperatingMode, Port};
use thiserror::Error;

/// Errors reported while pins are being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DapPortError {
    /// The signal is not wired in this build configuration.
    #[error("signal {0:?} is not available in this configuration")]
    UnsupportedSignal(LogicalSignal),
    /// JTAG and SWD must be separated by a teardown.
    #[error("cannot switch from {from:?} to {to:?} without a teardown")]
    InvalidTransition {
        from: OperatingMode,
        to: OperatingMode,
    },
    /// Direction turnaround is only defined for the data line.
    #[error("signal {0:?} is not bidirectional")]
    NotBidirectional(LogicalSignal),
    /// The requested transport was excluded from this build.
    #[error("transport {0:?} is not available in this configuration")]
    TransportUnavailable(OperatingMode),
}

/// Errors found while the configuration or the pin table is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("CPU clock must be non-zero")]
    CpuClock,
    #[error("I/O port write cycles {0} out of range 1..=16")]
    WriteCycles(u32),
    #[error("turnaround budget of {budget} cycles is below the {required} cycles the pin bank needs")]
    TurnaroundBudget { budget: u32, required: u32 },
    #[error("no debug transport enabled")]
    NoTransport,
    #[error("JTAG device count {0} out of range 1..=255")]
    DeviceCount(u32),
    #[error("default port {0:?} is not an enabled transport")]
    DefaultPort(Port),
    #[error("default SWJ clock {0} Hz is not achievable")]
    DefaultClock(u32),
    #[error("packet size {0} out of range 64..=1024")]
    PacketSize(u32),
    #[error("packet count {0} out of range 1..=255")]
    PacketCount(u32),
    #[error("target device vendor and name must not be empty")]
    TargetDevice,
    #[error("signals {first:?} and {second:?} share a pin")]
    PinConflict {
        first: LogicalSignal,
        second: LogicalSignal,
    },
    #[error("reset signal {0:?} must be open-drain with pull-up")]
    ResetNotOpenDrain(LogicalSignal),
    #[error("signal {0:?} is bound twice")]
    DuplicateSignal(LogicalSignal),
}
