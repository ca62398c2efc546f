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

use bitflags::bitflags;
use embedded_hal::digital::v2::PinState;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Debug signals exposed to the protocol engine.
///
/// `Clk` is SWCLK/TCK and `Data` is SWDIO/TMS; both are shared by the two
/// transports. `Trst` and `Reset` carry the line level of nTRST/nRESET, so
/// writing `false` asserts the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LogicalSignal {
    Clk = 0,
    Data = 1,
    Tdi = 2,
    Tdo = 3,
    Trst = 4,
    Reset = 5,
    LedConnect = 6,
    LedRun = 7,
}

impl LogicalSignal {
    pub const COUNT: usize = 8;
    pub const ALL: [LogicalSignal; Self::COUNT] = [
        LogicalSignal::Clk,
        LogicalSignal::Data,
        LogicalSignal::Tdi,
        LogicalSignal::Tdo,
        LogicalSignal::Trst,
        LogicalSignal::Reset,
        LogicalSignal::LedConnect,
        LogicalSignal::LedRun,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_led(self) -> bool {
        matches!(self, LogicalSignal::LedConnect | LogicalSignal::LedRun)
    }

    /// Signals that only exist on a JTAG-capable probe.
    pub const fn is_jtag_only(self) -> bool {
        matches!(
            self,
            LogicalSignal::Tdi | LogicalSignal::Tdo | LogicalSignal::Trst
        )
    }

    /// Reset lines must look open-drain from the outside.
    pub const fn is_reset_line(self) -> bool {
        matches!(self, LogicalSignal::Trst | LogicalSignal::Reset)
    }

    /// Bit used for this signal in DAP_SWJ_Pins requests.
    pub const fn swj_pin(self) -> Option<SwjPins> {
        match self {
            LogicalSignal::Clk => Some(SwjPins::TCK_SWDCLK),
            LogicalSignal::Data => Some(SwjPins::TMS_SWDIO),
            LogicalSignal::Tdi => Some(SwjPins::TDI),
            LogicalSignal::Tdo => Some(SwjPins::TDO),
            LogicalSignal::Trst => Some(SwjPins::N_TRST),
            LogicalSignal::Reset => Some(SwjPins::N_RESET),
            LogicalSignal::LedConnect | LogicalSignal::LedRun => None,
        }
    }
}

// Bit 0: SWCLK/TCK
// Bit 1: SWDIO/TMS
// Bit 2: TDI
// Bit 3: TDO
// Bit 5: nTRST
// Bit 7: nRESET
// https://arm-software.github.io/CMSIS_5/DAP/html/group__DAP__SWJ__Pins.html
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwjPins: u8 {
        const TCK_SWDCLK = 1;
        const TMS_SWDIO = 1 << 1;
        const TDI = 1 << 2;
        const TDO = 1 << 3;
        const N_TRST = 1 << 5;
        const N_RESET = 1 << 7;
    }
}

/// Physical pin: GPIO port (bank) and bit index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: u8,
    pub index: u8,
}

impl PinId {
    pub const fn new(port: u8, index: u8) -> Self {
        Self { port, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElectricalMode {
    OutputPushPull,
    InputFloating,
    InputPullUp,
    OutputOpenDrainPullUp,
    HighZ,
}

impl ElectricalMode {
    pub const fn is_output(self) -> bool {
        matches!(
            self,
            ElectricalMode::OutputPushPull | ElectricalMode::OutputOpenDrainPullUp
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    /// Line level for a logical value.
    #[inline(always)]
    pub const fn to_level(self, value: bool) -> PinState {
        let high = match self {
            Polarity::ActiveHigh => value,
            Polarity::ActiveLow => !value,
        };
        if high {
            PinState::High
        } else {
            PinState::Low
        }
    }

    /// Logical value for a sampled line level.
    #[inline(always)]
    pub const fn from_line(self, high: bool) -> bool {
        match self {
            Polarity::ActiveHigh => high,
            Polarity::ActiveLow => !high,
        }
    }
}

/// Where and how a logical signal is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinDescriptor {
    pub pin: PinId,
    /// Electrical mode while the signal is in use.
    pub mode: ElectricalMode,
    pub polarity: Polarity,
    /// Pin supports single-store level and direction changes.
    pub fast_toggle: bool,
    /// Logical level the pin is parked at while idle.
    pub idle: bool,
    /// Whether the line can be read back on this board.
    pub sense: bool,
    /// Direction pin of an external level-shifting buffer, high = probe drives.
    pub buffer: Option<PinId>,
}

impl PinDescriptor {
    /// Push-pull output idling high.
    pub const fn output(pin: PinId) -> Self {
        Self {
            pin,
            mode: ElectricalMode::OutputPushPull,
            polarity: Polarity::ActiveHigh,
            fast_toggle: false,
            idle: true,
            sense: true,
            buffer: None,
        }
    }

    pub const fn input(pin: PinId) -> Self {
        Self {
            mode: ElectricalMode::InputFloating,
            idle: false,
            ..Self::output(pin)
        }
    }

    /// Reset-style line, released (high) while idle.
    pub const fn open_drain(pin: PinId) -> Self {
        Self {
            mode: ElectricalMode::OutputOpenDrainPullUp,
            ..Self::output(pin)
        }
    }

    /// Status LED, off while idle.
    pub const fn led(pin: PinId) -> Self {
        Self {
            idle: false,
            sense: false,
            ..Self::output(pin)
        }
    }

    pub const fn active_low(self) -> Self {
        Self {
            polarity: Polarity::ActiveLow,
            ..self
        }
    }

    pub const fn fast(self) -> Self {
        Self {
            fast_toggle: true,
            ..self
        }
    }

    pub const fn idle_low(self) -> Self {
        Self { idle: false, ..self }
    }

    pub const fn without_sense(self) -> Self {
        Self {
            sense: false,
            ..self
        }
    }

    pub const fn with_buffer(self, buffer: PinId) -> Self {
        Self {
            buffer: Some(buffer),
            ..self
        }
    }

    #[inline(always)]
    pub const fn idle_level(&self) -> PinState {
        self.polarity.to_level(self.idle)
    }
}

/// Operating mode of the probe. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    #[default]
    Off,
    Jtag,
    Swd,
}

/// Port byte of a DAP_Connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    Default = 0,
    Swd = 1,
    Jtag = 2,
}
