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

//! TinyICE board: STM32F103 with level-shifting buffers on every debug line.
//!
//! Each debug pin sits behind a buffer whose direction is set by a GPIO on
//! port B (high = probe drives). The board has no input path for TDI, nTRST
//! and nRESET, and only a connect LED.

use crate::gpio::Stm32f1Bank;
use crate::pac;
use rust_dap_port::{
    ConfigError, DapConfig, DapPort, LogicalSignal, PinBank, PinDescriptor, PinId, Port,
    SignalMap, Transports,
};

pub const PORT_A: u8 = 0;
pub const PORT_B: u8 = 1;

const fn pa(index: u8) -> PinId {
    PinId::new(PORT_A, index)
}
const fn pb(index: u8) -> PinId {
    PinId::new(PORT_B, index)
}

pub const SWCLK_TCK: PinId = pb(15);
pub const SWDIO_TMS: PinId = pb(14);
pub const TDI: PinId = pa(3);
pub const TDO: PinId = pa(2);
pub const N_TRST: PinId = pb(12);
pub const N_RESET: PinId = pb(13);
pub const LED_CONNECTED: PinId = pb(9);

pub const SWCLK_TCK_DIR: PinId = pb(2);
pub const SWDIO_TMS_DIR: PinId = pb(1);
pub const TDI_DIR: PinId = pb(4);
pub const TDO_DIR: PinId = pb(5);
pub const N_TRST_DIR: PinId = pb(3);
pub const N_RESET_DIR: PinId = pb(0);

pub type TinyIceBank = Stm32f1Bank<2>;

pub fn config() -> Result<DapConfig, ConfigError> {
    DapConfig::builder()
        .cpu_clock_hz(72_000_000)
        .io_port_write_cycles(2)
        // Data-line turnaround plus its buffer direction store.
        .turnaround_cycles(
            TinyIceBank::DISPATCH_CYCLES
                + TinyIceBank::TURNAROUND_CYCLES
                + TinyIceBank::WRITE_CYCLES,
        )
        .transports(Transports::SWD | Transports::JTAG)
        .jtag_device_count(1)
        .default_port(Port::Jtag)
        .default_swj_clock_hz(1_000_000)
        .packet_size(64)
        .packet_count(32)
        .build()
}

pub fn signal_map(config: &DapConfig) -> Result<SignalMap, ConfigError> {
    SignalMap::builder()
        .bind(
            LogicalSignal::Clk,
            PinDescriptor::output(SWCLK_TCK).fast().with_buffer(SWCLK_TCK_DIR),
        )
        .bind(
            LogicalSignal::Data,
            PinDescriptor::output(SWDIO_TMS).fast().with_buffer(SWDIO_TMS_DIR),
        )
        .bind(
            LogicalSignal::Tdi,
            PinDescriptor::output(TDI).without_sense().with_buffer(TDI_DIR),
        )
        .bind(
            LogicalSignal::Tdo,
            PinDescriptor::input(TDO).with_buffer(TDO_DIR),
        )
        .bind(
            LogicalSignal::Trst,
            PinDescriptor::open_drain(N_TRST)
                .without_sense()
                .with_buffer(N_TRST_DIR),
        )
        .bind(
            LogicalSignal::Reset,
            PinDescriptor::open_drain(N_RESET)
                .without_sense()
                .with_buffer(N_RESET_DIR),
        )
        .bind(
            LogicalSignal::LedConnect,
            PinDescriptor::led(LED_CONNECTED).active_low(),
        )
        .build(config)
}

/// Enables the GPIOA/GPIOB clocks and builds the probe's port on them, with
/// every pin in its power-on state.
pub fn take(
    _gpioa: pac::GPIOA,
    _gpiob: pac::GPIOB,
    rcc: &pac::RCC,
) -> Result<DapPort<TinyIceBank>, ConfigError> {
    let config = config()?;
    let map = signal_map(&config)?;
    rcc.apb2enr
        .modify(|_, w| w.iopaen().set_bit().iopben().set_bit());
    // SAFETY: both ports are consumed here, so the bank is their only user.
    let bank = unsafe { Stm32f1Bank::new([&*pac::GPIOA::ptr(), &*pac::GPIOB::ptr()]) };
    DapPort::new(bank.with_fast_outputs(&map), map, config)
}
