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

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to the other modules.
#[macro_use]
mod fmt;

mod access;
mod bank;
mod config;
mod error;
mod port;
mod signal;
mod signal_map;
pub mod sim;

pub use crate::bank::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::port::*;
pub use crate::signal::*;
pub use crate::signal_map::*;
