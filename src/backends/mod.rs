// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! # Modules
//!
//! - [`camera`]: Camera providers, stream acquisition and frame types

pub mod camera;
