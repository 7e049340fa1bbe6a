// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Background jobs run alongside the HTTP server.

pub mod sweep;

pub use sweep::run_sweep_task;
