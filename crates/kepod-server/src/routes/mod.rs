// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod cleanup;
pub mod envs;
pub mod health;
pub mod logs;
pub mod sweep;
