// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Build information for kepod-server.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"kepod-server version: {VERSION}\n\
		 Platform:             {}-{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}
