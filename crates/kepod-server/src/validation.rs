// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Input checks for environment creation.

use kepod_server_env::naming::is_dns_label;
use kepod_server_env::CreateEnvironment;
use serde::Deserialize;

pub const NAME_MIN_LEN: usize = 3;
/// Keeps `{name}-{env_id}` within a 63-character namespace name.
pub const NAME_MAX_LEN: usize = 26;
pub const DEFAULT_TARGET_PORT: u16 = 80;
/// One year.
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEnvRequest {
	pub name: String,
	pub image: String,
	pub ttl: i64,
	#[serde(default, alias = "targetPort")]
	pub target_port: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	#[error("name must be 3-26 lowercase letters, digits or '-', starting and ending with a letter or digit")]
	InvalidName,

	#[error("image must not be empty")]
	EmptyImage,

	#[error("ttl must be between 1 and 31536000 seconds")]
	InvalidTtl,

	#[error("target_port must be between 1 and 65535")]
	InvalidPort,
}

pub fn validate_create(req: CreateEnvRequest) -> Result<CreateEnvironment, ValidationError> {
	let name_len = req.name.len();
	if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) || !is_dns_label(&req.name) {
		return Err(ValidationError::InvalidName);
	}

	let image = req.image.trim();
	if image.is_empty() {
		return Err(ValidationError::EmptyImage);
	}

	if !(1..=MAX_TTL_SECS).contains(&req.ttl) {
		return Err(ValidationError::InvalidTtl);
	}

	let target_port = match req.target_port {
		None => DEFAULT_TARGET_PORT,
		Some(port) => u16::try_from(port)
			.ok()
			.filter(|p| *p != 0)
			.ok_or(ValidationError::InvalidPort)?,
	};

	Ok(CreateEnvironment {
		name: req.name,
		image: image.to_string(),
		ttl: req.ttl,
		target_port,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use kepod_server_env::naming::{namespace_for, new_env_id};
	use proptest::prelude::*;

	fn req(name: &str, image: &str, ttl: i64, port: Option<u32>) -> CreateEnvRequest {
		CreateEnvRequest {
			name: name.into(),
			image: image.into(),
			ttl,
			target_port: port,
		}
	}

	#[test]
	fn accepts_valid_request_with_default_port() {
		let ok = validate_create(req("demo", " nginx:1.27 ", 600, None)).unwrap();
		assert_eq!(ok.target_port, 80);
		assert_eq!(ok.image, "nginx:1.27");
	}

	#[test]
	fn rejects_bad_fields() {
		assert_eq!(
			validate_create(req("Demo", "nginx", 1, None)).unwrap_err(),
			ValidationError::InvalidName
		);
		assert_eq!(
			validate_create(req("ab", "nginx", 1, None)).unwrap_err(),
			ValidationError::InvalidName
		);
		assert_eq!(
			validate_create(req("-demo", "nginx", 1, None)).unwrap_err(),
			ValidationError::InvalidName
		);
		assert_eq!(
			validate_create(req("demo", "  ", 1, None)).unwrap_err(),
			ValidationError::EmptyImage
		);
		assert_eq!(
			validate_create(req("demo", "nginx", 0, None)).unwrap_err(),
			ValidationError::InvalidTtl
		);
		assert_eq!(
			validate_create(req("demo", "nginx", 1, Some(0))).unwrap_err(),
			ValidationError::InvalidPort
		);
		assert_eq!(
			validate_create(req("demo", "nginx", 1, Some(70_000))).unwrap_err(),
			ValidationError::InvalidPort
		);
	}

	#[test]
	fn ttl_is_bounded_above() {
		assert!(validate_create(req("demo", "nginx", MAX_TTL_SECS, None)).is_ok());
		assert_eq!(
			validate_create(req("demo", "nginx", MAX_TTL_SECS + 1, None)).unwrap_err(),
			ValidationError::InvalidTtl
		);
		assert_eq!(
			validate_create(req("demo", "nginx", 10_000_000_000_000, None)).unwrap_err(),
			ValidationError::InvalidTtl
		);
		assert_eq!(
			validate_create(req("demo", "nginx", i64::MAX, None)).unwrap_err(),
			ValidationError::InvalidTtl
		);
	}

	#[test]
	fn accepts_camel_case_port() {
		let parsed: CreateEnvRequest =
			serde_json::from_str(r#"{"name":"demo","image":"nginx","ttl":5,"targetPort":8080}"#)
				.unwrap();
		assert_eq!(parsed.target_port, Some(8080));
	}

	#[test]
	fn file_sink_and_cluster_agree_on_label_length() {
		assert_eq!(
			kepod_server_logs::MAX_NAMESPACE_LEN,
			kepod_server_env::naming::MAX_LABEL_LEN
		);
	}

	proptest! {
		#[test]
		fn file_sink_accepts_exactly_dns_labels(value in "[a-z0-9-]{0,70}") {
			prop_assert_eq!(kepod_server_logs::is_safe_namespace(&value), is_dns_label(&value));
		}

		#[test]
		fn accepted_names_yield_valid_namespaces(name in "[a-z0-9][a-z0-9-]{1,24}[a-z0-9]") {
			let accepted = validate_create(req(&name, "nginx", 60, None)).unwrap();
			let namespace = namespace_for(&accepted.name, &new_env_id());
			prop_assert!(is_dns_label(&namespace));
		}
	}
}
