// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;

use tracing::field::{Field, Visit};

/// Collects an event's message and its remaining fields as strings.
#[derive(Default)]
pub(crate) struct FieldVisitor {
	pub message: Option<String>,
	pub fields: Vec<(String, String)>,
}

impl FieldVisitor {
	fn record(&mut self, field: &Field, value: String) {
		if field.name() == "message" {
			self.message = Some(value);
		} else {
			self.fields.push((field.name().to_string(), value));
		}
	}

	pub fn field(&self, name: &str) -> Option<&str> {
		self
			.fields
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v.as_str())
	}
}

impl Visit for FieldVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		self.record(field, format!("{value:?}"));
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		self.record(field, value.to_string());
	}

	fn record_i64(&mut self, field: &Field, value: i64) {
		self.record(field, value.to_string());
	}

	fn record_u64(&mut self, field: &Field, value: u64) {
		self.record(field, value.to_string());
	}

	fn record_bool(&mut self, field: &Field, value: bool) {
		self.record(field, value.to_string());
	}

	fn record_f64(&mut self, field: &Field, value: f64) {
		self.record(field, value.to_string());
	}
}
