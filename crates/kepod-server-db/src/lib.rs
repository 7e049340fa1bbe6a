// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for kepod: environment records and the provisioning
//! work queue.

pub mod environment;
pub mod error;
pub mod pool;
pub mod queue;
pub mod testing;
pub mod types;

pub use environment::{EnvironmentRepository, EnvironmentStore};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use queue::{JobQueue, QueueRepository};
pub use testing::MemoryEnvironmentStore;
pub use types::{EnvStatus, Environment, QueueMessage, UpdateOutcome};
