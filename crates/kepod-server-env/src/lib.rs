// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ephemeral environment lifecycle for kepod.
//!
//! - [`submit`] records a new environment and enqueues its provisioning job.
//! - [`QueueWorker`] consumes the queue and drives each job through the
//!   idempotent [`Reconciler`].
//! - [`Sweeper`] tears down environments whose TTL has passed.
//! - [`LogMultiplexer`] bridges followed container logs to client
//!   connections and per-namespace log files, which [`LogArchiver`] uploads
//!   to an [`ObjectStore`] on request.
//!
//! Cluster, state store and queue access all go through the capability traits
//! of `kepod-server-k8s` and `kepod-server-db`, so every component runs
//! against in-memory fakes in tests.

pub mod archive;
pub mod config;
pub mod error;
pub mod job;
pub mod manifests;
pub mod multiplexer;
pub mod naming;
pub mod reconciler;
pub mod submit;
pub mod subscriptions;
pub mod sweeper;
pub mod worker;

pub use archive::{
	ArchiveOutcome, ArchiveSignal, FsObjectStore, HttpArchiveSignal, LocalArchiveSignal, LogArchiver,
	ObjectStore,
};
pub use config::{ReconcilerConfig, WorkerConfig};
pub use error::{ArchiveError, ReconcileError, SubmitError, SubscribeError, SweepError};
pub use job::ProvisionJob;
pub use multiplexer::{LogMultiplexer, SubscribeRequest, SubscriptionEvent};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use submit::{submit, CreateEnvironment};
pub use subscriptions::{ConnectionId, SubscriptionTable};
pub use sweeper::{SweepFailure, SweepReport, Sweeper};
pub use worker::{BatchReport, QueueWorker};

pub use kepod_server_db::{EnvStatus, Environment};
