//! Queue-driven mailbox RPC worker
//!
//! Requests arrive on a message queue as JSON envelopes naming an
//! operation. The [`Dispatcher`] looks the operation up in an
//! [`OperationRegistry`], runs it and publishes a [`ResponseEnvelope`]
//! to the request's `reply_to` queue with the same correlation id.
//!
//! Mail operations go through the [`backend::MailBackend`] traits, with
//! an IMAP implementation on `async-imap` and SMTP submission on
//! `lettre`. Long-running folder synchronisations are tracked by the
//! [`jobs::JobManager`] and can be polled or cancelled over RPC.
//!
//! ```no_run
//! use mailbox_rpc::backend::{ImapBackend, SmtpSender};
//! use mailbox_rpc::jobs::{JobManager, JobRegistry};
//! use mailbox_rpc::{Dispatcher, MemoryBroker, Operations};
//! use std::sync::Arc;
//!
//! # async fn run() -> mailbox_rpc::Result<()> {
//! let backend = Arc::new(ImapBackend);
//! let jobs = JobManager::new(JobRegistry::new(), backend.clone());
//! let registry = Operations::new(backend, Arc::new(SmtpSender), jobs).into_registry();
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//!
//! let broker = MemoryBroker::new();
//! let channel = broker.channel();
//! dispatcher.consume_loop(&channel, "mail_rpc").await
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

mod arguments;
pub mod backend;
pub mod broker;
mod config;
mod dispatcher;
mod envelope;
mod error;
mod flag;
mod folder;
pub mod jobs;
mod operations;
mod registry;
mod rpc_client;

pub use arguments::Arguments;
pub use broker::{Channel, Consumer, Delivery, MemoryBroker, OutboundMessage};
pub use config::{ImapConfig, ImapSecurity, SmtpConfig, WorkerConfig};
pub use dispatcher::Dispatcher;
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use error::{Error, OperationError, Result};
pub use flag::Flag;
pub use folder::Folder;
pub use operations::Operations;
pub use registry::{Handler, OperationRegistry, OperationResult};
pub use rpc_client::RpcClient;
