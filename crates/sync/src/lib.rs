//! Real-time job-event synchronization layer for the transmux client.
//!
//! One push-channel subscription, many independent consumers. The crate
//! provides the building blocks the UI layers derive their state from:
//!
//! - [`EventBusClient`] — lazily-connecting pub/sub client owning exactly
//!   one transport subscription, fanning every [`JobUpdate`] out to all
//!   registered listeners.
//! - [`JobQueue`] — ordered reconciliation of bus events and optimistic
//!   local submissions into one queue view.
//! - [`ActiveJobCounter`] — an independent second consumer deriving
//!   aggregate counts (e.g. a sidebar badge) from the same bus.
//! - [`SubmissionAdapter`] + [`JobApi`] — optimistic submission flow and
//!   the REST wrapper it resolves through.
//! - [`Transport`] — the injection seam for the underlying push
//!   transport ([`WsTransport`] in production, fakes in tests).
//!
//! All services are explicitly constructed and injected; there is no
//! module-level singleton.
//!
//! [`JobUpdate`]: transmux_core::JobUpdate

pub mod bus;
pub mod config;
pub mod metrics;
pub mod queue;
pub mod reconnect;
pub mod submit;
pub mod transport;

pub use bus::{EventBusClient, Subscription};
pub use config::SyncConfig;
pub use metrics::ActiveJobCounter;
pub use queue::{JobQueue, QueueItem};
pub use reconnect::ReconnectConfig;
pub use submit::{
    JobApi, JobApiError, JobSubmitter, ProgressFn, SubmissionAdapter, SubmissionHandle,
    SubmitResponse,
};
pub use transport::{Transport, TransportError, TransportEvent, WsTransport};
