//! Demand-driven streaming sources for discovering installed application
//! bundles.
//!
//! ## Architecture
//!
//! - **[`ChangeSignalSource`]**: wraps a native filesystem change stream and
//!   emits demand-gated unit signals ("something under the roots changed")
//! - **[`Throttle`]**: collapses bursts of signals to at most one per window,
//!   leading edge immediately, trailing edge at window close
//! - **[`AppQuerySource`]**: owns a native metadata query, restarts it on
//!   each throttled signal, and delivers decoded, filtered, sorted batches
//!   of [`AppRecord`]s
//!
//! Data flow: native callback → change source → throttle → query restart →
//! results gathered → decode/filter/sort → demand-gated batch delivery.
//!
//! Consumers drive everything through the subscription protocol
//! ([`Subscriber`], [`Subscription`]): a producer never delivers more than
//! the outstanding demand allows, a signal or batch arriving with no demand
//! is dropped rather than queued (these sources model latest state, not a
//! backlog), and `cancel` synchronously tears down every owned native handle
//! exactly once.
//!
//! ```ignore
//! let source = AppQuerySource::new(
//!     SourceConfig::new(vec!["/Applications".into()]),
//!     Arc::new(NotifyChangeStreamFactory),
//!     Arc::new(my_query_backend),
//! )?;
//! let subscription = source.attach(my_subscriber)?;
//! subscription.request(Demand::Unlimited);
//! // ... later
//! subscription.cancel();
//! ```

pub mod config;
pub mod demand;
pub mod error;
pub mod native;
pub mod record;
pub mod source;
pub mod subscription;
pub mod throttle;


pub use config::{SourceConfig, DEFAULT_THROTTLE_WINDOW};
pub use demand::Demand;
pub use error::{Error, Result};
pub use record::AppRecord;
pub use source::{change::ChangeSignalSource, query::AppQuerySource};
pub use subscription::{Source, Subscriber, Subscription};
pub use throttle::Throttle;
