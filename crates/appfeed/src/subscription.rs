//! The contract between producers and consumers.
//!
//! A [`Source`] pairs one producer with one consumer: attaching a
//! [`Subscriber`] yields a [`Subscription`] through which the consumer
//! declares demand and, eventually, tears the pairing down. Producers never
//! deliver more values than the outstanding demand allows; a delivery that
//! would exceed it is dropped instead (these sources model "latest state",
//! not a queue).

use std::sync::Arc;

use crate::demand::Demand;
use crate::error::Result;

/// Consumer side of a subscription.
pub trait Subscriber<T>: Send + Sync {
	/// Accept one value, returning any *additional* demand granted in
	/// response.
	///
	/// Deliveries are serialized per subscription and run under its internal
	/// lock, so the return value is the only re-entry path: calling
	/// [`Subscription::request`] or [`Subscription::cancel`] from inside
	/// `receive` deadlocks.
	fn receive(&self, value: T) -> Demand;

	/// Accept the terminal completion signal.
	///
	/// Delivered at most once; the subscription is terminal afterwards. The
	/// sources in this crate never complete on their own (they only stop via
	/// cancellation), so the default is a no-op.
	fn receive_completion(&self) {}
}

/// Producer side of a subscription.
pub trait Subscription: Send + Sync {
	/// Grant additional demand.
	///
	/// Idempotent-additive: requesting 3 then 2 yields an effective
	/// outstanding demand of 5, and once unbounded, always unbounded. Safe to
	/// call before the producer has emitted anything and a no-op after
	/// cancellation.
	fn request(&self, demand: Demand);

	/// Tear down the subscription and release all owned native resources.
	///
	/// Idempotent and synchronous: once `cancel` returns, the subscriber is
	/// never invoked again, even if a native callback was already in flight.
	fn cancel(&self);
}

/// A producer that consumers can attach to.
pub trait Source<T> {
	/// Pair `subscriber` with this producer.
	///
	/// Native resources are created here; failure to create them is a fatal
	/// configuration error, not a recoverable stream failure.
	fn attach(&self, subscriber: Arc<dyn Subscriber<T>>) -> Result<Arc<dyn Subscription>>;
}
