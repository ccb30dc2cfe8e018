//! Time-window rate limiter collapsing signal bursts to one trailing edge.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::demand::Demand;
use crate::error::Result;
use crate::subscription::{Source, Subscriber, Subscription};

/// Rate-limits an upstream unit-signal source.
///
/// The first signal in an idle window forwards immediately and opens the
/// window; every further signal inside the window is absorbed, and at window
/// close exactly one trailing signal forwards if any arrived. With a unit
/// payload latest-wins and first-wins coincide, but the trailing edge is
/// still scheduled so downstream sees at most one signal per window.
///
/// The operator performs no native I/O; cancellation only aborts its window
/// timer and cancels the upstream subscription. Must be attached from inside
/// a tokio runtime, which hosts the timer.
pub struct Throttle<S> {
	upstream: S,
	window: Duration,
}

impl<S> Throttle<S> {
	pub fn new(upstream: S, window: Duration) -> Self {
		Self { upstream, window }
	}
}

impl<S: Source<()>> Source<()> for Throttle<S> {
	fn attach(&self, subscriber: Arc<dyn Subscriber<()>>) -> Result<Arc<dyn Subscription>> {
		let (signal_tx, signal_rx) = async_channel::unbounded();

		let inner = Arc::new(ThrottleInner {
			state: Mutex::new(ThrottleState {
				demand: Demand::NONE,
				live: true,
				upstream_started: false,
				subscriber: Some(subscriber),
				upstream: None,
				pump: None,
			}),
		});

		let upstream = self.upstream.attach(Arc::new(ThrottleGate { signal_tx }))?;
		let pump = tokio::spawn(pump(Arc::downgrade(&inner), signal_rx, self.window));

		{
			let mut state = inner.lock();
			state.upstream = Some(upstream);
			state.pump = Some(pump);
		}

		Ok(inner)
	}
}

/// Upstream subscriber: funnels raw signals into the pump task's channel.
struct ThrottleGate {
	signal_tx: async_channel::Sender<()>,
}

impl Subscriber<()> for ThrottleGate {
	fn receive(&self, (): ()) -> Demand {
		// Unbounded channel, never blocks the native callback thread; the
		// pump coalesces whatever piles up.
		let _ = self.signal_tx.try_send(());
		Demand::NONE
	}
}

struct ThrottleState {
	demand: Demand,
	live: bool,
	upstream_started: bool,
	subscriber: Option<Arc<dyn Subscriber<()>>>,
	upstream: Option<Arc<dyn Subscription>>,
	pump: Option<JoinHandle<()>>,
}

struct ThrottleInner {
	state: Mutex<ThrottleState>,
}

impl ThrottleInner {
	fn lock(&self) -> MutexGuard<'_, ThrottleState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Forward one signal downstream, demand permitting.
	///
	/// Returns `false` once the subscription is no longer live.
	fn forward(&self) -> bool {
		let mut state = self.lock();
		if !state.live {
			return false;
		}
		if !state.demand.consume_one() {
			trace!("Throttled signal dropped, no outstanding demand;");
			return true;
		}
		if let Some(subscriber) = state.subscriber.clone() {
			let granted = subscriber.receive(());
			state.demand += granted;
		}
		true
	}
}

impl Subscription for ThrottleInner {
	fn request(&self, demand: Demand) {
		let upstream = {
			let mut state = self.lock();
			if !state.live {
				return;
			}
			state.demand += demand;
			if state.upstream_started || state.demand.is_none() {
				return;
			}
			state.upstream_started = true;
			state.upstream.clone()
		};

		// The throttle absorbs rate; demand only gates the downstream edge.
		if let Some(upstream) = upstream {
			upstream.request(Demand::Unlimited);
		}
	}

	fn cancel(&self) {
		let (upstream, pump) = {
			let mut state = self.lock();
			if !state.live {
				return;
			}
			state.live = false;
			state.subscriber = None;
			state.demand = Demand::NONE;
			(state.upstream.take(), state.pump.take())
		};

		if let Some(pump) = pump {
			// Also cancels any pending trailing-edge timer.
			pump.abort();
		}
		if let Some(upstream) = upstream {
			upstream.cancel();
		}
		debug!("Throttle subscription cancelled;");
	}
}

/// Window state machine. Owned by this task alone; only the monotonic clock
/// drives it, so it never needs a reset.
async fn pump(inner: Weak<ThrottleInner>, signals: async_channel::Receiver<()>, window: Duration) {
	let mut deadline: Option<Instant> = None;
	let mut pending = false;

	loop {
		match deadline {
			None => match signals.recv().await {
				Ok(()) => {
					let Some(strong) = inner.upgrade() else { break };
					// Leading edge: an idle window forwards immediately.
					if !strong.forward() {
						break;
					}
					deadline = Some(Instant::now() + window);
					pending = false;
				}
				Err(_) => break,
			},
			Some(close) => tokio::select! {
				received = signals.recv() => match received {
					// Absorbed; with a unit payload "latest" is just a flag.
					Ok(()) => pending = true,
					Err(_) => break,
				},
				() = sleep_until(close) => {
					if pending {
						let Some(strong) = inner.upgrade() else { break };
						// Trailing edge, then a fresh window.
						if !strong.forward() {
							break;
						}
						pending = false;
						deadline = Some(Instant::now() + window);
					} else {
						deadline = None;
					}
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::native::mock::Recorder;
	use std::sync::atomic::{AtomicBool, Ordering};
	use tokio::task::yield_now;
	use tokio::time::advance;

	const WINDOW: Duration = Duration::from_millis(300);

	/// Let the pump task drain its channel without idling the paused runtime
	/// (idling would auto-advance the clock into the window close).
	async fn settle() {
		for _ in 0..16 {
			yield_now().await;
		}
	}

	/// Unit-signal source driven by hand from the test body.
	#[derive(Default)]
	struct ManualShared {
		subscriber: Mutex<Option<Arc<dyn Subscriber<()>>>>,
		requests: Mutex<Vec<Demand>>,
		cancelled: AtomicBool,
	}

	impl ManualShared {
		fn fire(&self) {
			let subscriber = self.subscriber.lock().unwrap().clone();
			if let Some(subscriber) = subscriber {
				subscriber.receive(());
			}
		}
	}

	struct ManualSource {
		shared: Arc<ManualShared>,
	}

	impl ManualSource {
		fn new() -> (Self, Arc<ManualShared>) {
			let shared = Arc::new(ManualShared::default());
			(
				Self {
					shared: shared.clone(),
				},
				shared,
			)
		}
	}

	impl Source<()> for ManualSource {
		fn attach(&self, subscriber: Arc<dyn Subscriber<()>>) -> Result<Arc<dyn Subscription>> {
			*self.shared.subscriber.lock().unwrap() = Some(subscriber);
			Ok(Arc::new(ManualSubscription {
				shared: self.shared.clone(),
			}))
		}
	}

	struct ManualSubscription {
		shared: Arc<ManualShared>,
	}

	impl Subscription for ManualSubscription {
		fn request(&self, demand: Demand) {
			self.shared.requests.lock().unwrap().push(demand);
		}

		fn cancel(&self) {
			self.shared.cancelled.store(true, Ordering::SeqCst);
		}
	}

	fn throttled() -> (Arc<ManualShared>, Arc<Recorder<()>>, Arc<dyn Subscription>) {
		let (source, shared) = ManualSource::new();
		let throttle = Throttle::new(source, WINDOW);

		let recorder = Recorder::new();
		let subscription = throttle.attach(recorder.clone()).unwrap();
		(shared, recorder, subscription)
	}

	#[tokio::test(start_paused = true)]
	async fn first_signal_in_idle_window_forwards_immediately() {
		let (shared, recorder, subscription) = throttled();
		subscription.request(Demand::Unlimited);

		shared.fire();
		settle().await;
		assert_eq!(recorder.count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn burst_collapses_to_one_trailing_signal_at_window_close() {
		let (shared, recorder, subscription) = throttled();
		subscription.request(Demand::Unlimited);

		// Signals at t=0, t=10, t=20 within one 300ms window.
		shared.fire();
		settle().await;
		advance(Duration::from_millis(10)).await;
		shared.fire();
		settle().await;
		advance(Duration::from_millis(10)).await;
		shared.fire();
		settle().await;

		// Leading edge only so far.
		assert_eq!(recorder.count(), 1);

		// Window closes at t=300: exactly one trailing signal, never three.
		advance(Duration::from_millis(280)).await;
		settle().await;
		assert_eq!(recorder.count(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn quiet_window_emits_no_trailing_signal() {
		let (shared, recorder, subscription) = throttled();
		subscription.request(Demand::Unlimited);

		shared.fire();
		settle().await;
		assert_eq!(recorder.count(), 1);

		advance(WINDOW + Duration::from_millis(1)).await;
		settle().await;
		assert_eq!(recorder.count(), 1);

		// Idle again: the next signal forwards immediately.
		shared.fire();
		settle().await;
		assert_eq!(recorder.count(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn forwarding_is_demand_gated() {
		let (shared, recorder, subscription) = throttled();
		subscription.request(Demand::limited(1));

		shared.fire();
		settle().await;
		assert_eq!(recorder.count(), 1);

		advance(Duration::from_millis(10)).await;
		shared.fire();
		settle().await;
		advance(WINDOW).await;
		settle().await;

		// The trailing edge found no demand and was dropped, not queued.
		assert_eq!(recorder.count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn requests_unlimited_demand_upstream_once() {
		let (shared, _recorder, subscription) = throttled();
		assert!(shared.requests.lock().unwrap().is_empty());

		subscription.request(Demand::limited(1));
		subscription.request(Demand::limited(1));
		assert_eq!(*shared.requests.lock().unwrap(), vec![Demand::Unlimited]);
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_cancels_upstream_and_pending_window() {
		let (shared, recorder, subscription) = throttled();
		subscription.request(Demand::Unlimited);

		shared.fire();
		settle().await;
		advance(Duration::from_millis(10)).await;
		shared.fire();
		settle().await;

		subscription.cancel();
		assert!(shared.cancelled.load(Ordering::SeqCst));

		// The pending trailing edge must never fire.
		advance(WINDOW).await;
		settle().await;
		assert_eq!(recorder.count(), 1);

		subscription.cancel();
		shared.fire();
		settle().await;
		assert_eq!(recorder.count(), 1);
	}
}
