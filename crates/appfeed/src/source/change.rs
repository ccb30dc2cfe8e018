//! Event-source adapter: bridges a native change stream into demand-gated
//! unit signals.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, trace};

use crate::config::validate_roots;
use crate::demand::Demand;
use crate::error::Result;
use crate::native::{ChangeStream, ChangeStreamFactory};
use crate::subscription::{Source, Subscriber, Subscription};

/// Streams one unit signal per (coalesced) filesystem change under a fixed
/// set of roots.
///
/// Signals carry no payload: this source models "something under the roots
/// changed", not a queue of individual change events. A signal arriving while
/// the subscriber has no outstanding demand is dropped, never buffered; the
/// next change supersedes it.
pub struct ChangeSignalSource {
	roots: Vec<PathBuf>,
	latency: Duration,
	factory: Arc<dyn ChangeStreamFactory>,
}

impl ChangeSignalSource {
	pub fn new(
		roots: Vec<PathBuf>,
		latency: Duration,
		factory: Arc<dyn ChangeStreamFactory>,
	) -> Result<Self> {
		validate_roots(&roots)?;
		Ok(Self {
			roots,
			latency,
			factory,
		})
	}
}

impl Source<()> for ChangeSignalSource {
	fn attach(&self, subscriber: Arc<dyn Subscriber<()>>) -> Result<Arc<dyn Subscription>> {
		let inner = Arc::new(ChangeInner {
			state: Mutex::new(ChangeState {
				demand: Demand::NONE,
				live: true,
				running: false,
				subscriber: Some(subscriber),
				stream: None,
			}),
		});

		// The callback recovers the subscription through a weak reference,
		// so a handle the native layer keeps alive past cancellation cannot
		// resurrect torn-down state.
		let weak = Arc::downgrade(&inner);
		let stream = self.factory.create(
			&self.roots,
			self.latency,
			Arc::new(move || {
				if let Some(inner) = weak.upgrade() {
					inner.on_change();
				}
			}),
		)?;

		inner.lock().stream = Some(stream);

		Ok(inner)
	}
}

struct ChangeState {
	demand: Demand,
	live: bool,
	running: bool,
	subscriber: Option<Arc<dyn Subscriber<()>>>,
	stream: Option<Box<dyn ChangeStream>>,
}

/// One mutual-exclusion domain guards demand, the liveness/running flags and
/// the native handle; native callbacks and the public API both go through it.
struct ChangeInner {
	state: Mutex<ChangeState>,
}

impl ChangeInner {
	fn lock(&self) -> MutexGuard<'_, ChangeState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Native-callback entry point.
	fn on_change(&self) {
		let mut state = self.lock();
		if !state.live {
			trace!("Change callback after cancellation, ignoring;");
			return;
		}
		if !state.demand.consume_one() {
			trace!("Change signal dropped, no outstanding demand;");
			return;
		}
		if let Some(subscriber) = state.subscriber.clone() {
			let granted = subscriber.receive(());
			state.demand += granted;
		}
	}
}

impl Subscription for ChangeInner {
	fn request(&self, demand: Demand) {
		let mut state = self.lock();
		if !state.live {
			return;
		}
		state.demand += demand;

		// Only the first non-zero demand starts the stream; this source
		// emits unit signals, so later requests just keep the channel open.
		if state.running || state.demand.is_none() {
			return;
		}
		if let Some(stream) = state.stream.as_mut() {
			match stream.start() {
				Ok(()) => {
					state.running = true;
					debug!("Change stream running;");
				}
				Err(e) => error!(?e, "Unable to start change stream;"),
			}
		}
	}

	fn cancel(&self) {
		let mut state = self.lock();
		if !state.live {
			return;
		}
		state.live = false;
		state.running = false;
		state.subscriber = None;
		state.demand = Demand::NONE;

		// Stop, invalidate, release, exactly once; `take` consumes the
		// handle so a second cancel finds nothing.
		if let Some(mut stream) = state.stream.take() {
			stream.stop();
			stream.invalidate();
		}
		debug!("Change subscription cancelled;");
	}
}
