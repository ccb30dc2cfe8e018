//! Query-source adapter: restarts a metadata query on throttled change
//! signals and delivers decoded application batches.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, trace};

use crate::config::SourceConfig;
use crate::demand::Demand;
use crate::error::Result;
use crate::native::{ChangeStreamFactory, MetadataQuery, MetadataQueryFactory, QuerySpec};
use crate::record::AppRecord;
use crate::source::change::ChangeSignalSource;
use crate::subscription::{Source, Subscriber, Subscription};
use crate::throttle::Throttle;

/// Streams sorted batches of application records for a fixed set of roots.
///
/// Owns one native metadata query scoped to the local volume with the
/// application-bundle content type; path filtering against the watched roots
/// happens here, since the native scope only prunes by volume. A throttled
/// change watcher over the same roots re-triggers the query, so downstream
/// sees a fresh batch at most once per window.
///
/// Must be attached from inside a tokio runtime (the throttle timer runs on
/// it).
pub struct AppQuerySource {
	config: SourceConfig,
	changes: Arc<dyn ChangeStreamFactory>,
	queries: Arc<dyn MetadataQueryFactory>,
}

impl AppQuerySource {
	pub fn new(
		config: SourceConfig,
		changes: Arc<dyn ChangeStreamFactory>,
		queries: Arc<dyn MetadataQueryFactory>,
	) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			changes,
			queries,
		})
	}
}

impl Source<Vec<AppRecord>> for AppQuerySource {
	fn attach(
		&self,
		subscriber: Arc<dyn Subscriber<Vec<AppRecord>>>,
	) -> Result<Arc<dyn Subscription>> {
		let inner = Arc::new(QueryInner {
			roots: self.config.roots.clone(),
			state: Mutex::new(QueryState {
				demand: Demand::NONE,
				live: true,
				started: false,
				subscriber: Some(subscriber),
				query: None,
				upstream: None,
			}),
		});

		// Completion callback owned by the query itself, keyed by nothing:
		// it recovers the subscription through a weak reference.
		let weak = Arc::downgrade(&inner);
		let query = self.queries.create(
			QuerySpec::application_bundles(),
			Arc::new(move || {
				if let Some(inner) = weak.upgrade() {
					inner.on_gathered();
				}
			}),
		)?;

		let throttled = Throttle::new(
			ChangeSignalSource::new(
				self.config.roots.clone(),
				self.config.latency,
				Arc::clone(&self.changes),
			)?,
			self.config.throttle_window,
		);
		let trigger = throttled.attach(Arc::new(QueryTrigger {
			inner: Arc::downgrade(&inner),
		}))?;
		trigger.request(Demand::Unlimited);

		{
			let mut state = inner.lock();
			state.query = Some(query);
			state.upstream = Some(trigger);
		}

		Ok(inner)
	}
}

/// Downstream end of the throttled change watcher.
struct QueryTrigger {
	inner: Weak<QueryInner>,
}

impl Subscriber<()> for QueryTrigger {
	fn receive(&self, (): ()) -> Demand {
		if let Some(inner) = self.inner.upgrade() {
			inner.on_trigger();
		}
		Demand::NONE
	}
}

struct QueryState {
	demand: Demand,
	live: bool,
	started: bool,
	subscriber: Option<Arc<dyn Subscriber<Vec<AppRecord>>>>,
	query: Option<Box<dyn MetadataQuery>>,
	upstream: Option<Arc<dyn Subscription>>,
}

struct QueryInner {
	roots: Vec<PathBuf>,
	state: Mutex<QueryState>,
}

impl QueryInner {
	fn lock(&self) -> MutexGuard<'_, QueryState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Throttled-change entry point.
	fn on_trigger(&self) {
		let mut state = self.lock();
		if !state.live {
			return;
		}
		let Some(query) = state.query.as_mut() else {
			return;
		};
		if !query.is_running() {
			trace!("Change trigger before the query ever started, ignoring;");
			return;
		}

		// Never restart a running query in place: in-flight results must be
		// discarded before the next gathering pass.
		query.stop();
		match query.start() {
			Ok(()) => debug!("Metadata query restarted after filesystem change;"),
			Err(e) => error!(?e, "Unable to restart metadata query;"),
		}
	}

	/// Native results-gathered entry point.
	fn on_gathered(&self) {
		let mut state = self.lock();
		if !state.live {
			return;
		}
		let Some(query) = state.query.as_ref() else {
			return;
		};

		let mut batch: Vec<AppRecord> = query
			.results()
			.iter()
			.filter_map(AppRecord::decode)
			.filter(|record| self.is_under_watched_root(record.bundle_path()))
			.collect();
		batch.sort();

		if !state.demand.consume_one() {
			debug!(len = batch.len(), "Application batch dropped, no outstanding demand;");
			return;
		}
		if let Some(subscriber) = state.subscriber.clone() {
			let granted = subscriber.receive(batch);
			state.demand += granted;
		}
	}

	fn is_under_watched_root(&self, path: &Path) -> bool {
		self.roots.iter().any(|root| path.starts_with(root))
	}
}

impl Subscription for QueryInner {
	fn request(&self, demand: Demand) {
		let mut state = self.lock();
		if !state.live {
			return;
		}
		state.demand += demand;

		if state.started || state.demand.is_none() {
			return;
		}
		if let Some(query) = state.query.as_mut() {
			match query.start() {
				Ok(()) => {
					state.started = true;
					debug!("Metadata query started;");
				}
				Err(e) => error!(?e, "Unable to start metadata query;"),
			}
		}
	}

	fn cancel(&self) {
		let upstream = {
			let mut state = self.lock();
			if !state.live {
				return;
			}
			state.live = false;
			state.started = false;
			state.subscriber = None;
			state.demand = Demand::NONE;

			// Stop and release the query handle exactly once.
			if let Some(mut query) = state.query.take() {
				query.stop();
			}
			state.upstream.take()
		};

		// Upstream cancellation locks the throttle; doing it outside our own
		// state lock keeps lock order strictly downstream-to-upstream.
		if let Some(upstream) = upstream {
			upstream.cancel();
		}
		debug!("Application query subscription cancelled;");
	}
}
