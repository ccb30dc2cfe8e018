//! Scripted native facilities and a recording subscriber for tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::demand::Demand;
use crate::error::Result;
use crate::native::{
	ChangeCallback, ChangeStream, ChangeStreamFactory, GatherCallback, MetadataQuery,
	MetadataQueryFactory, QuerySpec, RawItem,
};
use crate::subscription::Subscriber;

/// Shared view of a mock change stream: the registered callback plus
/// lifecycle counters, so tests can fire native callbacks at will and assert
/// the handle was stopped/invalidated exactly once.
#[derive(Default)]
pub(crate) struct ChangeLog {
	callback: Mutex<Option<ChangeCallback>>,
	starts: AtomicUsize,
	stops: AtomicUsize,
	invalidates: AtomicUsize,
}

impl ChangeLog {
	/// Simulate the native change callback, as the OS would from any thread.
	pub fn fire(&self) {
		let callback = self.callback.lock().unwrap().clone();
		if let Some(callback) = callback {
			callback();
		}
	}

	pub fn starts(&self) -> usize {
		self.starts.load(Ordering::SeqCst)
	}

	pub fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}

	pub fn invalidates(&self) -> usize {
		self.invalidates.load(Ordering::SeqCst)
	}
}

pub(crate) struct MockChangeFactory {
	log: Arc<ChangeLog>,
}

impl MockChangeFactory {
	pub fn new() -> (Self, Arc<ChangeLog>) {
		let log = Arc::new(ChangeLog::default());
		(Self { log: log.clone() }, log)
	}
}

impl ChangeStreamFactory for MockChangeFactory {
	fn create(
		&self,
		_roots: &[PathBuf],
		_latency: Duration,
		on_change: ChangeCallback,
	) -> Result<Box<dyn ChangeStream>> {
		*self.log.callback.lock().unwrap() = Some(on_change);
		Ok(Box::new(MockChangeStream {
			log: self.log.clone(),
		}))
	}
}

struct MockChangeStream {
	log: Arc<ChangeLog>,
}

impl ChangeStream for MockChangeStream {
	fn start(&mut self) -> Result<()> {
		self.log.starts.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn stop(&mut self) {
		self.log.stops.fetch_add(1, Ordering::SeqCst);
	}

	fn invalidate(&mut self) {
		self.log.invalidates.fetch_add(1, Ordering::SeqCst);
	}
}

/// Shared view of a mock metadata query: scripted results, the registered
/// gather callback, and the start/stop operation sequence.
#[derive(Default)]
pub(crate) struct QueryLog {
	gather: Mutex<Option<GatherCallback>>,
	results: Mutex<Vec<RawItem>>,
	ops: Mutex<Vec<&'static str>>,
	running: AtomicBool,
}

impl QueryLog {
	pub fn set_results(&self, items: Vec<RawItem>) {
		*self.results.lock().unwrap() = items;
	}

	/// Simulate the native "results gathered" signal.
	pub fn finish_gathering(&self) {
		let callback = self.gather.lock().unwrap().clone();
		if let Some(callback) = callback {
			callback();
		}
	}

	/// The start/stop calls observed so far, in order.
	pub fn ops(&self) -> Vec<&'static str> {
		self.ops.lock().unwrap().clone()
	}
}

pub(crate) struct MockQueryFactory {
	log: Arc<QueryLog>,
}

impl MockQueryFactory {
	pub fn new() -> (Self, Arc<QueryLog>) {
		let log = Arc::new(QueryLog::default());
		(Self { log: log.clone() }, log)
	}
}

impl MetadataQueryFactory for MockQueryFactory {
	fn create(
		&self,
		_spec: QuerySpec,
		on_gathered: GatherCallback,
	) -> Result<Box<dyn MetadataQuery>> {
		*self.log.gather.lock().unwrap() = Some(on_gathered);
		Ok(Box::new(MockQuery {
			log: self.log.clone(),
		}))
	}
}

struct MockQuery {
	log: Arc<QueryLog>,
}

impl MetadataQuery for MockQuery {
	fn start(&mut self) -> Result<()> {
		self.log.ops.lock().unwrap().push("start");
		self.log.running.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn stop(&mut self) {
		self.log.ops.lock().unwrap().push("stop");
		self.log.running.store(false, Ordering::SeqCst);
	}

	fn is_running(&self) -> bool {
		self.log.running.load(Ordering::SeqCst)
	}

	fn results(&self) -> Vec<RawItem> {
		self.log.results.lock().unwrap().clone()
	}
}

/// Subscriber that records every delivery and grants a fixed amount of
/// additional demand per received value.
pub(crate) struct Recorder<T> {
	values: Mutex<Vec<T>>,
	grant: Mutex<Demand>,
}

impl<T> Recorder<T> {
	pub fn new() -> Arc<Self> {
		Self::granting(Demand::NONE)
	}

	pub fn granting(grant: Demand) -> Arc<Self> {
		Arc::new(Self {
			values: Mutex::new(Vec::new()),
			grant: Mutex::new(grant),
		})
	}

	pub fn count(&self) -> usize {
		self.values.lock().unwrap().len()
	}
}

impl<T: Clone> Recorder<T> {
	pub fn values(&self) -> Vec<T> {
		self.values.lock().unwrap().clone()
	}
}

impl<T: Send + Sync> Subscriber<T> for Recorder<T> {
	fn receive(&self, value: T) -> Demand {
		self.values.lock().unwrap().push(value);
		*self.grant.lock().unwrap()
	}
}
