//! Dependency resolution for tracked packages.
//!
//! The [`Resolver`] runs two jobs. Build processing records the resolved
//! build environment of finished builds. Repo generation resolves every
//! tracked package against a new repository snapshot and keeps the
//! resolution state of the packages current.

use std::{fmt::Debug, pin::pin, sync::Arc};

use thiserror::Error;
use time::Duration;
use tracing::{debug, error, info, warn};
use vigil_backend_model::repo::RepoId;
use vigil_backend_service::{BackendError, BackendServices, repo};

use crate::{
	build_system::{BuildSpec, BuildSystemClient, BuildSystemError},
	config::DependencyConfig,
	engine::{GreedyEngine, ResolutionEngine},
	generate::GenerationOutcome,
	notifier::{BusNotifier, LogNotifier, StateNotifier},
	repo_cache::{RepoCache, RepoCacheError},
};

pub mod build_system;
pub mod capability;
pub mod config;
pub mod diff;
pub mod distance;
pub mod engine;
pub mod evr;
pub mod generate;
pub mod notifier;
pub mod process;
pub mod repo_cache;
pub mod resolve;
pub mod selector;
pub mod universe;

/// Lock held while a repo generation is processed.
pub const GENERATION_LOCK: &str = "repo-generation";
const GENERATION_LOCK_TTL: Duration = Duration::minutes(5);
/// How often the generation lock is extended. Well below its TTL.
const GENERATION_LOCK_REFRESH: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug)]
pub struct Resolver {
	backend: BackendServices,
	config: DependencyConfig,
	engine: Box<dyn ResolutionEngine>,
	repo_cache: Arc<dyn RepoCache>,
	build_system: Arc<dyn BuildSystemClient>,
	notifier: Arc<dyn StateNotifier>,
}

impl Resolver {
	/// Creates a resolver using the greedy engine.
	///
	/// State changes are published on the backend bus when there is one and
	/// logged otherwise.
	pub fn new(
		backend: BackendServices,
		config: DependencyConfig,
		repo_cache: Arc<dyn RepoCache>,
		build_system: Arc<dyn BuildSystemClient>,
	) -> Self {
		let notifier: Arc<dyn StateNotifier> = match &backend.bus {
			Some(bus) => Arc::new(BusNotifier::new(bus.clone())),
			None => Arc::new(LogNotifier),
		};
		Self {
			backend,
			config,
			engine: Box::new(GreedyEngine),
			repo_cache,
			build_system,
			notifier,
		}
	}

	pub fn with_engine(mut self, engine: impl ResolutionEngine + 'static) -> Self {
		self.engine = Box::new(engine);
		self
	}

	pub fn with_notifier(mut self, notifier: Arc<dyn StateNotifier>) -> Self {
		self.notifier = notifier;
		self
	}

	/// Queues a repo generation for processing.
	pub async fn request_generation(&self, repo_id: RepoId) -> Result<()> {
		let mut conn = self.backend.database.get().await?;
		repo::enqueue_request(&mut conn, repo_id).await?;
		Ok(())
	}

	/// Processes the newest requested repo generation.
	///
	/// Older pending requests are coalesced into it. Requests stay queued
	/// when the snapshot of the generation is not available yet.
	#[tracing::instrument(skip(self))]
	pub async fn process_repo_generation_requests(&self) -> Result<Option<GenerationOutcome>> {
		let mut lock = match &self.backend.redis {
			Some(redis) => Some(
				redis
					.lock(GENERATION_LOCK, GENERATION_LOCK_TTL)
					.await
					.map_err(BackendError::from)?,
			),
			None => None,
		};

		let (requested, last) = {
			let mut conn = self.backend.database.get().await?;
			let Some(requested) = repo::latest_request(&mut conn).await? else {
				return Ok(None);
			};
			let last = repo::latest_repo_id(&mut conn).await?.unwrap_or(0);
			(requested, last)
		};

		let outcome = if requested > last {
			let generation = self.generate_repo(requested);
			Some(match lock.as_mut() {
				Some(lock) => {
					renewing(generation, GENERATION_LOCK_REFRESH, async || {
						lock.extend(GENERATION_LOCK_TTL).await.map_err(BackendError::from)?;
						debug!("extended repo generation lock");
						Ok(())
					})
					.await?
				}
				None => generation.await?,
			})
		} else {
			info!(requested, last, "repo generation already processed");
			None
		};
		if outcome != Some(GenerationOutcome::SnapshotMissing) {
			let mut conn = self.backend.database.get().await?;
			let deleted = repo::delete_requests_up_to(&mut conn, requested).await?;
			info!(requested, deleted, "processed repo generation requests");
		}
		Ok(outcome)
	}

	/// Runs one polling cycle. Failures are logged.
	pub async fn run_once(&self) {
		if let Err(error) = self.process_builds().await {
			error!(?error, "failed to process builds");
		}
		if let Err(error) = self.process_repo_generation_requests().await {
			error!(?error, "failed to process repo generation requests");
		}
	}

	pub async fn run(&self, interval: std::time::Duration) {
		info!(?interval, "resolver started");
		loop {
			self.run_once().await;
			tokio::time::sleep(interval).await;
		}
	}

	/// Fetches build requirements and checks that every spec got an answer.
	async fn fetch_build_requires(&self, specs: &[BuildSpec]) -> Result<Vec<Vec<String>>> {
		if specs.is_empty() {
			return Ok(vec![]);
		}
		let requires = self.build_system.build_requires(specs).await?;
		if requires.len() != specs.len() {
			warn!(
				expected = specs.len(),
				actual = requires.len(),
				"build system returned wrong number of requirement lists"
			);
			return Err(BuildSystemError::CountMismatch {
				expected: specs.len(),
				actual: requires.len(),
			}
			.into());
		}
		Ok(requires)
	}
}

/// Drives `work` to completion, calling `renew` every `every` until it is done.
///
/// A failed renewal abandons the work.
async fn renewing<T>(
	work: impl Future<Output = Result<T>>,
	every: std::time::Duration,
	mut renew: impl AsyncFnMut() -> Result<()>,
) -> Result<T> {
	let mut work = pin!(work);
	loop {
		tokio::select! {
			out = work.as_mut() => return out,
			_ = tokio::time::sleep(every) => renew().await?,
		}
	}
}

#[derive(Debug, Error)]
pub enum ResolverError {
	#[error(transparent)]
	BackendError(#[from] BackendError),
	#[error("repo cache error: {0}")]
	RepoCacheError(#[from] RepoCacheError),
	#[error("build system error: {0}")]
	BuildSystemError(#[from] BuildSystemError),
}

impl From<diesel::result::Error> for ResolverError {
	fn from(value: diesel::result::Error) -> Self {
		Self::BackendError(value.into())
	}
}

pub type Result<T, E = ResolverError> = std::result::Result<T, E>;
