//! Repo snapshots by generation.

use std::{
	collections::VecDeque,
	fmt::Debug,
	io::ErrorKind,
	path::PathBuf,
	sync::{Arc, Mutex, PoisonError},
};

use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use vigil_backend_model::repo::RepoId;

use crate::universe::PackageUniverse;

/// Source of package universes.
pub trait RepoCache
where
	Self: Send + Sync + Debug,
{
	/// Returns the universe of a repo generation, or `None` when there is no
	/// snapshot for it.
	fn snapshot(
		&self,
		repo_id: RepoId,
	) -> BoxFuture<'_, Result<Option<Arc<PackageUniverse>>, RepoCacheError>>;
}

#[derive(Debug, Error)]
pub enum RepoCacheError {
	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
	#[error("malformed snapshot of repo {repo_id}: {source}")]
	MalformedSnapshot {
		repo_id: RepoId,
		source: serde_json::Error,
	},
}

/// Configuration for [`DirRepoCache`].
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoCacheConfig {
	/// Directory containing `<repo_id>.json` snapshots.
	pub directory: PathBuf,
	/// Number of universes kept in memory.
	#[serde(default = "default_capacity")]
	pub capacity: usize,
}

fn default_capacity() -> usize {
	4
}

/// Repo cache reading JSON snapshots from a directory.
///
/// Loaded universes are kept in memory, the oldest loaded generation is
/// evicted first.
#[derive(Debug)]
pub struct DirRepoCache {
	directory: PathBuf,
	base_arch: String,
	capacity: usize,
	loaded: Mutex<VecDeque<(RepoId, Arc<PackageUniverse>)>>,
}

impl DirRepoCache {
	pub fn new(config: &RepoCacheConfig, base_arch: &str) -> Self {
		Self {
			directory: config.directory.clone(),
			base_arch: base_arch.to_string(),
			capacity: config.capacity.max(1),
			loaded: Mutex::new(VecDeque::new()),
		}
	}

	fn cached(&self, repo_id: RepoId) -> Option<Arc<PackageUniverse>> {
		let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
		loaded
			.iter()
			.find(|(id, _)| *id == repo_id)
			.map(|(_, universe)| universe.clone())
	}

	fn insert(&self, repo_id: RepoId, universe: Arc<PackageUniverse>) {
		let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
		loaded.retain(|(id, _)| *id != repo_id);
		while loaded.len() >= self.capacity {
			loaded.pop_front();
		}
		loaded.push_back((repo_id, universe));
	}

	async fn load(&self, repo_id: RepoId) -> Result<Option<Arc<PackageUniverse>>, RepoCacheError> {
		if let Some(universe) = self.cached(repo_id) {
			debug!(repo_id, "repo snapshot cache hit");
			return Ok(Some(universe));
		}
		let path = self.directory.join(format!("{}.json", repo_id));
		let json = match tokio::fs::read_to_string(&path).await {
			Ok(json) => json,
			Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
			Err(error) => return Err(error.into()),
		};
		let universe = PackageUniverse::from_json(&self.base_arch, &json)
			.map_err(|source| RepoCacheError::MalformedSnapshot { repo_id, source })?;
		info!(repo_id, packages = universe.len(), "loaded repo snapshot");
		let universe = Arc::new(universe);
		self.insert(repo_id, universe.clone());
		Ok(Some(universe))
	}
}

impl RepoCache for DirRepoCache {
	fn snapshot(
		&self,
		repo_id: RepoId,
	) -> BoxFuture<'_, Result<Option<Arc<PackageUniverse>>, RepoCacheError>> {
		self.load(repo_id).boxed()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn write_snapshot(dir: &std::path::Path, repo_id: RepoId, name: &str) {
		let json = format!(
			r#"[{{"name": "{}", "version": "1", "release": "1", "arch": "noarch"}}]"#,
			name
		);
		std::fs::write(dir.join(format!("{}.json", repo_id)), json).unwrap();
	}

	#[tokio::test]
	async fn test_dir_repo_cache() {
		let dir = tempfile::tempdir().unwrap();
		write_snapshot(dir.path(), 1, "foo");
		write_snapshot(dir.path(), 2, "bar");
		std::fs::write(dir.path().join("3.json"), "not json").unwrap();

		let cache = DirRepoCache::new(
			&RepoCacheConfig {
				directory: dir.path().to_owned(),
				capacity: 1,
			},
			"x86_64",
		);
		let first = cache.snapshot(1).await.unwrap().unwrap();
		assert_eq!(first.by_name("foo"), &[0]);
		assert!(Arc::ptr_eq(&first, &cache.snapshot(1).await.unwrap().unwrap()));

		// evicts generation 1
		cache.snapshot(2).await.unwrap().unwrap();
		std::fs::remove_file(dir.path().join("1.json")).unwrap();
		assert!(cache.snapshot(1).await.unwrap().is_none());

		assert!(cache.snapshot(4).await.unwrap().is_none());
		assert!(matches!(
			cache.snapshot(3).await,
			Err(RepoCacheError::MalformedSnapshot { repo_id: 3, .. })
		));
	}
}
