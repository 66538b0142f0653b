//! Build system client.

use std::{fmt::Debug, io::ErrorKind, path::PathBuf};

use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::universe::SRC_ARCH;

/// Identifies a build whose requirements are queried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildSpec {
	pub name: String,
	pub version: String,
	pub release: String,
	pub arch: String,
}

impl BuildSpec {
	/// Spec of a source package.
	pub fn source(
		name: impl Into<String>,
		version: impl Into<String>,
		release: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
			release: release.into(),
			arch: SRC_ARCH.to_string(),
		}
	}

	/// `name-version-release.arch`, usable as a file name.
	///
	/// Fails when a component is empty or contains a path separator.
	pub fn nvra(&self) -> Result<String, BuildSystemError> {
		let nvra = format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch);
		let parts = [&self.name, &self.version, &self.release, &self.arch];
		if parts
			.iter()
			.any(|part| part.is_empty() || part.contains(['/', '\\', '\0']))
		{
			return Err(BuildSystemError::InvalidSpec(nvra));
		}
		Ok(nvra)
	}
}

pub trait BuildSystemClient
where
	Self: Send + Sync + Debug,
{
	/// Names of the packages in the base build group.
	fn build_group_members(&self) -> BoxFuture<'_, Result<Vec<String>, BuildSystemError>>;

	/// Build requirements of each spec, in the order of `specs`.
	fn build_requires<'a>(
		&'a self,
		specs: &'a [BuildSpec],
	) -> BoxFuture<'a, Result<Vec<Vec<String>>, BuildSystemError>>;

	/// Synchronizes the latest build records.
	fn refresh_latest_builds(&self) -> BoxFuture<'_, Result<(), BuildSystemError>>;
}

#[derive(Debug, Error)]
pub enum BuildSystemError {
	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
	#[error("no build requirements known for {0}")]
	MissingRequires(String),
	#[error("invalid build spec: {0:?}")]
	InvalidSpec(String),
	#[error("expected {expected} requirement lists, got {actual}")]
	CountMismatch { expected: usize, actual: usize },
}

/// Configuration for [`DirBuildSystem`].
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSystemConfig {
	/// Directory with `build-group.json` and `requires/<nvra>.json`.
	pub directory: PathBuf,
}

/// Build system client reading exported JSON files.
#[derive(Debug)]
pub struct DirBuildSystem {
	directory: PathBuf,
}

impl DirBuildSystem {
	pub fn new(config: &BuildSystemConfig) -> Self {
		Self {
			directory: config.directory.clone(),
		}
	}

	async fn read_requires(&self, specs: &[BuildSpec]) -> Result<Vec<Vec<String>>, BuildSystemError> {
		let mut requires = Vec::with_capacity(specs.len());
		for spec in specs {
			let nvra = spec.nvra()?;
			let path = self.directory.join("requires").join(format!("{}.json", nvra));
			let json = match tokio::fs::read_to_string(&path).await {
				Ok(json) => json,
				Err(error) if error.kind() == ErrorKind::NotFound => {
					return Err(BuildSystemError::MissingRequires(nvra));
				}
				Err(error) => return Err(error.into()),
			};
			requires.push(serde_json::from_str(&json)?);
		}
		Ok(requires)
	}
}

impl BuildSystemClient for DirBuildSystem {
	fn build_group_members(&self) -> BoxFuture<'_, Result<Vec<String>, BuildSystemError>> {
		async move {
			let json = tokio::fs::read_to_string(self.directory.join("build-group.json")).await?;
			Ok(serde_json::from_str(&json)?)
		}
		.boxed()
	}

	fn build_requires<'a>(
		&'a self,
		specs: &'a [BuildSpec],
	) -> BoxFuture<'a, Result<Vec<Vec<String>>, BuildSystemError>> {
		self.read_requires(specs).boxed()
	}

	fn refresh_latest_builds(&self) -> BoxFuture<'_, Result<(), BuildSystemError>> {
		async move {
			debug!("latest builds are registered externally");
			Ok(())
		}
		.boxed()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn test_dir_build_system() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir(dir.path().join("requires")).unwrap();
		std::fs::write(dir.path().join("build-group.json"), r#"["bash", "rpm-build"]"#).unwrap();
		std::fs::write(
			dir.path().join("requires/rnv-1.7.11-1.src.json"),
			r#"["gcc", "expat-devel >= 2"]"#,
		)
		.unwrap();

		let client = DirBuildSystem::new(&BuildSystemConfig {
			directory: dir.path().to_owned(),
		});
		assert_eq!(
			client.build_group_members().await.unwrap(),
			vec!["bash".to_string(), "rpm-build".to_string()]
		);
		let specs = [BuildSpec::source("rnv", "1.7.11", "1")];
		assert_eq!(
			client.build_requires(&specs).await.unwrap(),
			vec![vec!["gcc".to_string(), "expat-devel >= 2".to_string()]]
		);
		let missing = [BuildSpec::source("rnv", "1.7.11", "2")];
		assert!(matches!(
			client.build_requires(&missing).await,
			Err(BuildSystemError::MissingRequires(nvra)) if nvra == "rnv-1.7.11-2.src"
		));
		client.refresh_latest_builds().await.unwrap();
	}

	#[tokio::test]
	async fn test_spec_stays_in_directory() {
		let dir = tempfile::tempdir().unwrap();
		let inner = dir.path().join("builds");
		std::fs::create_dir_all(inner.join("requires")).unwrap();
		std::fs::write(dir.path().join("secret-1-1.src.json"), r#"["leaked"]"#).unwrap();

		let client = DirBuildSystem::new(&BuildSystemConfig { directory: inner });
		let specs = [BuildSpec::source("../../secret", "1", "1")];
		assert!(matches!(
			client.build_requires(&specs).await,
			Err(BuildSystemError::InvalidSpec(_))
		));

		for spec in [
			BuildSpec::source("rnv", "1/2", "1"),
			BuildSpec::source("rnv", "1", "a\\b"),
			BuildSpec::source("", "1", "1"),
		] {
			assert!(matches!(spec.nvra(), Err(BuildSystemError::InvalidSpec(_))));
		}
		assert_eq!(
			BuildSpec::source("rnv", "1.7.11", "1").nvra().unwrap(),
			"rnv-1.7.11-1.src"
		);
	}
}
