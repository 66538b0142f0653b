use serde::{Deserialize, Serialize};
use vigil_backend_service::{config::BackendConfig, database::DatabaseConfig, redis::RedisConfig};
use vigil_resolver::{
	build_system::BuildSystemConfig, config::DependencyConfig, repo_cache::RepoCacheConfig,
};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverdConfig {
	/// Seconds between polling cycles.
	#[serde(default = "default_poll_interval")]
	pub poll_interval: u64,
	pub database: DatabaseConfig,
	#[serde(default)]
	pub redis: Option<RedisConfig>,
	#[serde(default)]
	pub dependency: DependencyConfig,
	pub repo_cache: RepoCacheConfig,
	pub build_system: BuildSystemConfig,
}

fn default_poll_interval() -> u64 {
	120
}

impl TryFrom<ResolverdConfig> for BackendConfig {
	type Error = anyhow::Error;

	fn try_from(config: ResolverdConfig) -> Result<Self, Self::Error> {
		Ok(BackendConfig {
			database: config.database,
			redis: config.redis,
		})
	}
}
