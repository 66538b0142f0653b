use serde::{Deserialize, Serialize};

use crate::{database::DatabaseConfig, redis::RedisConfig};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct BackendConfig {
	pub database: DatabaseConfig,
	/// Redis is optional. Without it, there are no distributed locks and
	/// nothing is published on the backend bus.
	#[serde(default)]
	pub redis: Option<RedisConfig>,
}
