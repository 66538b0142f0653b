//! Vigil backend services.

use std::sync::Arc;

use bus::{BoxedBusService, RedisBusService};
use config::BackendConfig;
use database::{DatabaseError, DatabaseService};
use thiserror::Error;
use tracing::info;

use crate::redis::{RedisError, RedisService};

pub mod build;
pub mod bus;
pub mod config;
pub mod database;
pub mod dependency;
pub mod package;
pub mod redis;
pub mod repo;

/// Service container for Vigil backends.
///
/// All services are wrapped with [`Arc`].
#[derive(Debug, Clone)]
pub struct BackendServices {
	pub config: Arc<BackendConfig>,
	pub redis: Option<Arc<RedisService>>,
	pub database: Arc<DatabaseService>,
	/// Present when Redis is configured.
	pub bus: Option<Arc<BoxedBusService>>,
}

impl BackendServices {
	#[tracing::instrument(skip(config))]
	pub async fn new(config: BackendConfig) -> Result<Self> {
		let config = Arc::new(config);
		let redis = match &config.redis {
			Some(redis) => Some(Arc::new(RedisService::new(redis)?)),
			None => {
				info!("redis is not configured, locks and bus are disabled");
				None
			}
		};
		let database = Arc::new(DatabaseService::new(&config.database, redis.as_deref()).await?);
		let bus = redis.as_ref().map(|redis| {
			Arc::new(Box::new(RedisBusService::new(redis.clone())) as BoxedBusService)
		});

		Ok(Self {
			config,
			redis,
			database,
			bus,
		})
	}
}

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
	#[error(transparent)]
	DatabaseError(#[from] DatabaseError),
	#[error(transparent)]
	RedisError(#[from] RedisError),
}

/// A specialized [`Result`] for backend errors.
pub type Result<T, E = BackendError> = std::result::Result<T, E>;

impl From<diesel::result::Error> for BackendError {
	fn from(value: diesel::result::Error) -> Self {
		Self::DatabaseError(DatabaseError::QueryError(value))
	}
}
