//! Backend bus

use std::{fmt::Debug, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use vigil_backend_model::bus::BackendBusMessage;

use crate::{Result, redis::RedisService};

pub trait BackendBusService
where
	Self: Send + Sync + Debug,
{
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>>;
}

pub type BoxedBusService = Box<dyn BackendBusService + 'static>;

pub const BACKEND_BUS_CHANNEL: &str = "bus:backend";

/// Bus publishing JSON encoded messages on a Redis channel.
#[derive(Debug)]
pub struct RedisBusService {
	redis: Arc<RedisService>,
}

impl RedisBusService {
	pub fn new(redis: Arc<RedisService>) -> Self {
		Self { redis }
	}
}

impl BackendBusService for RedisBusService {
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>> {
		async move {
			let message = serde_json::to_string(&message)?;
			self.redis
				.publish(BACKEND_BUS_CHANNEL, message.as_str())
				.await?;
			Ok(())
		}
		.boxed()
	}
}
