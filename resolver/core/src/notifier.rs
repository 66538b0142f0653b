//! Package state transition notifications.

use std::{fmt::Debug, sync::Arc};

use futures::{
	FutureExt,
	future::{BoxFuture, ready},
};
use tracing::info;
use vigil_backend_model::{bus::BackendBusMessage, package::SqlPackage};
use vigil_backend_service::{BackendError, bus::BoxedBusService};
use vigil_common_model::package::PackageStatus;

/// A change of the resolution state of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
	/// The package with its updated resolution state.
	pub package: SqlPackage,
	pub prev_state: PackageStatus,
	pub new_state: PackageStatus,
}

pub trait StateNotifier
where
	Self: Send + Sync + Debug,
{
	fn notify<'a>(&'a self, transition: &'a StateTransition) -> BoxFuture<'a, Result<(), BackendError>>;
}

/// Publishes state changes on the backend bus.
#[derive(Debug)]
pub struct BusNotifier {
	bus: Arc<BoxedBusService>,
}

impl BusNotifier {
	pub fn new(bus: Arc<BoxedBusService>) -> Self {
		Self { bus }
	}
}

impl StateNotifier for BusNotifier {
	fn notify<'a>(&'a self, transition: &'a StateTransition) -> BoxFuture<'a, Result<(), BackendError>> {
		if transition.prev_state == transition.new_state {
			return ready(Ok(())).boxed();
		}
		self.bus.broadcast(BackendBusMessage::PackageStateChanged {
			package: transition.package.id,
			name: transition.package.name.clone(),
			prev_state: transition.prev_state,
			new_state: transition.new_state,
		})
	}
}

/// Logs state changes.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl StateNotifier for LogNotifier {
	fn notify<'a>(&'a self, transition: &'a StateTransition) -> BoxFuture<'a, Result<(), BackendError>> {
		info!(
			package = %transition.package.name,
			prev_state = %transition.prev_state,
			new_state = %transition.new_state,
			"package state changed"
		);
		ready(Ok(())).boxed()
	}
}

#[cfg(test)]
mod test {
	use std::sync::Mutex;

	use vigil_backend_service::bus::BackendBusService;

	use super::*;

	#[derive(Debug, Default)]
	struct RecordingBus(Mutex<Vec<BackendBusMessage>>);

	impl BackendBusService for RecordingBus {
		fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<(), BackendError>> {
			self.0.lock().unwrap().push(message);
			ready(Ok(())).boxed()
		}
	}

	fn transition(prev_state: PackageStatus, new_state: PackageStatus) -> StateTransition {
		StateTransition {
			package: SqlPackage {
				id: 1,
				name: "rnv".to_string(),
				tracked: true,
				blocked: false,
				resolved: Some(false),
				last_build_id: None,
				last_complete_build_id: None,
			},
			prev_state,
			new_state,
		}
	}

	#[tokio::test]
	async fn test_bus_notifier() {
		let bus = Arc::new(RecordingBus::default());
		let boxed: BoxedBusService = Box::new(RecordingBusRef(bus.clone()));
		let notifier = BusNotifier::new(Arc::new(boxed));

		notifier
			.notify(&transition(PackageStatus::Ok, PackageStatus::Unresolved))
			.await
			.unwrap();
		notifier
			.notify(&transition(PackageStatus::Unknown, PackageStatus::Unknown))
			.await
			.unwrap();
		LogNotifier
			.notify(&transition(PackageStatus::Ok, PackageStatus::Unresolved))
			.await
			.unwrap();

		let messages = bus.0.lock().unwrap();
		assert_eq!(
			*messages,
			vec![BackendBusMessage::PackageStateChanged {
				package: 1,
				name: "rnv".to_string(),
				prev_state: PackageStatus::Ok,
				new_state: PackageStatus::Unresolved,
			}]
		);
	}

	#[derive(Debug)]
	struct RecordingBusRef(Arc<RecordingBus>);

	impl BackendBusService for RecordingBusRef {
		fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<(), BackendError>> {
			self.0.broadcast(message)
		}
	}
}
