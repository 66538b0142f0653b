//! Backend bus

use serde::{Deserialize, Serialize};
use vigil_common_model::package::PackageStatus;

use crate::package::PackageRef;

/// A backend bus message that is broadcasted across the backend bus.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
#[serde(tag = "t", rename_all = "kebab-case")]
pub enum BackendBusMessage {
	/// The user-facing state of a package changed.
	PackageStateChanged {
		package: PackageRef,
		name: String,
		prev_state: PackageStatus,
		new_state: PackageStatus,
	},
}

/// Key for distributed locking
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum LockKey {
	Misc(&'static str),
}

impl LockKey {
	pub fn to_key(&self) -> String {
		match self {
			LockKey::Misc(key) => format!("lock:misc:{}", key),
		}
	}
}

impl From<&'static str> for LockKey {
	fn from(value: &'static str) -> Self {
		Self::Misc(value)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_lock_keys() {
		assert_eq!(LockKey::from("sql-migration").to_key(), "lock:misc:sql-migration");
		assert_eq!(LockKey::from("repo-generation").to_key(), "lock:misc:repo-generation");
	}

	#[test]
	fn test_message_format() {
		let message = BackendBusMessage::PackageStateChanged {
			package: 3,
			name: "rnv".to_string(),
			prev_state: PackageStatus::Ok,
			new_state: PackageStatus::Unresolved,
		};
		let json = serde_json::to_value(&message).unwrap();
		assert_eq!(json["t"], "package-state-changed");
		assert_eq!(json["prev_state"], "ok");
		assert_eq!(json["new_state"], "unresolved");
		assert_eq!(serde_json::from_value::<BackendBusMessage>(json).unwrap(), message);
	}
}
