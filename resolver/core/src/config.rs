use serde::{Deserialize, Serialize};

use crate::distance::DEFAULT_MAX_DISTANCE;

/// Dependency resolution settings.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependencyConfig {
	/// Base architecture of package universes.
	#[serde(default = "default_for_arch")]
	pub for_arch: String,
	/// Number of builds per package whose dependency snapshots are kept.
	#[serde(default = "default_keep_build_deps_for")]
	pub keep_build_deps_for: usize,
	/// Dependencies this far or further from the build requirements get no
	/// distance.
	#[serde(default = "default_max_distance")]
	pub max_distance: i32,
}

fn default_for_arch() -> String {
	"x86_64".to_string()
}

fn default_keep_build_deps_for() -> usize {
	3
}

fn default_max_distance() -> i32 {
	DEFAULT_MAX_DISTANCE
}

impl Default for DependencyConfig {
	fn default() -> Self {
		Self {
			for_arch: default_for_arch(),
			keep_build_deps_for: default_keep_build_deps_for(),
			max_distance: default_max_distance(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_defaults() {
		let config: DependencyConfig = serde_json::from_str(r#"{"keep-build-deps-for": 5}"#).unwrap();
		assert_eq!(
			config,
			DependencyConfig {
				keep_build_deps_for: 5,
				..Default::default()
			}
		);
	}
}
