use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::build::BuildState;

/// Whether the build requirements of a package are installable against
/// the latest repository generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
	Resolved,
	Unresolved,
	/// The package has not been resolved against any generation yet.
	#[default]
	Unknown,
}

impl From<bool> for ResolutionState {
	fn from(value: bool) -> Self {
		if value { Self::Resolved } else { Self::Unresolved }
	}
}

/// User-facing state of a package.
///
/// This is the label published whenever a package changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
	/// The package is untracked or blocked.
	Ignored,
	/// Build requirements of the package cannot be satisfied.
	Unresolved,
	/// The last complete build succeeded.
	Ok,
	/// The last complete build failed.
	Failing,
	Unknown,
}

impl PackageStatus {
	pub fn derive(
		tracked: bool,
		blocked: bool,
		resolution: ResolutionState,
		last_complete_build: Option<BuildState>,
	) -> Self {
		if blocked || !tracked {
			return Self::Ignored;
		}
		if resolution == ResolutionState::Unresolved {
			return Self::Unresolved;
		}
		match last_complete_build {
			Some(BuildState::Complete) => Self::Ok,
			Some(BuildState::Failed) => Self::Failing,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PackageStatus::Ignored => "ignored",
			PackageStatus::Unresolved => "unresolved",
			PackageStatus::Ok => "ok",
			PackageStatus::Failing => "failing",
			PackageStatus::Unknown => "unknown",
		}
	}
}

impl Display for PackageStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_status_labels() {
		use ResolutionState::*;

		let status = |tracked, blocked, resolution, build| {
			PackageStatus::derive(tracked, blocked, resolution, build)
		};
		assert_eq!(status(false, false, Resolved, None), PackageStatus::Ignored);
		assert_eq!(status(true, true, Unresolved, None), PackageStatus::Ignored);
		assert_eq!(
			status(true, false, Unresolved, Some(BuildState::Complete)),
			PackageStatus::Unresolved
		);
		assert_eq!(
			status(true, false, Resolved, Some(BuildState::Complete)),
			PackageStatus::Ok
		);
		assert_eq!(
			status(true, false, Unknown, Some(BuildState::Failed)),
			PackageStatus::Failing
		);
		assert_eq!(status(true, false, Resolved, None), PackageStatus::Unknown);
		assert_eq!(PackageStatus::Failing.to_string(), "failing");
	}
}
