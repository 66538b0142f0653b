use vigil_common_model::{build::BuildState, package::ResolutionState};

/// Database representation of [BuildState].
///
/// Stored as a small integer column. Unknown values are decoded as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum SqlBuildState {
	/// [BuildState::Running]
	Running = 2,
	/// [BuildState::Complete]
	Complete = 3,
	/// [BuildState::Canceled]
	Canceled = 4,
	/// [BuildState::Failed]
	Failed = 5,
}

impl From<i16> for SqlBuildState {
	fn from(value: i16) -> Self {
		match value {
			2 => Self::Running,
			3 => Self::Complete,
			4 => Self::Canceled,
			5 => Self::Failed,
			_ => Self::Failed,
		}
	}
}

impl From<BuildState> for SqlBuildState {
	fn from(value: BuildState) -> Self {
		match value {
			BuildState::Running => Self::Running,
			BuildState::Complete => Self::Complete,
			BuildState::Canceled => Self::Canceled,
			BuildState::Failed => Self::Failed,
		}
	}
}

impl From<SqlBuildState> for BuildState {
	fn from(value: SqlBuildState) -> Self {
		match value {
			SqlBuildState::Running => Self::Running,
			SqlBuildState::Complete => Self::Complete,
			SqlBuildState::Canceled => Self::Canceled,
			SqlBuildState::Failed => Self::Failed,
		}
	}
}

impl SqlBuildState {
	/// Column values of [BuildState::FINISHED].
	pub fn finished() -> [i16; 3] {
		BuildState::FINISHED.map(|state| SqlBuildState::from(state) as i16)
	}
}

/// Encodes a [ResolutionState] into the nullable `package.resolved` column.
pub fn resolution_to_sql(state: ResolutionState) -> Option<bool> {
	match state {
		ResolutionState::Resolved => Some(true),
		ResolutionState::Unresolved => Some(false),
		ResolutionState::Unknown => None,
	}
}

/// Decodes the nullable `package.resolved` column.
pub fn resolution_from_sql(value: Option<bool>) -> ResolutionState {
	value.map(ResolutionState::from).unwrap_or_default()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_build_state_codes() {
		assert_eq!(SqlBuildState::from(3), SqlBuildState::Complete);
		assert_eq!(SqlBuildState::from(42), SqlBuildState::Failed);
		assert_eq!(SqlBuildState::finished(), [3, 5, 4]);
		assert_eq!(
			BuildState::from(SqlBuildState::from(SqlBuildState::Canceled as i16)),
			BuildState::Canceled
		);
	}

	#[test]
	fn test_resolution_column() {
		for state in [
			ResolutionState::Resolved,
			ResolutionState::Unresolved,
			ResolutionState::Unknown,
		] {
			assert_eq!(resolution_from_sql(resolution_to_sql(state)), state);
		}
	}
}
