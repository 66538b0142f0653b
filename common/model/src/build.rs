use serde::{Deserialize, Serialize};

/// State of one build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
	/// The build is still running in the build system.
	Running,
	/// The build finished successfully.
	Complete,
	/// The build was canceled before it finished.
	Canceled,
	/// The build finished with a failure.
	Failed,
}

impl BuildState {
	/// States in which a build will not change anymore.
	pub const FINISHED: [BuildState; 3] = [Self::Complete, Self::Failed, Self::Canceled];

	pub fn is_finished(&self) -> bool {
		Self::FINISHED.contains(self)
	}
}
