use diesel::{Insertable, Queryable, Selectable};
use vigil_common_model::build::BuildState;

use crate::{
	db::{schema::build, types::SqlBuildState},
	package::PackageRef,
	repo::RepoId,
};

pub type BuildRef = i64;

/// A row of the `build` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = build)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqlBuild {
	pub id: BuildRef,
	pub package_id: PackageRef,
	pub repo_id: Option<RepoId>,
	pub epoch: Option<i32>,
	pub version: String,
	pub release: String,
	pub state: i16,
	pub deps_resolved: bool,
	pub deps_processed: bool,
}

impl SqlBuild {
	pub fn state(&self) -> BuildState {
		SqlBuildState::from(self.state).into()
	}

	pub fn is_finished(&self) -> bool {
		self.state().is_finished()
	}
}

/// A newly registered build attempt.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = build)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewBuild {
	pub package_id: PackageRef,
	pub repo_id: Option<RepoId>,
	pub epoch: Option<i32>,
	pub version: String,
	pub release: String,
	pub state: i16,
}

impl NewBuild {
	pub fn new(
		package_id: PackageRef,
		version: impl Into<String>,
		release: impl Into<String>,
		state: BuildState,
	) -> Self {
		Self {
			package_id,
			repo_id: None,
			epoch: None,
			version: version.into(),
			release: release.into(),
			state: SqlBuildState::from(state) as i16,
		}
	}

	pub fn with_repo_id(mut self, repo_id: RepoId) -> Self {
		self.repo_id = Some(repo_id);
		self
	}
}
