use diesel::{Insertable, Queryable, Selectable};
use vigil_common_model::{
	build::BuildState,
	package::{PackageStatus, ResolutionState},
};

use crate::db::{schema::package, types::resolution_from_sql};

pub type PackageRef = i64;

/// A row of the `package` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = package)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqlPackage {
	pub id: PackageRef,
	pub name: String,
	pub tracked: bool,
	pub blocked: bool,
	pub resolved: Option<bool>,
	pub last_build_id: Option<i64>,
	pub last_complete_build_id: Option<i64>,
}

impl SqlPackage {
	pub fn resolution(&self) -> ResolutionState {
		resolution_from_sql(self.resolved)
	}

	/// Status label given the state of the last complete build.
	pub fn status(&self, last_complete_build: Option<BuildState>) -> PackageStatus {
		PackageStatus::derive(
			self.tracked,
			self.blocked,
			self.resolution(),
			last_complete_build,
		)
	}
}

/// A package registered by the package list synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = package)]
pub struct NewPackage {
	pub name: String,
	pub tracked: bool,
	pub blocked: bool,
}

impl NewPackage {
	pub fn tracked(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			tracked: true,
			blocked: false,
		}
	}
}
