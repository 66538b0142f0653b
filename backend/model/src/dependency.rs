use diesel::{Insertable, Queryable, Selectable};

use crate::{
	build::BuildRef,
	db::schema::{applied_change, dependency, unapplied_change},
	package::PackageRef,
	repo::RepoId,
};

/// One resolved dependency of a package, detached from its table row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = dependency)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DependencyEntry {
	pub name: String,
	pub epoch: i32,
	pub version: String,
	pub release: String,
	pub arch: String,
	pub distance: Option<i32>,
}

impl DependencyEntry {
	/// Identity used when comparing two snapshots.
	pub fn key(&self) -> (&str, i32, &str, &str) {
		(&self.name, self.epoch, &self.version, &self.release)
	}

	pub fn version(&self) -> DependencyVersion {
		DependencyVersion {
			epoch: self.epoch,
			version: self.version.clone(),
			release: self.release.clone(),
		}
	}

	pub fn to_row(&self, repo_id: RepoId, package_id: PackageRef) -> NewDependency {
		NewDependency {
			repo_id,
			package_id,
			name: self.name.clone(),
			epoch: self.epoch,
			version: self.version.clone(),
			release: self.release.clone(),
			arch: self.arch.clone(),
			distance: self.distance,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = dependency)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewDependency {
	pub repo_id: RepoId,
	pub package_id: PackageRef,
	pub name: String,
	pub epoch: i32,
	pub version: String,
	pub release: String,
	pub arch: String,
	pub distance: Option<i32>,
}

/// Epoch, version and release of one side of a dependency change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyVersion {
	pub epoch: i32,
	pub version: String,
	pub release: String,
}

/// Change of a single dependency between two snapshots.
///
/// `prev` is `None` for added dependencies, `curr` is `None` for removed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyChange {
	pub dep_name: String,
	pub prev: Option<DependencyVersion>,
	pub curr: Option<DependencyVersion>,
	pub distance: Option<i32>,
}

impl DependencyChange {
	pub fn into_unapplied(self, package_id: PackageRef, prev_build_id: BuildRef) -> NewUnappliedChange {
		let (prev_epoch, prev_version, prev_release) = split_version(self.prev);
		let (curr_epoch, curr_version, curr_release) = split_version(self.curr);
		NewUnappliedChange {
			package_id,
			prev_build_id,
			dep_name: self.dep_name,
			prev_epoch,
			prev_version,
			prev_release,
			curr_epoch,
			curr_version,
			curr_release,
			distance: self.distance,
		}
	}

	pub fn into_applied(self, build_id: BuildRef, prev_build_id: BuildRef) -> NewAppliedChange {
		let (prev_epoch, prev_version, prev_release) = split_version(self.prev);
		let (curr_epoch, curr_version, curr_release) = split_version(self.curr);
		NewAppliedChange {
			build_id,
			prev_build_id,
			dep_name: self.dep_name,
			prev_epoch,
			prev_version,
			prev_release,
			curr_epoch,
			curr_version,
			curr_release,
			distance: self.distance,
		}
	}
}

fn split_version(
	version: Option<DependencyVersion>,
) -> (Option<i32>, Option<String>, Option<String>) {
	match version {
		Some(v) => (Some(v.epoch), Some(v.version), Some(v.release)),
		None => (None, None, None),
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = unapplied_change)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewUnappliedChange {
	pub package_id: PackageRef,
	pub prev_build_id: BuildRef,
	pub dep_name: String,
	pub prev_epoch: Option<i32>,
	pub prev_version: Option<String>,
	pub prev_release: Option<String>,
	pub curr_epoch: Option<i32>,
	pub curr_version: Option<String>,
	pub curr_release: Option<String>,
	pub distance: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = applied_change)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewAppliedChange {
	pub build_id: BuildRef,
	pub prev_build_id: BuildRef,
	pub dep_name: String,
	pub prev_epoch: Option<i32>,
	pub prev_version: Option<String>,
	pub prev_release: Option<String>,
	pub curr_epoch: Option<i32>,
	pub curr_version: Option<String>,
	pub curr_release: Option<String>,
	pub distance: Option<i32>,
}

/// A row of the `unapplied_change` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = unapplied_change)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqlUnappliedChange {
	pub id: i64,
	pub package_id: PackageRef,
	pub prev_build_id: BuildRef,
	pub dep_name: String,
	pub prev_epoch: Option<i32>,
	pub prev_version: Option<String>,
	pub prev_release: Option<String>,
	pub curr_epoch: Option<i32>,
	pub curr_version: Option<String>,
	pub curr_release: Option<String>,
	pub distance: Option<i32>,
}

/// A row of the `applied_change` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = applied_change)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqlAppliedChange {
	pub id: i64,
	pub build_id: BuildRef,
	pub prev_build_id: BuildRef,
	pub dep_name: String,
	pub prev_epoch: Option<i32>,
	pub prev_version: Option<String>,
	pub prev_release: Option<String>,
	pub curr_epoch: Option<i32>,
	pub curr_version: Option<String>,
	pub curr_release: Option<String>,
	pub distance: Option<i32>,
}
