use diesel::{Insertable, Queryable, Selectable};

use crate::{
	db::schema::{buildroot_problem, repo, resolution_problem},
	package::PackageRef,
};

/// Repo generation ID.
///
/// Generations are numbered by the build system in increasing order.
pub type RepoId = i64;

/// A row of the `repo` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = repo)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqlRepo {
	pub repo_id: RepoId,
	pub base_resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = resolution_problem)]
pub struct NewResolutionProblem {
	pub package_id: PackageRef,
	pub repo_id: RepoId,
	pub problem: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = buildroot_problem)]
pub struct NewBuildrootProblem {
	pub repo_id: RepoId,
	pub problem: String,
}
