//! Dependency snapshot and change queries.

use diesel::{ExpressionMethods, QueryDsl, delete, insert_into};
use vigil_backend_model::{
	build::BuildRef,
	db::{
		BoxedSqlConn, INSERT_CHUNK_SIZE,
		schema::{applied_change, dependency, unapplied_change},
	},
	dependency::{
		DependencyEntry, NewAppliedChange, NewUnappliedChange, SqlAppliedChange,
		SqlUnappliedChange,
	},
	package::PackageRef,
	repo::RepoId,
};

use crate::Result;

/// Loads the dependency snapshot of a package for a repo generation,
/// ordered by name.
pub async fn load_snapshot(
	conn: &mut BoxedSqlConn,
	repo_id: RepoId,
	package_id: PackageRef,
) -> Result<Vec<DependencyEntry>> {
	Ok(conn
		.load_select::<_, DependencyEntry, _>(
			dependency::table
				.filter(dependency::repo_id.eq(repo_id))
				.filter(dependency::package_id.eq(package_id))
				.order(dependency::name.asc()),
		)
		.await?)
}

/// Replaces the dependency snapshot of a package for a repo generation.
pub async fn replace_snapshot(
	conn: &mut BoxedSqlConn,
	repo_id: RepoId,
	package_id: PackageRef,
	entries: &[DependencyEntry],
) -> Result<()> {
	conn.execute(
		delete(dependency::table)
			.filter(dependency::repo_id.eq(repo_id))
			.filter(dependency::package_id.eq(package_id)),
	)
	.await?;
	for chunk in entries.chunks(INSERT_CHUNK_SIZE) {
		let rows = chunk
			.iter()
			.map(|entry| entry.to_row(repo_id, package_id))
			.collect::<Vec<_>>();
		conn.execute(insert_into(dependency::table).values(rows))
			.await?;
	}
	Ok(())
}

/// Deletes dependencies of a package from generations before `repo_id`.
pub async fn prune(
	conn: &mut BoxedSqlConn,
	package_id: PackageRef,
	repo_id: RepoId,
) -> Result<usize> {
	Ok(conn
		.execute(
			delete(dependency::table)
				.filter(dependency::package_id.eq(package_id))
				.filter(dependency::repo_id.lt(repo_id)),
		)
		.await?)
}

/// Repo generations a package has dependency snapshots for, ascending.
pub async fn snapshot_repo_ids(
	conn: &mut BoxedSqlConn,
	package_id: PackageRef,
) -> Result<Vec<RepoId>> {
	Ok(conn
		.load::<_, RepoId>(
			dependency::table
				.filter(dependency::package_id.eq(package_id))
				.select(dependency::repo_id)
				.distinct()
				.order(dependency::repo_id.asc()),
		)
		.await?)
}

/// Replaces every unapplied change.
pub async fn replace_unapplied_changes(
	conn: &mut BoxedSqlConn,
	changes: &[NewUnappliedChange],
) -> Result<()> {
	conn.execute(delete(unapplied_change::table)).await?;
	for chunk in changes.chunks(INSERT_CHUNK_SIZE) {
		conn.execute(insert_into(unapplied_change::table).values(chunk.to_vec()))
			.await?;
	}
	Ok(())
}

pub async fn insert_applied_changes(
	conn: &mut BoxedSqlConn,
	changes: &[NewAppliedChange],
) -> Result<()> {
	for chunk in changes.chunks(INSERT_CHUNK_SIZE) {
		conn.execute(insert_into(applied_change::table).values(chunk.to_vec()))
			.await?;
	}
	Ok(())
}

/// Loads every unapplied change in insertion order.
pub async fn load_unapplied_changes(conn: &mut BoxedSqlConn) -> Result<Vec<SqlUnappliedChange>> {
	Ok(conn
		.load::<_, SqlUnappliedChange>(unapplied_change::table.order(unapplied_change::id.asc()))
		.await?)
}

pub async fn load_applied_changes(
	conn: &mut BoxedSqlConn,
	build_id: BuildRef,
) -> Result<Vec<SqlAppliedChange>> {
	Ok(conn
		.load::<_, SqlAppliedChange>(
			applied_change::table
				.filter(applied_change::build_id.eq(build_id))
				.order(applied_change::id.asc()),
		)
		.await?)
}
