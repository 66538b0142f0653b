//! Repo generation, problem and request queries.

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, delete, dsl::max, insert_into};
use vigil_backend_model::{
	db::{
		BoxedSqlConn, INSERT_CHUNK_SIZE,
		schema::{buildroot_problem, repo, repo_generation_request, resolution_problem},
	},
	package::PackageRef,
	repo::{NewBuildrootProblem, NewResolutionProblem, RepoId, SqlRepo},
};

use crate::Result;

/// ID of the newest processed repo generation.
pub async fn latest_repo_id(conn: &mut BoxedSqlConn) -> Result<Option<RepoId>> {
	Ok(conn
		.get_result::<_, Option<RepoId>>(repo::table.select(max(repo::repo_id)))
		.await?)
}

pub async fn load(conn: &mut BoxedSqlConn, repo_id: RepoId) -> Result<Option<SqlRepo>> {
	Ok(conn
		.first::<_, SqlRepo>(repo::table.filter(repo::repo_id.eq(repo_id)))
		.await
		.optional()?)
}

/// Stores a repo generation, replacing an earlier record of it.
pub async fn save(conn: &mut BoxedSqlConn, record: &SqlRepo) -> Result<()> {
	conn.execute(delete(repo::table).filter(repo::repo_id.eq(record.repo_id)))
		.await?;
	conn.execute(insert_into(repo::table).values(record))
		.await?;
	Ok(())
}

/// Replaces the base build group problems of a repo generation.
pub async fn replace_buildroot_problems(
	conn: &mut BoxedSqlConn,
	repo_id: RepoId,
	problems: &[String],
) -> Result<()> {
	conn.execute(delete(buildroot_problem::table).filter(buildroot_problem::repo_id.eq(repo_id)))
		.await?;
	for chunk in problems.chunks(INSERT_CHUNK_SIZE) {
		let rows = chunk
			.iter()
			.map(|problem| NewBuildrootProblem {
				repo_id,
				problem: problem.clone(),
			})
			.collect::<Vec<_>>();
		conn.execute(insert_into(buildroot_problem::table).values(rows))
			.await?;
	}
	Ok(())
}

pub async fn load_buildroot_problems(
	conn: &mut BoxedSqlConn,
	repo_id: RepoId,
) -> Result<Vec<String>> {
	Ok(conn
		.load::<_, String>(
			buildroot_problem::table
				.filter(buildroot_problem::repo_id.eq(repo_id))
				.order(buildroot_problem::id.asc())
				.select(buildroot_problem::problem),
		)
		.await?)
}

/// Replaces every resolution problem.
pub async fn replace_resolution_problems(
	conn: &mut BoxedSqlConn,
	problems: &[NewResolutionProblem],
) -> Result<()> {
	conn.execute(delete(resolution_problem::table)).await?;
	for chunk in problems.chunks(INSERT_CHUNK_SIZE) {
		conn.execute(insert_into(resolution_problem::table).values(chunk.to_vec()))
			.await?;
	}
	Ok(())
}

/// Loads every resolution problem in insertion order.
pub async fn load_resolution_problems(
	conn: &mut BoxedSqlConn,
) -> Result<Vec<(PackageRef, RepoId, String)>> {
	Ok(conn
		.load::<_, (PackageRef, RepoId, String)>(
			resolution_problem::table
				.order(resolution_problem::id.asc())
				.select((
					resolution_problem::package_id,
					resolution_problem::repo_id,
					resolution_problem::problem,
				)),
		)
		.await?)
}

/// Queues a request to process a repo generation.
pub async fn enqueue_request(conn: &mut BoxedSqlConn, repo_id: RepoId) -> Result<()> {
	conn.execute(
		insert_into(repo_generation_request::table)
			.values(repo_generation_request::repo_id.eq(repo_id)),
	)
	.await?;
	Ok(())
}

/// The highest requested repo generation.
pub async fn latest_request(conn: &mut BoxedSqlConn) -> Result<Option<RepoId>> {
	Ok(conn
		.get_result::<_, Option<RepoId>>(
			repo_generation_request::table.select(max(repo_generation_request::repo_id)),
		)
		.await?)
}

/// Deletes requests for generations up to and including `repo_id`.
pub async fn delete_requests_up_to(conn: &mut BoxedSqlConn, repo_id: RepoId) -> Result<usize> {
	Ok(conn
		.execute(
			delete(repo_generation_request::table)
				.filter(repo_generation_request::repo_id.le(repo_id)),
		)
		.await?)
}

pub async fn pending_requests(conn: &mut BoxedSqlConn) -> Result<Vec<RepoId>> {
	Ok(conn
		.load::<_, RepoId>(
			repo_generation_request::table
				.order(repo_generation_request::repo_id.asc())
				.select(repo_generation_request::repo_id),
		)
		.await?)
}
