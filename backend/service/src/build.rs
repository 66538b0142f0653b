//! Build queries.

use std::collections::HashMap;

use diesel::{
	BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl, insert_into, update,
};
use vigil_backend_model::{
	build::{BuildRef, NewBuild, SqlBuild},
	db::{
		BoxedSqlConn, INSERT_CHUNK_SIZE,
		schema::{build, package},
		types::SqlBuildState,
	},
	package::{PackageRef, SqlPackage},
};
use vigil_common_model::build::BuildState;

use crate::{BackendError, Result};

/// Registers a build attempt and points its package at it.
pub async fn register(conn: &mut BoxedSqlConn, new: &NewBuild) -> Result<BuildRef> {
	conn.transaction::<_, BackendError, _>(async |conn| {
		let id = conn
			.get_result::<_, BuildRef>(insert_into(build::table).values(new).returning(build::id))
			.await?;
		conn.execute(
			update(package::table.filter(package::id.eq(new.package_id)))
				.set(package::last_build_id.eq(id)),
		)
		.await?;
		update_last_complete(conn, new.package_id, id, SqlBuildState::from(new.state).into())
			.await?;
		Ok(id)
	})
	.await
}

/// Records the new state of a build.
pub async fn set_state(conn: &mut BoxedSqlConn, id: BuildRef, state: BuildState) -> Result<()> {
	conn.transaction::<_, BackendError, _>(async |conn| {
		let package_id = conn
			.get_result::<_, PackageRef>(
				update(build::table.filter(build::id.eq(id)))
					.set(build::state.eq(SqlBuildState::from(state) as i16))
					.returning(build::package_id),
			)
			.await?;
		update_last_complete(conn, package_id, id, state).await
	})
	.await
}

async fn update_last_complete(
	conn: &mut BoxedSqlConn,
	package_id: PackageRef,
	id: BuildRef,
	state: BuildState,
) -> Result<()> {
	if matches!(state, BuildState::Complete | BuildState::Failed) {
		conn.execute(
			update(package::table.filter(package::id.eq(package_id)))
				.set(package::last_complete_build_id.eq(id)),
		)
		.await?;
	}
	Ok(())
}

pub async fn load(conn: &mut BoxedSqlConn, id: BuildRef) -> Result<Option<SqlBuild>> {
	Ok(conn
		.first::<_, SqlBuild>(build::table.filter(build::id.eq(id)))
		.await
		.optional()?)
}

pub async fn load_by_ids(conn: &mut BoxedSqlConn, ids: &[BuildRef]) -> Result<Vec<SqlBuild>> {
	let mut builds = Vec::with_capacity(ids.len());
	for chunk in ids.chunks(INSERT_CHUNK_SIZE) {
		builds.extend(
			conn.load::<_, SqlBuild>(build::table.filter(build::id.eq_any(chunk)))
				.await?,
		);
	}
	Ok(builds)
}

/// Loads the states of the given builds.
pub async fn load_states(
	conn: &mut BoxedSqlConn,
	ids: &[BuildRef],
) -> Result<HashMap<BuildRef, BuildState>> {
	let mut states = HashMap::with_capacity(ids.len());
	for chunk in ids.chunks(INSERT_CHUNK_SIZE) {
		let rows = conn
			.load::<_, (BuildRef, i16)>(
				build::table
					.filter(build::id.eq_any(chunk))
					.select((build::id, build::state)),
			)
			.await?;
		states.extend(
			rows.into_iter()
				.map(|(id, state)| (id, SqlBuildState::from(state).into())),
		);
	}
	Ok(states)
}

/// Loads builds whose dependencies have not been processed yet, with the
/// names of their packages.
///
/// Only builds that are finished or already have a repo generation are
/// returned, ordered by repo generation and ID.
pub async fn load_unprocessed(conn: &mut BoxedSqlConn) -> Result<Vec<(SqlBuild, String)>> {
	Ok(conn
		.load::<_, (SqlBuild, String)>(
			build::table
				.inner_join(package::table)
				.filter(build::deps_processed.eq(false))
				.filter(
					build::state
						.eq_any(SqlBuildState::finished())
						.or(build::repo_id.is_not_null()),
				)
				.order((build::repo_id.asc(), build::id.asc()))
				.select((build::all_columns, package::name)),
		)
		.await?)
}

/// Finds the nearest build of a package before `before` that is finished
/// and has resolved dependencies.
pub async fn prev_for_comparison(
	conn: &mut BoxedSqlConn,
	package_id: PackageRef,
	before: BuildRef,
) -> Result<Option<SqlBuild>> {
	Ok(conn
		.first::<_, SqlBuild>(
			build::table
				.filter(build::package_id.eq(package_id))
				.filter(build::id.lt(before))
				.filter(build::state.eq_any(SqlBuildState::finished()))
				.filter(build::deps_resolved.eq(true))
				.order(build::id.desc()),
		)
		.await
		.optional()?)
}

/// Finds the build the next build of a package is compared against.
///
/// This is the last build if it is finished with resolved dependencies.
/// When the last build is finished and processed but unresolved, the search
/// continues backward through any number of unresolved builds.
pub async fn for_comparison(
	conn: &mut BoxedSqlConn,
	package: &SqlPackage,
) -> Result<Option<SqlBuild>> {
	let Some(last_build_id) = package.last_build_id else {
		return Ok(None);
	};
	let Some(last) = load(conn, last_build_id).await? else {
		return Ok(None);
	};
	if !last.is_finished() {
		return Ok(None);
	}
	if last.deps_resolved {
		Ok(Some(last))
	} else if last.deps_processed {
		prev_for_comparison(conn, package.id, last.id).await
	} else {
		Ok(None)
	}
}

pub async fn set_deps_resolved(
	conn: &mut BoxedSqlConn,
	id: BuildRef,
	resolved: bool,
) -> Result<()> {
	conn.execute(
		update(build::table.filter(build::id.eq(id))).set(build::deps_resolved.eq(resolved)),
	)
	.await?;
	Ok(())
}

pub async fn mark_processed(conn: &mut BoxedSqlConn, ids: &[BuildRef]) -> Result<usize> {
	let mut rows = 0;
	for chunk in ids.chunks(INSERT_CHUNK_SIZE) {
		rows += conn
			.execute(
				update(build::table.filter(build::id.eq_any(chunk)))
					.set(build::deps_processed.eq(true)),
			)
			.await?;
	}
	Ok(rows)
}

/// Finds the oldest build of a package whose dependencies are retained
/// once `up_to` is stored.
///
/// This is the `keep`-th newest build by ID among the builds up to and
/// including `up_to`. Newer builds still waiting to be processed do not
/// count. `keep` below 1 is treated as 1.
pub async fn retention_boundary(
	conn: &mut BoxedSqlConn,
	package_id: PackageRef,
	up_to: BuildRef,
	keep: usize,
) -> Result<Option<SqlBuild>> {
	let offset = i64::try_from(keep.max(1)).unwrap_or(i64::MAX) - 1;
	Ok(conn
		.get_result::<_, SqlBuild>(
			build::table
				.filter(build::package_id.eq(package_id))
				.filter(build::id.le(up_to))
				.order(build::id.desc())
				.limit(1)
				.offset(offset),
		)
		.await
		.optional()?)
}
