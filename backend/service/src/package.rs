//! Package queries.

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, insert_into, update};
use vigil_backend_model::{
	db::{BoxedSqlConn, INSERT_CHUNK_SIZE, schema::package, types::resolution_to_sql},
	package::{NewPackage, PackageRef, SqlPackage},
};
use vigil_common_model::package::ResolutionState;

use crate::Result;

/// Registers a package, returning its ID.
pub async fn create(conn: &mut BoxedSqlConn, package: &NewPackage) -> Result<PackageRef> {
	Ok(conn
		.get_result::<_, PackageRef>(
			insert_into(package::table)
				.values(package)
				.returning(package::id),
		)
		.await?)
}

pub async fn load(conn: &mut BoxedSqlConn, id: PackageRef) -> Result<Option<SqlPackage>> {
	Ok(conn
		.first::<_, SqlPackage>(package::table.filter(package::id.eq(id)))
		.await
		.optional()?)
}

pub async fn load_by_name(conn: &mut BoxedSqlConn, name: &str) -> Result<Option<SqlPackage>> {
	Ok(conn
		.first::<_, SqlPackage>(package::table.filter(package::name.eq(name)))
		.await
		.optional()?)
}

/// Loads packages taking part in repo generation runs.
///
/// These are tracked, unblocked packages with at least one complete build,
/// ordered by ID.
pub async fn load_resolvable(conn: &mut BoxedSqlConn) -> Result<Vec<SqlPackage>> {
	Ok(conn
		.load::<_, SqlPackage>(
			package::table
				.filter(package::tracked.eq(true))
				.filter(package::blocked.eq(false))
				.filter(package::last_complete_build_id.is_not_null())
				.order(package::id.asc()),
		)
		.await?)
}

/// Sets the resolution state of the given packages.
pub async fn set_resolution(
	conn: &mut BoxedSqlConn,
	ids: &[PackageRef],
	state: ResolutionState,
) -> Result<usize> {
	let value = resolution_to_sql(state);
	let mut rows = 0;
	for chunk in ids.chunks(INSERT_CHUNK_SIZE) {
		rows += conn
			.execute(
				update(package::table.filter(package::id.eq_any(chunk)))
					.set(package::resolved.eq(value)),
			)
			.await?;
	}
	Ok(rows)
}
