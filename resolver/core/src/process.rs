//! Build dependency processing.

use tracing::{debug, info};
use vigil_backend_model::{build::SqlBuild, db::BoxedSqlConn, repo::RepoId};
use vigil_backend_service::{build, dependency};

use crate::{
	Resolver, ResolverError, Result, build_system::BuildSpec, diff::diff_dependencies,
	resolve::resolve_dependencies, universe::PackageUniverse,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
	pub processed: usize,
	/// Builds left for a later run.
	pub skipped: usize,
}

impl Resolver {
	/// Resolves the build environment of builds not processed yet.
	///
	/// Builds are handled per repo generation, each generation in its own
	/// transaction. Builds whose generation has no snapshot yet, or that have
	/// no generation at all, stay unprocessed.
	#[tracing::instrument(skip(self))]
	pub async fn process_builds(&self) -> Result<ProcessReport> {
		let mut report = ProcessReport::default();
		let mut conn = self.backend.database.get().await?;
		let unprocessed = build::load_unprocessed(&mut conn).await?;
		if unprocessed.is_empty() {
			return Ok(report);
		}

		let mut group: Option<Vec<String>> = None;
		for builds in unprocessed.chunk_by(|(a, _), (b, _)| a.repo_id == b.repo_id) {
			let Some(repo_id) = builds[0].0.repo_id else {
				debug!(builds = builds.len(), "builds have no repo generation");
				report.skipped += builds.len();
				continue;
			};
			let Some(universe) = self.repo_cache.snapshot(repo_id).await? else {
				info!(repo_id, builds = builds.len(), "repo snapshot not available, skipping builds");
				report.skipped += builds.len();
				continue;
			};
			if group.is_none() {
				group = Some(self.build_system.build_group_members().await?);
			}
			let group = group.as_deref().unwrap_or_default();

			let specs = builds
				.iter()
				.map(|(build, name)| BuildSpec::source(name, &build.version, &build.release))
				.collect::<Vec<_>>();
			let requires = self.fetch_build_requires(&specs).await?;

			conn.transaction::<_, ResolverError, _>(async |conn| {
				for ((build, _), requires) in builds.iter().zip(&requires) {
					self.process_build(conn, &universe, group, repo_id, build, requires)
						.await?;
				}
				let ids = builds.iter().map(|(build, _)| build.id).collect::<Vec<_>>();
				build::mark_processed(conn, &ids).await?;
				Ok(())
			})
			.await?;
			info!(repo_id, builds = builds.len(), "processed builds");
			report.processed += builds.len();
		}
		Ok(report)
	}

	async fn process_build(
		&self,
		conn: &mut BoxedSqlConn,
		universe: &PackageUniverse,
		group: &[String],
		repo_id: RepoId,
		build: &SqlBuild,
		requires: &[String],
	) -> Result<()> {
		let deps = match resolve_dependencies(
			self.engine.as_ref(),
			universe,
			group,
			requires,
			self.config.max_distance,
		) {
			Ok(deps) => deps,
			Err(problems) => {
				debug!(build = build.id, ?problems, "build dependencies are unresolved");
				return Ok(());
			}
		};

		// The previous snapshot may belong to the same generation, so it is
		// read before the new one is stored.
		let prev = build::prev_for_comparison(conn, build.package_id, build.id).await?;
		let prev_deps = match &prev {
			Some(SqlBuild {
				repo_id: Some(prev_repo_id),
				..
			}) => Some(dependency::load_snapshot(conn, *prev_repo_id, build.package_id).await?),
			_ => None,
		};

		dependency::replace_snapshot(conn, repo_id, build.package_id, &deps).await?;
		build::set_deps_resolved(conn, build.id, true).await?;

		if let (Some(prev), Some(prev_deps)) = (prev, prev_deps) {
			let changes = diff_dependencies(&prev_deps, &deps)
				.into_iter()
				.map(|change| change.into_applied(build.id, prev.id))
				.collect::<Vec<_>>();
			debug!(build = build.id, prev = prev.id, changes = changes.len(), "recording changes");
			dependency::insert_applied_changes(conn, &changes).await?;
		}

		let boundary = build::retention_boundary(
			conn,
			build.package_id,
			build.id,
			self.config.keep_build_deps_for,
		)
		.await?;
		if let Some(boundary_repo_id) = boundary.and_then(|b| b.repo_id) {
			let pruned = dependency::prune(conn, build.package_id, boundary_repo_id).await?;
			if pruned > 0 {
				debug!(package = build.package_id, pruned, "pruned old dependencies");
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use vigil_backend_model::build::BuildRef;
	use vigil_backend_service::package;

	use super::*;
	use crate::test::{add_build, add_package, test_env, universe};

	#[tokio::test]
	async fn test_process_builds() {
		let env = test_env().await;
		let (pkg, builds) = {
			let mut db = env.backend.database.get().await.unwrap();
			let pkg = add_package(&mut db, "rnv").await;
			let mut builds: Vec<BuildRef> = vec![];
			for (i, repo_id) in (1..=4).enumerate() {
				builds.push(add_build(&mut db, pkg, &i.to_string(), Some(repo_id)).await);
			}
			(pkg, builds)
		};
		env.build_system.set_requires("rnv", &["cc"]);
		for (repo_id, gcc) in [(1, "12"), (2, "13"), (3, "13"), (4, "14")] {
			env.repos.put(repo_id, universe(gcc));
		}

		let report = env.resolver.process_builds().await.unwrap();
		assert_eq!(report, ProcessReport {
			processed: 4,
			skipped: 0,
		});

		let mut db = env.backend.database.get().await.unwrap();
		for id in &builds {
			let row = build::load(&mut db, *id).await.unwrap().unwrap();
			assert!(row.deps_processed);
			assert!(row.deps_resolved);
		}
		// three builds are retained
		assert_eq!(
			dependency::snapshot_repo_ids(&mut db, pkg).await.unwrap(),
			vec![2, 3, 4]
		);

		let changes = dependency::load_applied_changes(&mut db, builds[1]).await.unwrap();
		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].prev_build_id, builds[0]);
		assert_eq!(changes[0].prev_version.as_deref(), Some("12"));
		assert_eq!(changes[0].curr_version.as_deref(), Some("13"));
		assert!(dependency::load_applied_changes(&mut db, builds[2]).await.unwrap().is_empty());
		assert_eq!(
			dependency::load_applied_changes(&mut db, builds[3]).await.unwrap().len(),
			1
		);

		drop(db);
		let report = env.resolver.process_builds().await.unwrap();
		assert_eq!(report, ProcessReport::default());
	}

	#[tokio::test]
	async fn test_builds_wait_for_snapshot() {
		let env = test_env().await;
		let (waiting, unassigned) = {
			let mut db = env.backend.database.get().await.unwrap();
			let pkg = add_package(&mut db, "rnv").await;
			let waiting = add_build(&mut db, pkg, "1", Some(7)).await;
			let other = add_package(&mut db, "expat").await;
			let unassigned = add_build(&mut db, other, "1", None).await;
			(waiting, unassigned)
		};

		let report = env.resolver.process_builds().await.unwrap();
		assert_eq!(report, ProcessReport {
			processed: 0,
			skipped: 2,
		});
		let mut db = env.backend.database.get().await.unwrap();
		for id in [waiting, unassigned] {
			let row = build::load(&mut db, id).await.unwrap().unwrap();
			assert!(!row.deps_processed);
		}
	}

	#[tokio::test]
	async fn test_unresolved_build() {
		let env = test_env().await;
		let (pkg, id) = {
			let mut db = env.backend.database.get().await.unwrap();
			let pkg = add_package(&mut db, "rnv").await;
			(pkg, add_build(&mut db, pkg, "1", Some(1)).await)
		};
		env.build_system.set_requires("rnv", &["nothing"]);
		env.repos.put(1, universe("14"));

		env.resolver.process_builds().await.unwrap();

		let mut db = env.backend.database.get().await.unwrap();
		let row = build::load(&mut db, id).await.unwrap().unwrap();
		assert!(row.deps_processed);
		assert!(!row.deps_resolved);
		assert!(dependency::snapshot_repo_ids(&mut db, pkg).await.unwrap().is_empty());

		// an unresolved last build is skipped when looking for a comparison
		let row = package::load(&mut db, pkg).await.unwrap().unwrap();
		assert_eq!(build::for_comparison(&mut db, &row).await.unwrap(), None);
	}
}
