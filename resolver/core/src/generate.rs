//! Repo generation processing.

use std::{
	collections::{HashMap, HashSet},
	time::Instant,
};

use tracing::{debug, error, info, warn};
use vigil_backend_model::{
	dependency::NewUnappliedChange,
	package::SqlPackage,
	repo::{NewResolutionProblem, RepoId, SqlRepo},
};
use vigil_backend_service::{build, dependency, package, repo};
use vigil_common_model::package::ResolutionState;

use crate::{
	Resolver, ResolverError, Result,
	build_system::BuildSpec,
	diff::diff_dependencies,
	notifier::StateTransition,
	resolve::{resolve_dependencies, run_goal},
};

/// Result of processing a repo generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
	Committed {
		resolved: usize,
		unresolved: usize,
		/// Number of unapplied dependency changes recorded.
		changes: usize,
	},
	/// The base build group is not installable. Nothing but the repo record
	/// and its problems was written.
	BaseUnresolvable { problems: Vec<String> },
	/// No snapshot of the generation is available yet.
	SnapshotMissing,
}

impl Resolver {
	/// Resolves every tracked package against a repo generation.
	///
	/// All database writes of a generation happen in a single transaction.
	/// Package state changes are announced after it commits.
	#[tracing::instrument(skip(self))]
	pub async fn generate_repo(&self, repo_id: RepoId) -> Result<GenerationOutcome> {
		let start = Instant::now();
		info!("generating repo");
		self.build_system.refresh_latest_builds().await?;

		let mut conn = self.backend.database.get().await?;
		let packages = package::load_resolvable(&mut conn).await?;

		let Some(universe) = self.repo_cache.snapshot(repo_id).await? else {
			error!("repo snapshot is not available");
			return Ok(GenerationOutcome::SnapshotMissing);
		};

		let group = self.build_system.build_group_members().await?;
		let base = run_goal(self.engine.as_ref(), &universe, &group, &[]);
		if !base.resolved {
			let mut problems = base.problems;
			problems.sort();
			problems.dedup();
			info!(problems = problems.len(), "base build group is not resolvable");
			conn.transaction::<_, ResolverError, _>(async |conn| {
				repo::save(conn, &SqlRepo {
					repo_id,
					base_resolved: false,
				})
				.await?;
				repo::replace_buildroot_problems(conn, repo_id, &problems).await?;
				Ok(())
			})
			.await?;
			return Ok(GenerationOutcome::BaseUnresolvable { problems });
		}

		let build_ids = packages
			.iter()
			.filter_map(|pkg| pkg.last_complete_build_id)
			.collect::<Vec<_>>();
		let builds = build::load_by_ids(&mut conn, &build_ids)
			.await?
			.into_iter()
			.map(|build| (build.id, build))
			.collect::<HashMap<_, _>>();
		let mut specs = Vec::with_capacity(packages.len());
		let mut targets = Vec::with_capacity(packages.len());
		for pkg in &packages {
			let last = pkg.last_complete_build_id.and_then(|id| builds.get(&id));
			let Some(last) = last else {
				warn!(package = %pkg.name, "last complete build not found, skipping");
				continue;
			};
			specs.push(BuildSpec::source(&pkg.name, &last.version, &last.release));
			targets.push(pkg);
		}
		let requires = self.fetch_build_requires(&specs).await?;

		info!(packages = targets.len(), "resolving packages");
		let resolution_start = Instant::now();
		let mut resolved: Vec<&SqlPackage> = vec![];
		let mut unresolved: Vec<&SqlPackage> = vec![];
		let mut problems: Vec<NewResolutionProblem> = vec![];
		let mut changes: Vec<NewUnappliedChange> = vec![];
		for (pkg, requires) in targets.iter().copied().zip(&requires) {
			match resolve_dependencies(
				self.engine.as_ref(),
				&universe,
				&group,
				requires,
				self.config.max_distance,
			) {
				Ok(deps) => {
					let prev = build::for_comparison(&mut conn, pkg).await?;
					if let Some((prev_id, Some(prev_repo_id))) = prev.map(|b| (b.id, b.repo_id)) {
						let prev_deps =
							dependency::load_snapshot(&mut conn, prev_repo_id, pkg.id).await?;
						changes.extend(
							diff_dependencies(&prev_deps, &deps)
								.into_iter()
								.map(|change| change.into_unapplied(pkg.id, prev_id)),
						);
					}
					resolved.push(pkg);
				}
				Err(pkg_problems) => {
					debug!(package = %pkg.name, problems = ?pkg_problems, "package is unresolved");
					problems.extend(pkg_problems.into_iter().map(|problem| NewResolutionProblem {
						package_id: pkg.id,
						repo_id,
						problem,
					}));
					unresolved.push(pkg);
				}
			}
		}
		let resolution_time = resolution_start.elapsed();

		let states = build::load_states(&mut conn, &build_ids).await?;
		let unresolved_ids = unresolved.iter().map(|pkg| pkg.id).collect::<HashSet<_>>();
		let transitions = targets
			.iter()
			.filter_map(|pkg| {
				let resolution = ResolutionState::from(!unresolved_ids.contains(&pkg.id));
				if pkg.resolution() == resolution {
					return None;
				}
				let last_state = pkg
					.last_complete_build_id
					.and_then(|id| states.get(&id).copied());
				let mut updated = (*pkg).clone();
				updated.resolved = Some(resolution == ResolutionState::Resolved);
				Some(StateTransition {
					prev_state: pkg.status(last_state),
					new_state: updated.status(last_state),
					package: updated,
				})
			})
			.collect::<Vec<_>>();

		let resolved_ids = resolved.iter().map(|pkg| pkg.id).collect::<Vec<_>>();
		let unresolved_ids = unresolved.iter().map(|pkg| pkg.id).collect::<Vec<_>>();
		conn.transaction::<_, ResolverError, _>(async |conn| {
			repo::replace_resolution_problems(conn, &problems).await?;
			dependency::replace_unapplied_changes(conn, &changes).await?;
			package::set_resolution(conn, &resolved_ids, ResolutionState::Resolved).await?;
			package::set_resolution(conn, &unresolved_ids, ResolutionState::Unresolved).await?;
			repo::replace_buildroot_problems(conn, repo_id, &[]).await?;
			repo::save(conn, &SqlRepo {
				repo_id,
				base_resolved: true,
			})
			.await?;
			Ok(())
		})
		.await?;
		drop(conn);

		for transition in &transitions {
			if let Err(error) = self.notifier.notify(transition).await {
				error!(
					?error,
					package = %transition.package.name,
					"failed to announce package state change"
				);
			}
		}

		info!(
			resolved = resolved_ids.len(),
			unresolved = unresolved_ids.len(),
			changes = changes.len(),
			?resolution_time,
			elapsed = ?start.elapsed(),
			"repo generation done"
		);
		Ok(GenerationOutcome::Committed {
			resolved: resolved_ids.len(),
			unresolved: unresolved_ids.len(),
			changes: changes.len(),
		})
	}
}

#[cfg(test)]
mod test {
	use vigil_common_model::package::PackageStatus;

	use super::*;
	use crate::{
		test::{add_build, add_package, test_env, universe},
		universe::{PackageUniverse, test::record},
	};

	#[tokio::test]
	async fn test_generate_repo() {
		let env = test_env().await;
		let (rnv, broken, rnv_build) = {
			let mut db = env.backend.database.get().await.unwrap();
			let rnv = add_package(&mut db, "rnv").await;
			let broken = add_package(&mut db, "broken").await;
			let rnv_build = add_build(&mut db, rnv, "1", Some(1)).await;
			add_build(&mut db, broken, "1", None).await;
			(rnv, broken, rnv_build)
		};
		env.build_system.set_requires("rnv", &["cc"]);
		env.build_system.set_requires("broken", &["nothing"]);
		env.repos.put(1, universe("13"));
		env.repos.put(2, universe("14"));

		let report = env.resolver.process_builds().await.unwrap();
		assert_eq!(report.processed, 1);

		let outcome = env.resolver.generate_repo(2).await.unwrap();
		assert_eq!(outcome, GenerationOutcome::Committed {
			resolved: 1,
			unresolved: 1,
			changes: 1,
		});

		let mut db = env.backend.database.get().await.unwrap();
		// only builds store dependency snapshots
		assert_eq!(dependency::snapshot_repo_ids(&mut db, rnv).await.unwrap(), vec![1]);

		let changes = dependency::load_unapplied_changes(&mut db).await.unwrap();
		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].package_id, rnv);
		assert_eq!(changes[0].prev_build_id, rnv_build);
		assert_eq!(changes[0].dep_name, "gcc");
		assert_eq!(changes[0].prev_version.as_deref(), Some("13"));
		assert_eq!(changes[0].curr_version.as_deref(), Some("14"));
		assert_eq!(changes[0].distance, Some(1));

		assert_eq!(repo::load_resolution_problems(&mut db).await.unwrap(), vec![(
			broken,
			2,
			"No package found for: nothing".to_string()
		)]);
		let rnv_row = package::load(&mut db, rnv).await.unwrap().unwrap();
		assert_eq!(rnv_row.resolution(), ResolutionState::Resolved);
		let broken_row = package::load(&mut db, broken).await.unwrap().unwrap();
		assert_eq!(broken_row.resolution(), ResolutionState::Unresolved);
		assert_eq!(
			repo::load(&mut db, 2).await.unwrap(),
			Some(SqlRepo {
				repo_id: 2,
				base_resolved: true,
			})
		);

		let transitions = env.notifier.take();
		let states = transitions
			.iter()
			.map(|t| (t.package.id, t.prev_state, t.new_state))
			.collect::<Vec<_>>();
		assert_eq!(states, vec![
			(rnv, PackageStatus::Ok, PackageStatus::Ok),
			(broken, PackageStatus::Ok, PackageStatus::Unresolved),
		]);

		drop(db);
		let again = env.resolver.generate_repo(2).await.unwrap();
		assert_eq!(again, outcome);
		let mut db = env.backend.database.get().await.unwrap();
		let rerun = dependency::load_unapplied_changes(&mut db).await.unwrap();
		let fields = |c: &vigil_backend_model::dependency::SqlUnappliedChange| {
			(c.dep_name.clone(), c.prev_version.clone(), c.curr_version.clone(), c.distance)
		};
		assert_eq!(
			rerun.iter().map(fields).collect::<Vec<_>>(),
			changes.iter().map(fields).collect::<Vec<_>>()
		);
		assert!(env.notifier.take().is_empty());
	}

	#[tokio::test]
	async fn test_generate_repo_twice() {
		let env = test_env().await;
		{
			let mut db = env.backend.database.get().await.unwrap();
			let pkg = add_package(&mut db, "broken").await;
			add_build(&mut db, pkg, "1", None).await;
		}
		env.build_system.set_requires("broken", &["nothing"]);
		env.repos.put(2, universe("14"));

		let first = env.resolver.generate_repo(2).await.unwrap();
		assert_eq!(env.notifier.take().len(), 1);
		let problems = {
			let mut db = env.backend.database.get().await.unwrap();
			repo::load_resolution_problems(&mut db).await.unwrap()
		};

		let second = env.resolver.generate_repo(2).await.unwrap();
		assert_eq!(first, second);
		assert!(env.notifier.take().is_empty());
		let mut db = env.backend.database.get().await.unwrap();
		assert_eq!(repo::load_resolution_problems(&mut db).await.unwrap(), problems);
	}

	#[tokio::test]
	async fn test_generations_keep_build_snapshots() {
		let env = test_env().await;
		let (rnv, rnv_build) = {
			let mut db = env.backend.database.get().await.unwrap();
			let rnv = add_package(&mut db, "rnv").await;
			(rnv, add_build(&mut db, rnv, "1", Some(1)).await)
		};
		env.build_system.set_requires("rnv", &["cc"]);
		env.repos.put(1, universe("13"));
		env.resolver.process_builds().await.unwrap();

		for repo_id in 2..=8 {
			env.repos.put(repo_id, universe("14"));
			let outcome = env.resolver.generate_repo(repo_id).await.unwrap();
			assert!(matches!(outcome, GenerationOutcome::Committed { changes: 1, .. }));
		}

		let mut db = env.backend.database.get().await.unwrap();
		assert_eq!(dependency::snapshot_repo_ids(&mut db, rnv).await.unwrap(), vec![1]);
		let changes = dependency::load_unapplied_changes(&mut db).await.unwrap();
		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].prev_build_id, rnv_build);
		assert_eq!(changes[0].curr_version.as_deref(), Some("14"));
	}

	#[tokio::test]
	async fn test_base_group_unresolvable() {
		let env = test_env().await;
		let pkg = {
			let mut db = env.backend.database.get().await.unwrap();
			let pkg = add_package(&mut db, "rnv").await;
			add_build(&mut db, pkg, "1", None).await;
			pkg
		};
		env.build_system.set_requires("rnv", &["glibc"]);
		env.repos.put(
			3,
			PackageUniverse::new("x86_64", [record("glibc-2.40-1.x86_64", &[], &[])]),
		);

		let outcome = env.resolver.generate_repo(3).await.unwrap();
		assert_eq!(outcome, GenerationOutcome::BaseUnresolvable {
			problems: vec!["Package in base build group not found: bash".to_string()],
		});

		let mut db = env.backend.database.get().await.unwrap();
		assert_eq!(
			repo::load(&mut db, 3).await.unwrap(),
			Some(SqlRepo {
				repo_id: 3,
				base_resolved: false,
			})
		);
		assert_eq!(repo::load_buildroot_problems(&mut db, 3).await.unwrap(), [
			"Package in base build group not found: bash"
		]);
		assert!(dependency::snapshot_repo_ids(&mut db, pkg).await.unwrap().is_empty());
		assert!(repo::load_resolution_problems(&mut db).await.unwrap().is_empty());
		let row = package::load(&mut db, pkg).await.unwrap().unwrap();
		assert_eq!(row.resolution(), ResolutionState::Unknown);
		assert!(env.notifier.take().is_empty());
	}

	#[tokio::test]
	async fn test_snapshot_missing() {
		let env = test_env().await;
		let outcome = env.resolver.generate_repo(5).await.unwrap();
		assert_eq!(outcome, GenerationOutcome::SnapshotMissing);
		let mut db = env.backend.database.get().await.unwrap();
		assert!(repo::load(&mut db, 5).await.unwrap().is_none());
	}
}
