//! Resolution runner.

use vigil_backend_model::dependency::DependencyEntry;

use crate::{
	distance::compute_dependency_distances,
	engine::ResolutionEngine,
	selector::{Selector, get_best_selector},
	universe::{PackageUniverse, PkgId},
};

/// Outcome of resolving a build group plus build requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
	pub resolved: bool,
	pub problems: Vec<String>,
	/// Installed binary packages when resolved.
	pub installs: Option<Vec<PkgId>>,
}

/// Resolves the build group together with a package's build requirements.
///
/// Requirements that match nothing are reported without running the engine.
pub fn run_goal(
	engine: &dyn ResolutionEngine,
	universe: &PackageUniverse,
	group: &[String],
	requires: &[String],
) -> ResolutionOutcome {
	let mut goals = Vec::with_capacity(group.len() + requires.len());
	let mut problems = vec![];
	for name in group {
		let selector = Selector::name(name);
		if selector.is_empty(universe) {
			problems.push(format!("Package in base build group not found: {}", name));
		}
		goals.push(selector);
	}
	for req in requires {
		let selector = get_best_selector(universe, req);
		if selector.is_empty(universe) {
			problems.push(format!("No package found for: {}", req));
		} else {
			goals.push(selector);
		}
	}
	if !problems.is_empty() {
		return ResolutionOutcome {
			resolved: false,
			problems,
			installs: None,
		};
	}

	let resolution = engine.resolve(universe, &goals);
	ResolutionOutcome {
		resolved: resolution.ok,
		problems: resolution.problems,
		installs: resolution.installed.map(|installed| {
			installed
				.into_iter()
				.filter(|id| !universe.package(*id).is_source())
				.collect()
		}),
	}
}

/// Resolves build requirements into a dependency snapshot with distances.
///
/// Returns the sorted, de-duplicated problems when resolution fails.
pub fn resolve_dependencies(
	engine: &dyn ResolutionEngine,
	universe: &PackageUniverse,
	group: &[String],
	requires: &[String],
	max_distance: i32,
) -> Result<Vec<DependencyEntry>, Vec<String>> {
	let outcome = run_goal(engine, universe, group, requires);
	match outcome.installs {
		Some(installs) if outcome.resolved => {
			let mut deps = installs
				.into_iter()
				.map(|id| {
					let pkg = universe.package(id);
					DependencyEntry {
						name: pkg.name.to_string(),
						epoch: pkg.epoch(),
						version: pkg.version().to_string(),
						release: pkg.release().to_string(),
						arch: pkg.arch.to_string(),
						distance: None,
					}
				})
				.collect::<Vec<_>>();
			deps.sort_by(|a, b| a.name.cmp(&b.name));
			compute_dependency_distances(universe, requires, &mut deps, max_distance);
			Ok(deps)
		}
		_ => {
			let mut problems = outcome.problems;
			problems.sort();
			problems.dedup();
			Err(problems)
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::{
		engine::{GreedyEngine, Resolution},
		universe::test::record,
	};

	#[derive(Debug, Default)]
	struct CountingEngine(AtomicUsize);

	impl ResolutionEngine for CountingEngine {
		fn resolve(&self, universe: &PackageUniverse, goals: &[Selector]) -> Resolution {
			self.0.fetch_add(1, Ordering::SeqCst);
			GreedyEngine.resolve(universe, goals)
		}
	}

	fn universe() -> PackageUniverse {
		PackageUniverse::new(
			"x86_64",
			[
				record("bash-5-1.x86_64", &[], &[]),
				record("gcc-14-1.x86_64", &["cc"], &["glibc"]),
				record("glibc-2.40-1.x86_64", &[], &[]),
				record("gcc-14-1.src", &[], &[]),
			],
		)
	}

	fn strings(items: &[&str]) -> Vec<String> {
		items.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn test_unmatched_skip_engine() {
		let universe = universe();
		let engine = CountingEngine::default();
		let outcome = run_goal(
			&engine,
			&universe,
			&strings(&["bash", "coreutils"]),
			&strings(&["nothing", "gcc"]),
		);
		assert_eq!(engine.0.load(Ordering::SeqCst), 0);
		assert!(!outcome.resolved);
		assert_eq!(
			outcome.problems,
			strings(&[
				"Package in base build group not found: coreutils",
				"No package found for: nothing",
			])
		);

		let outcome = run_goal(&engine, &universe, &strings(&["bash"]), &strings(&["cc"]));
		assert_eq!(engine.0.load(Ordering::SeqCst), 1);
		assert!(outcome.resolved);
		assert_eq!(outcome.installs.unwrap().len(), 3);
	}

	#[test]
	fn test_resolve_dependencies() {
		let universe = universe();
		let deps = resolve_dependencies(
			&GreedyEngine,
			&universe,
			&strings(&["bash"]),
			&strings(&["gcc"]),
			5,
		)
		.unwrap();
		assert_eq!(
			deps.iter()
				.map(|dep| (dep.name.as_str(), dep.arch.as_str(), dep.distance))
				.collect::<Vec<_>>(),
			vec![
				("bash", "x86_64", None),
				("gcc", "x86_64", Some(1)),
				("glibc", "x86_64", Some(2)),
			]
		);

		let problems = resolve_dependencies(
			&GreedyEngine,
			&universe,
			&strings(&["bash"]),
			&strings(&["b", "a", "b"]),
			5,
		)
		.unwrap_err();
		assert_eq!(
			problems,
			strings(&["No package found for: a", "No package found for: b"])
		);
	}
}
