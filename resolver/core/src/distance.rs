//! Requirement graph distances of resolved dependencies.

use std::collections::{BTreeSet, HashMap};

use vigil_backend_model::dependency::DependencyEntry;

use crate::{
	selector::get_best_selector,
	universe::{PackageUniverse, PkgId},
};

/// Distance cap used unless configured otherwise.
pub const DEFAULT_MAX_DISTANCE: i32 = 5;

/// State of the level-by-level walk over the requirement graph.
#[derive(Debug)]
struct LevelWalk {
	level: i32,
	visited: BTreeSet<PkgId>,
	frontier: BTreeSet<PkgId>,
}

impl LevelWalk {
	fn new(start: BTreeSet<PkgId>) -> Self {
		Self {
			level: 1,
			visited: BTreeSet::new(),
			frontier: start,
		}
	}

	/// Moves to the packages providing anything required on the current
	/// level, skipping packages seen before.
	fn advance(&mut self, universe: &PackageUniverse) {
		let mut next = BTreeSet::new();
		for id in &self.frontier {
			for req in &universe.package(*id).requires {
				next.extend(universe.what_provides(req));
			}
		}
		self.visited.extend(std::mem::take(&mut self.frontier));
		self.frontier = next.difference(&self.visited).copied().collect();
		self.level += 1;
	}
}

/// Assigns each dependency its distance from the direct build requirements.
///
/// Packages matched by a requirement are at distance 1, their providers of
/// requirements at distance 2 and so on. Dependencies at `max_distance` or
/// further keep no distance. Distances already set are kept.
pub fn compute_dependency_distances(
	universe: &PackageUniverse,
	requires: &[String],
	deps: &mut [DependencyEntry],
	max_distance: i32,
) {
	let index = deps
		.iter()
		.enumerate()
		.map(|(i, dep)| (dep.name.clone(), i))
		.collect::<HashMap<_, _>>();

	let start = requires
		.iter()
		.flat_map(|req| get_best_selector(universe, req).matches(universe))
		.collect();
	let mut walk = LevelWalk::new(start);
	while !walk.frontier.is_empty() && walk.level < max_distance {
		for id in &walk.frontier {
			let name = universe.package(*id).name.as_str();
			if let Some(&i) = index.get(name) {
				if deps[i].distance.is_none() {
					deps[i].distance = Some(walk.level);
				}
			}
		}
		walk.advance(universe);
	}
}
