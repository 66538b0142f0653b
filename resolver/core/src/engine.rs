//! Installability resolution over a package universe.

use std::{
	collections::{HashMap, VecDeque},
	fmt::Debug,
};

use kstring::KString;

use crate::{
	selector::Selector,
	universe::{PackageUniverse, PkgId},
};

/// Result of a resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	pub ok: bool,
	pub problems: Vec<String>,
	/// The install set, present when resolution succeeded.
	pub installed: Option<Vec<PkgId>>,
}

/// Solver computing whether a set of install goals is satisfiable.
pub trait ResolutionEngine
where
	Self: Send + Sync + Debug,
{
	fn resolve(&self, universe: &PackageUniverse, goals: &[Selector]) -> Resolution;
}

/// Deterministic greedy installer.
///
/// Every goal installs its most preferred candidate, then requirements are
/// satisfied breadth first with the most preferred provider. It never
/// backtracks, so it may report problems a complete solver would avoid.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyEngine;

struct InstallSet<'a> {
	universe: &'a PackageUniverse,
	installed: Vec<PkgId>,
	by_name: HashMap<KString, PkgId>,
	queue: VecDeque<PkgId>,
	problems: Vec<String>,
}

impl<'a> InstallSet<'a> {
	fn new(universe: &'a PackageUniverse) -> Self {
		Self {
			universe,
			installed: vec![],
			by_name: HashMap::new(),
			queue: VecDeque::new(),
			problems: vec![],
		}
	}

	fn is_installed(&self, id: PkgId) -> bool {
		let name = &self.universe.package(id).name;
		self.by_name.get(name) == Some(&id)
	}

	fn install(&mut self, id: PkgId) {
		let pkg = self.universe.package(id);
		self.by_name.insert(pkg.name.clone(), id);
		self.installed.push(id);
		self.queue.push_back(id);
	}

	fn install_goal(&mut self, goal: &Selector) {
		let candidates = goal
			.matches(self.universe)
			.into_iter()
			.filter(|id| !self.universe.package(*id).is_source())
			.collect::<Vec<_>>();
		if candidates.iter().any(|id| self.is_installed(*id)) {
			return;
		}
		let Some(best) = self.universe.best_of(candidates.iter().copied()) else {
			self.problems
				.push(format!("conflicting requests: nothing provides {}", goal));
			return;
		};
		let best_pkg = self.universe.package(best);
		if let Some(other) = self.by_name.get(&best_pkg.name) {
			self.problems.push(format!(
				"cannot install both {} and {}",
				best_pkg,
				self.universe.package(*other)
			));
			return;
		}
		self.install(best);
	}

	fn satisfy_requirements(&mut self) {
		while let Some(id) = self.queue.pop_front() {
			let pkg = self.universe.package(id);
			for req in &pkg.requires {
				if req.is_rpmlib() {
					continue;
				}
				let providers = self
					.universe
					.what_provides(req)
					.into_iter()
					.filter(|id| !self.universe.package(*id).is_source())
					.collect::<Vec<_>>();
				if providers.is_empty() {
					self.problems
						.push(format!("nothing provides {} needed by {}", req, pkg));
					continue;
				}
				if providers.iter().any(|id| self.is_installed(*id)) {
					continue;
				}
				let installable = providers
					.into_iter()
					.filter(|id| !self.by_name.contains_key(&self.universe.package(*id).name));
				match self.universe.best_of(installable) {
					Some(best) => self.install(best),
					None => self.problems.push(format!(
						"package {} requires {}, but none of the providers can be installed",
						pkg, req
					)),
				}
			}
		}
	}
}

impl ResolutionEngine for GreedyEngine {
	fn resolve(&self, universe: &PackageUniverse, goals: &[Selector]) -> Resolution {
		let mut set = InstallSet::new(universe);
		for goal in goals {
			set.install_goal(goal);
		}
		set.satisfy_requirements();

		if set.problems.is_empty() {
			Resolution {
				ok: true,
				problems: vec![],
				installed: Some(set.installed),
			}
		} else {
			Resolution {
				ok: false,
				problems: set.problems,
				installed: None,
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{selector::get_best_selector, universe::test::record};

	fn names(universe: &PackageUniverse, resolution: &Resolution) -> Vec<String> {
		let mut names = resolution
			.installed
			.iter()
			.flatten()
			.map(|id| universe.package(*id).nevra())
			.collect::<Vec<_>>();
		names.sort();
		names
	}

	#[test]
	fn test_resolve() {
		let universe = PackageUniverse::new(
			"x86_64",
			[
				record("app-1-1.x86_64", &[], &["libfoo >= 2", "rpmlib(PayloadIsZstd)"]),
				record("foo-1-1.x86_64", &["libfoo = 1"], &[]),
				record("foo-2-1.x86_64", &["libfoo = 2"], &["/bin/sh"]),
				record("foo-3-1.src", &["libfoo = 3"], &[]),
				record("bash-5-1.x86_64", &["/bin/sh"], &["bash"]),
			],
		);
		let goals = [Selector::name("app")];
		let resolution = GreedyEngine.resolve(&universe, &goals);
		assert!(resolution.ok, "{:?}", resolution.problems);
		assert_eq!(
			names(&universe, &resolution),
			vec!["app-1-1.x86_64", "bash-5-1.x86_64", "foo-2-1.x86_64"]
		);
	}

	#[test]
	fn test_problems() {
		let universe = PackageUniverse::new(
			"x86_64",
			[
				record("app-1-1.x86_64", &[], &["missing", "libfoo = 1"]),
				record("foo-2-1.x86_64", &["libfoo = 2"], &[]),
				record("foo-1-1.x86_64", &["libfoo = 1"], &[]),
			],
		);
		let goals = [
			get_best_selector(&universe, "app"),
			get_best_selector(&universe, "foo"),
		];
		let resolution = GreedyEngine.resolve(&universe, &goals);
		assert!(!resolution.ok);
		assert!(resolution.installed.is_none());
		assert_eq!(
			resolution.problems,
			vec![
				"nothing provides missing needed by app-1-1.x86_64".to_string(),
				"package app-1-1.x86_64 requires libfoo = 1, but none of the providers can be \
				 installed"
					.to_string(),
			]
		);

		let goals = [Selector::name("app"), get_best_selector(&universe, "foo-1")];
		let resolution = GreedyEngine.resolve(&universe, &goals);
		assert!(!resolution.ok);
	}

	#[test]
	fn test_conflicting_goals() {
		let universe = PackageUniverse::new(
			"x86_64",
			[
				record("foo-2-1.x86_64", &[], &[]),
				record("foo-1-1.x86_64", &[], &[]),
			],
		);
		let goals = [
			get_best_selector(&universe, "foo-2"),
			get_best_selector(&universe, "foo-1"),
		];
		let resolution = GreedyEngine.resolve(&universe, &goals);
		assert_eq!(
			resolution.problems,
			vec!["cannot install both foo-1-1.x86_64 and foo-2-1.x86_64".to_string()]
		);
	}
}
