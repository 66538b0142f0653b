//! Selectors translating requirement strings into package queries.

use std::fmt::Display;

use glob::Pattern;

use crate::{
	capability::Capability,
	universe::{PackageUniverse, PkgId},
};

/// Characters that make a string a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '['];

fn is_glob(s: &str) -> bool {
	s.contains(GLOB_CHARS)
}

/// Exact string or glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrMatch {
	Exact(String),
	Glob(Pattern),
}

impl StrMatch {
	/// Builds a glob matcher when `s` contains glob characters and is a
	/// valid pattern.
	fn new(s: &str) -> Self {
		if is_glob(s) {
			if let Ok(pattern) = Pattern::new(s) {
				return Self::Glob(pattern);
			}
		}
		Self::Exact(s.to_string())
	}

	fn matches(&self, s: &str) -> bool {
		match self {
			StrMatch::Exact(exact) => exact == s,
			StrMatch::Glob(pattern) => pattern.matches(s),
		}
	}
}

impl Display for StrMatch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StrMatch::Exact(s) => f.write_str(s),
			StrMatch::Glob(pattern) => f.write_str(pattern.as_str()),
		}
	}
}

/// Query on name, epoch, version, release and architecture.
///
/// Components left as `None` match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NevraQuery {
	pub name: StrMatch,
	pub epoch: Option<i32>,
	pub version: Option<String>,
	pub release: Option<String>,
	pub arch: Option<String>,
}

impl NevraQuery {
	pub fn name(name: &str) -> Self {
		Self {
			name: StrMatch::Exact(name.to_string()),
			epoch: None,
			version: None,
			release: None,
			arch: None,
		}
	}

	fn matches(&self, universe: &PackageUniverse) -> Vec<PkgId> {
		let candidates: Vec<PkgId> = match &self.name {
			StrMatch::Exact(name) => universe.by_name(name).to_vec(),
			StrMatch::Glob(_) => universe
				.packages()
				.filter(|(_, pkg)| self.name.matches(&pkg.name))
				.map(|(id, _)| id)
				.collect(),
		};
		candidates
			.into_iter()
			.filter(|id| {
				let pkg = universe.package(*id);
				self.epoch.is_none_or(|epoch| pkg.epoch() == epoch)
					&& self.version.as_deref().is_none_or(|v| pkg.version() == v)
					&& self.release.as_deref().is_none_or(|r| pkg.release() == r)
					&& self.arch.as_deref().is_none_or(|a| pkg.arch.as_str() == a)
			})
			.collect()
	}
}

impl Display for NevraQuery {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name)?;
		if let Some(version) = &self.version {
			f.write_str("-")?;
			if let Some(epoch) = self.epoch {
				write!(f, "{}:", epoch)?;
			}
			f.write_str(version)?;
		}
		if let Some(release) = &self.release {
			write!(f, "-{}", release)?;
		}
		if let Some(arch) = &self.arch {
			write!(f, ".{}", arch)?;
		}
		Ok(())
	}
}

/// Structured query against a [`PackageUniverse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
	/// Matches nothing.
	Empty,
	/// Packages containing a file.
	File(StrMatch),
	Nevra(NevraQuery),
	/// Packages providing a capability.
	Provides(Capability),
	/// Packages providing a capability whose name matches a glob.
	ProvidesGlob(Pattern),
}

impl Selector {
	/// Packages with exactly this name.
	pub fn name(name: &str) -> Self {
		Self::Nevra(NevraQuery::name(name))
	}

	/// Packages matched by the selector, ascending by ID.
	pub fn matches(&self, universe: &PackageUniverse) -> Vec<PkgId> {
		let mut ids = match self {
			Selector::Empty => vec![],
			Selector::File(StrMatch::Exact(path)) => universe.by_file(path).to_vec(),
			Selector::File(path) => universe
				.packages()
				.filter(|(_, pkg)| pkg.files.iter().any(|file| path.matches(file)))
				.map(|(id, _)| id)
				.collect(),
			Selector::Nevra(query) => query.matches(universe),
			Selector::Provides(cap) => universe.what_provides(cap),
			Selector::ProvidesGlob(pattern) => universe
				.packages()
				.filter(|(_, pkg)| pkg.provides.iter().any(|cap| pattern.matches(&cap.name)))
				.map(|(id, _)| id)
				.collect(),
		};
		ids.sort_unstable();
		ids.dedup();
		ids
	}

	pub fn is_empty(&self, universe: &PackageUniverse) -> bool {
		self.matches(universe).is_empty()
	}
}

impl Display for Selector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Selector::Empty => f.write_str("<empty>"),
			Selector::File(path) => write!(f, "{}", path),
			Selector::Nevra(query) => write!(f, "{}", query),
			Selector::Provides(cap) => write!(f, "{}", cap),
			Selector::ProvidesGlob(pattern) => f.write_str(pattern.as_str()),
		}
	}
}

/// Splits an optional `epoch:` prefix off a version.
fn split_epoch(version: &str) -> Option<(Option<i32>, &str)> {
	match version.split_once(':') {
		Some((epoch, version)) => Some((Some(epoch.parse().ok()?), version)),
		None => Some((None, version)),
	}
}

fn nevra_possibilities(dep: &str, universe: &PackageUniverse) -> Vec<NevraQuery> {
	let mut forms = vec![];
	let query = |name: &str| NevraQuery {
		name: StrMatch::new(name),
		epoch: None,
		version: None,
		release: None,
		arch: None,
	};

	let with_arch = dep
		.rsplit_once('.')
		.filter(|(_, arch)| universe.has_arch(arch));

	// NEVRA
	if let Some((nevr, arch)) = with_arch {
		if let Some((nev, release)) = nevr.rsplit_once('-') {
			if let Some((name, version)) = nev.rsplit_once('-') {
				if let Some((epoch, version)) = split_epoch(version) {
					forms.push(NevraQuery {
						epoch,
						version: Some(version.to_string()),
						release: Some(release.to_string()),
						arch: Some(arch.to_string()),
						..query(name)
					});
				}
			}
		}
	}
	// NEVR
	if let Some((nev, release)) = dep.rsplit_once('-') {
		if let Some((name, version)) = nev.rsplit_once('-') {
			if let Some((epoch, version)) = split_epoch(version) {
				forms.push(NevraQuery {
					epoch,
					version: Some(version.to_string()),
					release: Some(release.to_string()),
					..query(name)
				});
			}
		}
	}
	// NEV
	if let Some((name, version)) = dep.rsplit_once('-') {
		if let Some((epoch, version)) = split_epoch(version) {
			forms.push(NevraQuery {
				epoch,
				version: Some(version.to_string()),
				..query(name)
			});
		}
	}
	// NA
	if let Some((name, arch)) = with_arch {
		forms.push(NevraQuery {
			arch: Some(arch.to_string()),
			..query(name)
		});
	}
	// N
	forms.push(query(dep));

	forms
		.into_iter()
		.filter(|form| match &form.name {
			StrMatch::Exact(name) => !name.is_empty(),
			StrMatch::Glob(_) => true,
		})
		.collect()
}

/// Builds the best selector for a requirement string.
///
/// Tried in order: file paths, name/version/release/arch forms that match
/// a package, provides globs, versioned capabilities. Anything else yields
/// [`Selector::Empty`].
pub fn get_best_selector(universe: &PackageUniverse, dep: &str) -> Selector {
	let dep = dep.trim();
	if dep.starts_with('/') || dep.starts_with("*/") {
		return Selector::File(StrMatch::new(dep));
	}

	if let Some(query) = nevra_possibilities(dep, universe)
		.into_iter()
		.find(|query| !query.matches(universe).is_empty())
	{
		return Selector::Nevra(query);
	}

	if is_glob(dep) {
		if let Ok(pattern) = Pattern::new(dep) {
			return Selector::ProvidesGlob(pattern);
		}
	}

	if let Some(cap) = Capability::parse(dep) {
		if universe.is_provided(&cap.name) {
			return Selector::Provides(cap);
		}
	}

	Selector::Empty
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::universe::test::record;

	fn universe() -> PackageUniverse {
		let mut java = record("java-21-openjdk-21.0.5-1.x86_64", &["java = 1:21"], &[]);
		java.files = vec!["/usr/bin/java".to_string()];
		PackageUniverse::new(
			"x86_64",
			[
				java,
				record("maven-3.9.9-2.noarch", &["mvn"], &[]),
				record("maven-3.8.0-1.noarch", &[], &[]),
				record("perl-Carp-1.54-1.noarch", &["perl(Carp) = 1.54"], &[]),
				record("maven-3.9.9-2.src", &[], &[]),
			],
		)
	}

	#[test]
	fn test_file_selector() {
		let universe = universe();
		let sltr = get_best_selector(&universe, "/usr/bin/java");
		assert_eq!(sltr, Selector::File(StrMatch::Exact("/usr/bin/java".to_string())));
		assert_eq!(sltr.matches(&universe), vec![0]);
		assert_eq!(get_best_selector(&universe, "*/bin/ja*").matches(&universe), vec![0]);
		assert!(get_best_selector(&universe, "/usr/bin/perl").is_empty(&universe));
	}

	#[test]
	fn test_nevra_selector() {
		let universe = universe();
		assert_eq!(get_best_selector(&universe, "maven").matches(&universe), vec![1, 2, 4]);
		assert_eq!(
			get_best_selector(&universe, "maven-3.9.9").matches(&universe),
			vec![1, 4]
		);
		assert_eq!(
			get_best_selector(&universe, "maven-3.9.9-2.noarch").matches(&universe),
			vec![1]
		);
		assert_eq!(
			get_best_selector(&universe, "maven.noarch").matches(&universe),
			vec![1, 2]
		);
		// dashes in names
		assert_eq!(
			get_best_selector(&universe, "java-21-openjdk").matches(&universe),
			vec![0]
		);
		assert_eq!(
			get_best_selector(&universe, "java-21-openjdk-0:21.0.5").matches(&universe),
			vec![0]
		);
		assert_eq!(get_best_selector(&universe, "mav*").matches(&universe), vec![1, 2, 4]);
	}

	#[test]
	fn test_provides_selector() {
		let universe = universe();
		assert_eq!(
			get_best_selector(&universe, "perl(Carp)*"),
			Selector::ProvidesGlob(Pattern::new("perl(Carp)*").unwrap())
		);
		let sltr = get_best_selector(&universe, "perl(Carp) >= 1.50");
		assert_eq!(sltr.to_string(), "perl(Carp) >= 1.50");
		assert_eq!(sltr.matches(&universe), vec![3]);
		assert_eq!(get_best_selector(&universe, "mvn").matches(&universe), vec![1]);
		assert!(get_best_selector(&universe, "java >= 2:1").is_empty(&universe));
		assert_eq!(get_best_selector(&universe, "gradle"), Selector::Empty);
		assert_eq!(get_best_selector(&universe, "gradle >= 1"), Selector::Empty);
	}
}
