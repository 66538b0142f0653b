//! Package universe of one repo generation.

use std::{
	cmp::Ordering,
	collections::{BTreeSet, HashMap},
	fmt::Display,
};

use kstring::KString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
	capability::{Capability, CmpOp},
	evr::Evr,
};

/// Index of a package in its [`PackageUniverse`].
pub type PkgId = usize;

pub const NOARCH: &str = "noarch";
pub const SRC_ARCH: &str = "src";

/// Package metadata as stored in repo snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
	pub name: KString,
	#[serde(default)]
	pub epoch: i32,
	pub version: String,
	pub release: String,
	pub arch: KString,
	#[serde(default)]
	pub provides: Vec<String>,
	#[serde(default)]
	pub requires: Vec<String>,
	#[serde(default)]
	pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Package {
	pub name: KString,
	pub evr: Evr,
	pub arch: KString,
	/// Includes the implicit `name = evr` provide.
	pub provides: Vec<Capability>,
	pub requires: Vec<Capability>,
	pub files: Vec<String>,
}

impl Package {
	pub fn epoch(&self) -> i32 {
		self.evr.epoch
	}

	pub fn version(&self) -> &str {
		&self.evr.version
	}

	pub fn release(&self) -> &str {
		self.evr.release.as_deref().unwrap_or_default()
	}

	pub fn is_source(&self) -> bool {
		self.arch.as_str() == SRC_ARCH
	}

	pub fn nevra(&self) -> String {
		format!("{}-{}.{}", self.name, self.evr, self.arch)
	}
}

impl Display for Package {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}-{}.{}", self.name, self.evr, self.arch)
	}
}

/// All packages of a repo generation, indexed for lookups by name,
/// provided capability and file.
#[derive(Debug, Default)]
pub struct PackageUniverse {
	base_arch: KString,
	packages: Vec<Package>,
	by_name: HashMap<KString, Vec<PkgId>>,
	by_provide: HashMap<KString, Vec<(PkgId, usize)>>,
	by_file: HashMap<String, Vec<PkgId>>,
	arches: BTreeSet<KString>,
}

impl PackageUniverse {
	/// Builds a universe for `base_arch`.
	///
	/// Records of foreign architectures are dropped, so are malformed
	/// capabilities.
	pub fn new(base_arch: &str, records: impl IntoIterator<Item = PackageRecord>) -> Self {
		let mut universe = Self {
			base_arch: KString::from_ref(base_arch),
			..Default::default()
		};
		for record in records {
			let arch = record.arch.as_str();
			if arch != base_arch && arch != NOARCH && arch != SRC_ARCH {
				continue;
			}
			universe.add(record);
		}
		universe
	}

	/// Parses a JSON array of [`PackageRecord`]s.
	pub fn from_json(base_arch: &str, json: &str) -> serde_json::Result<Self> {
		let records = serde_json::from_str::<Vec<PackageRecord>>(json)?;
		Ok(Self::new(base_arch, records))
	}

	fn add(&mut self, record: PackageRecord) {
		let id = self.packages.len();
		let evr = Evr::new(record.epoch, record.version, record.release);
		let parse_all = |caps: Vec<String>| {
			caps.into_iter()
				.filter_map(|cap| {
					let parsed = Capability::parse(&cap);
					if parsed.is_none() {
						debug!(package = %record.name, %cap, "skipping malformed capability");
					}
					parsed
				})
				.collect::<Vec<_>>()
		};
		let mut provides = vec![Capability::versioned(
			record.name.clone(),
			CmpOp::Eq,
			evr.clone(),
		)];
		provides.extend(parse_all(record.provides));
		let requires = parse_all(record.requires);

		for (index, cap) in provides.iter().enumerate() {
			self.by_provide
				.entry(cap.name.clone())
				.or_default()
				.push((id, index));
		}
		for file in &record.files {
			self.by_file.entry(file.clone()).or_default().push(id);
		}
		self.by_name.entry(record.name.clone()).or_default().push(id);
		self.arches.insert(record.arch.clone());
		self.packages.push(Package {
			name: record.name,
			evr,
			arch: record.arch,
			provides,
			requires,
			files: record.files,
		});
	}

	pub fn len(&self) -> usize {
		self.packages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.packages.is_empty()
	}

	pub fn package(&self, id: PkgId) -> &Package {
		&self.packages[id]
	}

	pub fn packages(&self) -> impl Iterator<Item = (PkgId, &Package)> {
		self.packages.iter().enumerate()
	}

	pub fn by_name(&self, name: &str) -> &[PkgId] {
		self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn by_file(&self, path: &str) -> &[PkgId] {
		self.by_file.get(path).map(Vec::as_slice).unwrap_or_default()
	}

	/// Whether any package has the architecture.
	pub fn has_arch(&self, arch: &str) -> bool {
		self.arches.contains(arch)
	}

	/// Whether any package provides a capability with this name.
	pub fn is_provided(&self, name: &str) -> bool {
		self.by_provide.contains_key(name)
	}

	/// Packages providing a capability, ascending by ID.
	///
	/// Requirements on absolute paths are also satisfied by files.
	pub fn what_provides(&self, cap: &Capability) -> Vec<PkgId> {
		let mut ids = self
			.by_provide
			.get(cap.name.as_str())
			.into_iter()
			.flatten()
			.filter(|(id, index)| self.packages[*id].provides[*index].overlaps(cap))
			.map(|(id, _)| *id)
			.collect::<Vec<_>>();
		if cap.name.starts_with('/') {
			ids.extend_from_slice(self.by_file(&cap.name));
		}
		ids.sort_unstable();
		ids.dedup();
		ids
	}

	/// Preference order of candidates: base architecture before `noarch`,
	/// then higher EVR, then name.
	pub fn compare_candidates(&self, a: PkgId, b: PkgId) -> Ordering {
		let rank = |id: PkgId| {
			let arch = &self.packages[id].arch;
			if *arch == self.base_arch {
				0
			} else if arch.as_str() == NOARCH {
				1
			} else {
				2
			}
		};
		let (pa, pb) = (&self.packages[a], &self.packages[b]);
		rank(a)
			.cmp(&rank(b))
			.then_with(|| pb.evr.compare(&pa.evr))
			.then_with(|| pa.name.cmp(&pb.name))
			.then_with(|| a.cmp(&b))
	}

	/// The most preferred of the candidates.
	pub fn best_of(&self, candidates: impl IntoIterator<Item = PkgId>) -> Option<PkgId> {
		candidates
			.into_iter()
			.min_by(|a, b| self.compare_candidates(*a, *b))
	}
}

#[cfg(test)]
pub(crate) mod test {
	use super::*;

	/// Shorthand record: `name-version-release.arch`.
	pub fn record(nevra: &str, provides: &[&str], requires: &[&str]) -> PackageRecord {
		let (rest, arch) = nevra.rsplit_once('.').unwrap();
		let (rest, release) = rest.rsplit_once('-').unwrap();
		let (name, version) = rest.rsplit_once('-').unwrap();
		PackageRecord {
			name: KString::from_ref(name),
			epoch: 0,
			version: version.to_string(),
			release: release.to_string(),
			arch: KString::from_ref(arch),
			provides: provides.iter().map(|s| s.to_string()).collect(),
			requires: requires.iter().map(|s| s.to_string()).collect(),
			files: vec![],
		}
	}

	#[test]
	fn test_load() {
		let json = r#"[
			{"name": "bash", "version": "5.2", "release": "1", "arch": "x86_64",
			 "provides": ["/bin/sh", "bad cap here ok"], "files": ["/usr/bin/bash"]},
			{"name": "bash", "version": "5.2", "release": "1", "arch": "aarch64"},
			{"name": "bash", "version": "5.2", "release": "1", "arch": "src"}
		]"#;
		let universe = PackageUniverse::from_json("x86_64", json).unwrap();
		assert_eq!(universe.len(), 2);
		assert!(universe.has_arch("src"));
		assert!(!universe.has_arch("aarch64"));
		let bash = universe.package(0);
		assert_eq!(bash.nevra(), "bash-5.2-1.x86_64");
		// implicit provide plus `/bin/sh`
		assert_eq!(bash.provides.len(), 2);
		assert_eq!(universe.by_file("/usr/bin/bash"), &[0]);
		assert_eq!(universe.what_provides(&Capability::unversioned("/usr/bin/bash")), vec![0]);
		assert_eq!(
			universe.what_provides(&Capability::parse("bash >= 5").unwrap()),
			vec![0, 1]
		);
		assert!(universe.what_provides(&Capability::parse("bash > 5.2").unwrap()).is_empty());
	}

	#[test]
	fn test_best_of() {
		let universe = PackageUniverse::new(
			"x86_64",
			[
				record("foo-1.0-1.noarch", &[], &[]),
				record("foo-2.0-1.noarch", &[], &[]),
				record("foo-1.5-1.x86_64", &[], &[]),
				record("bar-1.0-1.noarch", &[], &[]),
			],
		);
		assert_eq!(universe.best_of([0, 1, 2]), Some(2));
		assert_eq!(universe.best_of([0, 1]), Some(1));
		assert_eq!(universe.best_of([0, 3]), Some(3));
		assert_eq!(universe.best_of([]), None);
	}
}
