//! Dependency differ.

use std::collections::{BTreeMap, HashSet};

use vigil_backend_model::dependency::{DependencyChange, DependencyEntry};

/// Computes the changes between two dependency snapshots of a package.
///
/// Entries are compared by name, epoch, version and release. Names only in
/// `prev` are removed, names only in `curr` are added, names in both with a
/// different version are changed. The distance is taken from the current
/// entry when there is one.
///
/// Nothing is reported when either snapshot is empty, since there is no
/// meaningful base to compare against. Changes are ordered by name.
pub fn diff_dependencies(
	prev: &[DependencyEntry],
	curr: &[DependencyEntry],
) -> Vec<DependencyChange> {
	if prev.is_empty() || curr.is_empty() {
		return vec![];
	}
	let prev_keys = prev.iter().map(DependencyEntry::key).collect::<HashSet<_>>();
	let curr_keys = curr.iter().map(DependencyEntry::key).collect::<HashSet<_>>();

	let mut changes = BTreeMap::<&str, DependencyChange>::new();
	for dep in prev.iter().filter(|dep| !curr_keys.contains(&dep.key())) {
		changes.insert(
			dep.name.as_str(),
			DependencyChange {
				dep_name: dep.name.clone(),
				prev: Some(dep.version()),
				curr: None,
				distance: dep.distance,
			},
		);
	}
	for dep in curr.iter().filter(|dep| !prev_keys.contains(&dep.key())) {
		let change = changes
			.entry(dep.name.as_str())
			.or_insert_with(|| DependencyChange {
				dep_name: dep.name.clone(),
				prev: None,
				curr: None,
				distance: None,
			});
		change.curr = Some(dep.version());
		change.distance = dep.distance;
	}
	changes.into_values().collect()
}
