//! Epoch, version and release of packages, compared the way rpm does.

use std::{cmp::Ordering, fmt::Display};

/// Compares two version strings with the rpm algorithm.
///
/// Strings are split into alternating numeric and alphabetic segments,
/// separators are ignored. Numeric segments are newer than alphabetic ones,
/// `~` sorts before everything (including the end of the string) and `^`
/// sorts after the end of the string but before any other segment.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
	if a == b {
		return Ordering::Equal;
	}
	let mut one = a.as_bytes();
	let mut two = b.as_bytes();

	fn skip_separators(s: &[u8]) -> &[u8] {
		let n = s
			.iter()
			.take_while(|c| !c.is_ascii_alphanumeric() && **c != b'~' && **c != b'^')
			.count();
		&s[n..]
	}

	fn split_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
		let n = s
			.iter()
			.take_while(|c| {
				if numeric {
					c.is_ascii_digit()
				} else {
					c.is_ascii_alphabetic()
				}
			})
			.count();
		s.split_at(n)
	}

	while !one.is_empty() || !two.is_empty() {
		one = skip_separators(one);
		two = skip_separators(two);

		if one.first() == Some(&b'~') || two.first() == Some(&b'~') {
			if one.first() != Some(&b'~') {
				return Ordering::Greater;
			}
			if two.first() != Some(&b'~') {
				return Ordering::Less;
			}
			one = &one[1..];
			two = &two[1..];
			continue;
		}

		if one.first() == Some(&b'^') || two.first() == Some(&b'^') {
			if one.is_empty() {
				return Ordering::Less;
			}
			if two.is_empty() {
				return Ordering::Greater;
			}
			if one.first() != Some(&b'^') {
				return Ordering::Greater;
			}
			if two.first() != Some(&b'^') {
				return Ordering::Less;
			}
			one = &one[1..];
			two = &two[1..];
			continue;
		}

		if one.is_empty() || two.is_empty() {
			break;
		}

		let numeric = one[0].is_ascii_digit();
		let (seg1, rest1) = split_segment(one, numeric);
		let (seg2, rest2) = split_segment(two, numeric);
		one = rest1;
		two = rest2;

		if seg2.is_empty() {
			// segments of different types
			return if numeric {
				Ordering::Greater
			} else {
				Ordering::Less
			};
		}

		let order = if numeric {
			let seg1 = trim_zeros(seg1);
			let seg2 = trim_zeros(seg2);
			seg1.len().cmp(&seg2.len()).then_with(|| seg1.cmp(seg2))
		} else {
			seg1.cmp(seg2)
		};
		if order != Ordering::Equal {
			return order;
		}
	}

	match (one.is_empty(), two.is_empty()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Less,
		_ => Ordering::Greater,
	}
}

fn trim_zeros(s: &[u8]) -> &[u8] {
	let n = s.iter().take_while(|c| **c == b'0').count();
	&s[n..]
}

/// `[epoch:]version[-release]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Evr {
	pub epoch: i32,
	pub version: String,
	pub release: Option<String>,
}

impl Evr {
	pub fn new(epoch: i32, version: impl Into<String>, release: impl Into<String>) -> Self {
		Self {
			epoch,
			version: version.into(),
			release: Some(release.into()),
		}
	}

	/// Parses `[epoch:]version[-release]`.
	///
	/// Returns `None` for an empty version or a malformed epoch.
	pub fn parse(s: &str) -> Option<Self> {
		let (epoch, rest) = match s.split_once(':') {
			Some((epoch, rest)) => (epoch.parse::<i32>().ok()?, rest),
			None => (0, s),
		};
		let (version, release) = match rest.rsplit_once('-') {
			Some((version, release)) => (version, Some(release.to_string())),
			None => (rest, None),
		};
		if version.is_empty() || release.as_deref() == Some("") {
			return None;
		}
		Some(Self {
			epoch,
			version: version.to_string(),
			release,
		})
	}

	/// Compares two EVRs. Releases are only compared when both sides carry
	/// one.
	pub fn compare(&self, other: &Evr) -> Ordering {
		self.epoch
			.cmp(&other.epoch)
			.then_with(|| rpmvercmp(&self.version, &other.version))
			.then_with(|| match (&self.release, &other.release) {
				(Some(a), Some(b)) => rpmvercmp(a, b),
				_ => Ordering::Equal,
			})
	}
}

impl Display for Evr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.epoch > 0 {
			write!(f, "{}:", self.epoch)?;
		}
		f.write_str(&self.version)?;
		if let Some(release) = &self.release {
			write!(f, "-{}", release)?;
		}
		Ok(())
	}
}
