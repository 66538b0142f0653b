//! Capabilities provided and required by packages.

use std::{cmp::Ordering, fmt::Display};

use kstring::KString;

use crate::evr::Evr;

/// Comparison operator of a versioned capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
	Lt,
	Le,
	Eq,
	Ge,
	Gt,
}

impl CmpOp {
	pub fn parse(s: &str) -> Option<Self> {
		Some(match s {
			"<" => Self::Lt,
			"<=" => Self::Le,
			"=" | "==" => Self::Eq,
			">=" => Self::Ge,
			">" => Self::Gt,
			_ => return None,
		})
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			CmpOp::Lt => "<",
			CmpOp::Le => "<=",
			CmpOp::Eq => "=",
			CmpOp::Ge => ">=",
			CmpOp::Gt => ">",
		}
	}

	fn less(&self) -> bool {
		matches!(self, CmpOp::Lt | CmpOp::Le)
	}

	fn greater(&self) -> bool {
		matches!(self, CmpOp::Gt | CmpOp::Ge)
	}

	fn equal(&self) -> bool {
		matches!(self, CmpOp::Le | CmpOp::Eq | CmpOp::Ge)
	}
}

/// `name [op evr]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
	pub name: KString,
	pub constraint: Option<(CmpOp, Evr)>,
}

impl Capability {
	pub fn unversioned(name: impl Into<KString>) -> Self {
		Self {
			name: name.into(),
			constraint: None,
		}
	}

	pub fn versioned(name: impl Into<KString>, op: CmpOp, evr: Evr) -> Self {
		Self {
			name: name.into(),
			constraint: Some((op, evr)),
		}
	}

	/// Parses `name` or `name OP evr`, with whitespace between the parts.
	pub fn parse(s: &str) -> Option<Self> {
		let mut parts = s.split_whitespace();
		let name = parts.next()?;
		match (parts.next(), parts.next(), parts.next()) {
			(None, _, _) => Some(Self::unversioned(KString::from_ref(name))),
			(Some(op), Some(evr), None) => Some(Self::versioned(
				KString::from_ref(name),
				CmpOp::parse(op)?,
				Evr::parse(evr)?,
			)),
			_ => None,
		}
	}

	/// Whether the name is one of the implicit rpm library features.
	pub fn is_rpmlib(&self) -> bool {
		self.name.starts_with("rpmlib(")
	}

	/// Whether the version ranges of two capabilities with the same name
	/// intersect. An unversioned side matches everything.
	pub fn overlaps(&self, other: &Capability) -> bool {
		if self.name != other.name {
			return false;
		}
		let (Some((op_a, evr_a)), Some((op_b, evr_b))) = (&self.constraint, &other.constraint)
		else {
			return true;
		};
		match evr_a.compare(evr_b) {
			Ordering::Less => op_a.greater() || op_b.less(),
			Ordering::Greater => op_a.less() || op_b.greater(),
			Ordering::Equal => {
				(op_a.equal() && op_b.equal())
					|| (op_a.less() && op_b.less())
					|| (op_a.greater() && op_b.greater())
			}
		}
	}
}

impl Display for Capability {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.name)?;
		if let Some((op, evr)) = &self.constraint {
			write!(f, " {} {}", op.as_str(), evr)?;
		}
		Ok(())
	}
}
