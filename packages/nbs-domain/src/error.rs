use std::fmt::{Display, Formatter};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Invalid constraint at {path}: {message}")]
	InvalidConstraint { path: String, message: String },
	#[error("Invalid date at {path}: {value:?} is not an ISO-8601 timestamp.")]
	InvalidDate { path: String, value: String },
	#[error("Unknown predicate key {key:?} at {path}.")]
	UnknownPredicateKey { path: String, key: String },
	#[error("Invalid page parameter {name}={value:?}: {message}")]
	InvalidPage { name: &'static str, value: String, message: String },
	#[error("Invalid sort {value:?}, expected <field>-asc or <field>-desc.")]
	InvalidSort { value: String },
	#[error("Destination path is missing.")]
	DestinationMissing,
	#[error("Destination path {path:?} is rejected: {reason}.")]
	PathTraversalRejected { path: String, reason: TraversalReason },
}
impl Error {
	pub(crate) fn constraint(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidConstraint { path: path.into(), message: message.into() }
	}

	/// JSON path of the offending NQ node, when the error came from NQ input.
	pub fn path(&self) -> Option<&str> {
		match self {
			Self::InvalidConstraint { path, .. }
			| Self::InvalidDate { path, .. }
			| Self::UnknownPredicateKey { path, .. } => Some(path),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalReason {
	/// More than one leading separator.
	Absolute,
	/// A `.` or `..` component.
	SpecialComponent,
	/// A NUL byte or backslash inside a component.
	InvalidCharacter,
}
impl Display for TraversalReason {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Absolute => f.write_str("absolute paths are not allowed"),
			Self::SpecialComponent => f.write_str("'.' and '..' components are not allowed"),
			Self::InvalidCharacter => f.write_str("path contains a forbidden character"),
		}
	}
}
