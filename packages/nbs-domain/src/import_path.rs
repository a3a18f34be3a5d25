//! Destination validation and collision-free naming for notebook imports.
//!
//! Everything here is pure: the materializer performs the filesystem side effects only after a
//! destination has been accepted.

use std::path::{Path, PathBuf};

use crate::{Error, Result, TraversalReason};

const SEPARATOR: char = '/';
const CURRENT_DIR: &str = ".";

/// A validated destination directory, relative to the import root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
	relative: String,
	components: Vec<String>,
}
impl Destination {
	/// `"."` for the import root.
	pub fn as_str(&self) -> &str {
		&self.relative
	}

	/// True when the destination is exactly the reserved staging directory.
	pub fn is_staging(&self, staging_dir: &str) -> bool {
		matches!(self.components.as_slice(), [only] if only == staging_dir)
	}

	pub fn resolve(&self, root: &Path) -> PathBuf {
		self.components.iter().fold(root.to_path_buf(), |path, component| path.join(component))
	}
}

/// Validates an untrusted destination.
///
/// One leading separator is stripped. A second leading separator, a `.` or `..` component
/// anywhere, or a NUL or backslash character is rejected. An absent or empty value means the
/// caller supplied no destination at all.
pub fn validate_destination(raw: Option<&str>) -> Result<Destination> {
	let raw = match raw {
		None | Some("") => return Err(Error::DestinationMissing),
		Some(raw) => raw,
	};
	let rejected = |reason| Error::PathTraversalRejected { path: raw.to_string(), reason };
	let stripped = raw.strip_prefix(SEPARATOR).unwrap_or(raw);

	if stripped.starts_with(SEPARATOR) {
		return Err(rejected(TraversalReason::Absolute));
	}
	if stripped.contains(['\0', '\\']) {
		return Err(rejected(TraversalReason::InvalidCharacter));
	}

	let mut components = Vec::new();

	for component in stripped.split(SEPARATOR) {
		match component {
			"" => continue,
			"." | ".." => return Err(rejected(TraversalReason::SpecialComponent)),
			_ => components.push(component.to_string()),
		}
	}

	let relative = if components.is_empty() { CURRENT_DIR.to_string() } else { components.join("/") };

	Ok(Destination { relative, components })
}

/// Final path segment of a stored filename; `None` when nothing usable remains.
pub fn safe_basename(stored: &str) -> Option<&str> {
	let name = stored.rsplit(['/', '\\']).next()?;

	match name {
		"" | "." | ".." => None,
		_ if name.contains('\0') => None,
		_ => Some(name),
	}
}

/// Splits `name` into stem and extension at the last dot. Leading dots belong to the stem, so
/// `.bashrc` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
	let body_start = name.len() - name.trim_start_matches('.').len();

	match name[body_start..].rfind('.') {
		Some(dot) => name.split_at(body_start + dot),
		None => (name, ""),
	}
}

/// The name tried at `index`: the name itself at `0`, then `stem (index)ext`.
pub fn candidate_filename(name: &str, index: u64) -> String {
	if index == 0 {
		return name.to_string();
	}

	let (stem, ext) = split_extension(name);

	format!("{stem} ({index}){ext}")
}
