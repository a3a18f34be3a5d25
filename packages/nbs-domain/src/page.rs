//! Pagination and sort parameters.

use serde_json::{Value, json};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub start: u64,
	pub limit: u64,
}
impl Page {
	/// Parses raw query parameters. Absent values fall back to `0` and `default_limit`.
	pub fn parse(
		start: Option<&str>,
		limit: Option<&str>,
		default_limit: u64,
		max_limit: u64,
	) -> Result<Self> {
		let start = match start {
			Some(raw) => non_negative("start", raw)?,
			None => 0,
		};
		let limit = match limit {
			Some(raw) => non_negative("limit", raw)?,
			None => default_limit,
		};

		if limit == 0 {
			return Err(Error::InvalidPage {
				name: "limit",
				value: limit.to_string(),
				message: "must be at least 1.".to_string(),
			});
		}
		if limit > max_limit {
			return Err(Error::InvalidPage {
				name: "limit",
				value: limit.to_string(),
				message: format!("must not exceed {max_limit}."),
			});
		}

		Ok(Self { start, limit })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
	Asc,
	Desc,
}
impl SortOrder {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}

	pub fn as_native(&self) -> i64 {
		match self {
			Self::Asc => 1,
			Self::Desc => -1,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
	pub field: String,
	pub order: SortOrder,
}
impl SortSpec {
	/// Parses `field-asc` or `field-desc`, splitting at the last `-`.
	pub fn parse(raw: &str) -> Result<Self> {
		let invalid = || Error::InvalidSort { value: raw.to_string() };
		let (field, order) = raw.rsplit_once('-').ok_or_else(invalid)?;
		let order = match order {
			"asc" => SortOrder::Asc,
			"desc" => SortOrder::Desc,
			_ => return Err(invalid()),
		};

		if field.is_empty() {
			return Err(invalid());
		}

		Ok(Self { field: field.to_string(), order })
	}

	/// Sort document for the database.
	pub fn to_native(&self) -> Value {
		let field = self.field.as_str();

		json!({ field: self.order.as_native() })
	}

	/// Sort parameter for the full-text index.
	pub fn to_index(&self) -> String {
		format!("{} {}", self.field, self.order.as_str())
	}
}

fn non_negative(name: &'static str, raw: &str) -> Result<u64> {
	raw.trim().parse::<u64>().map_err(|_| Error::InvalidPage {
		name,
		value: raw.to_string(),
		message: "must be a non-negative integer.".to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_apply_when_absent() {
		assert_eq!(Page::parse(None, None, 50, 1_000).unwrap(), Page { start: 0, limit: 50 });
		assert_eq!(
			Page::parse(Some("10"), Some("5"), 50, 1_000).unwrap(),
			Page { start: 10, limit: 5 }
		);
	}

	#[test]
	fn rejects_negative_and_non_numeric() {
		for (start, limit) in [(Some("-1"), None), (None, Some("x")), (None, Some("1.5"))] {
			assert!(matches!(
				Page::parse(start, limit, 50, 1_000),
				Err(Error::InvalidPage { .. })
			));
		}

		let err = Page::parse(None, Some("1001"), 50, 1_000).expect_err("expected limit error");

		assert!(matches!(err, Error::InvalidPage { name: "limit", .. }));
	}

	#[test]
	fn zero_limit_is_rejected() {
		let err = Page::parse(Some("0"), Some("0"), 50, 1_000).expect_err("expected limit error");

		assert!(matches!(err, Error::InvalidPage { name: "limit", .. }));
		assert_eq!(
			Page::parse(Some("0"), Some("1"), 50, 1_000).unwrap(),
			Page { start: 0, limit: 1 }
		);
	}

	#[test]
	fn sort_splits_at_last_dash() {
		let sort = SortSpec::parse("lc-notebook-mtime-desc").unwrap();

		assert_eq!(sort.field, "lc-notebook-mtime");
		assert_eq!(sort.to_native(), json!({ "lc-notebook-mtime": -1 }));
		assert_eq!(SortSpec::parse("mtime-asc").unwrap().to_index(), "mtime asc");
	}

	#[test]
	fn sort_rejects_unknown_order() {
		for raw in ["mtime", "mtime-up", "-asc"] {
			assert_eq!(
				SortSpec::parse(raw).expect_err("expected invalid sort"),
				Error::InvalidSort { value: raw.to_string() }
			);
		}
	}
}
