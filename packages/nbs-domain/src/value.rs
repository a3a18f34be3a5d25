//! Scalar constraint compilation.
//!
//! A value constraint is a single-key object drawn from `eq`, `in`, `not` and `not_in`; a date
//! constraint is a single-key object drawn from `lt`, `gt`, `lte` and `gte`. Each compiles to
//! exactly one comparison expression in the native query dialect.

use serde_json::{Value, json};
use time::{
	Date, OffsetDateTime, PrimitiveDateTime, UtcOffset,
	format_description::well_known::{Iso8601, Rfc3339},
	macros::format_description,
};

use crate::{Error, Result};

const VALUE_OPERATORS: [&str; 4] = ["eq", "in", "not", "not_in"];
const DATE_OPERATORS: [&str; 4] = ["lt", "gt", "lte", "gte"];

#[derive(Debug, Clone, PartialEq)]
pub enum ValueConstraint {
	/// Exact equality.
	Eq(Value),
	/// Exact inequality.
	Not(Value),
	/// Literal substring containment.
	In(String),
	/// Negated literal substring containment.
	NotIn(String),
}
impl ValueConstraint {
	pub fn parse(path: &str, raw: &Value) -> Result<Self> {
		let (op, value) = single_operator(path, raw, &VALUE_OPERATORS)?;
		let value_path = format!("{path}.{op}");

		match op {
			"eq" => Ok(Self::Eq(scalar(&value_path, value)?)),
			"not" => Ok(Self::Not(scalar(&value_path, value)?)),
			"in" => Ok(Self::In(string(&value_path, value)?)),
			_ => Ok(Self::NotIn(string(&value_path, value)?)),
		}
	}

	pub fn to_native(&self) -> Value {
		match self {
			Self::Eq(value) => json!({ "$eq": value }),
			Self::Not(value) => json!({ "$ne": value }),
			Self::In(substr) => json!({ "$regex": substring_pattern(substr) }),
			Self::NotIn(substr) => json!({ "$not": { "$regex": substring_pattern(substr) } }),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOp {
	Lt,
	Gt,
	Lte,
	Gte,
}
impl DateOp {
	pub fn as_native(&self) -> &'static str {
		match self {
			Self::Lt => "$lt",
			Self::Gt => "$gt",
			Self::Lte => "$lte",
			Self::Gte => "$gte",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateConstraint {
	pub op: DateOp,
	pub at: OffsetDateTime,
	rendered: String,
}
impl DateConstraint {
	pub fn new(op: DateOp, at: OffsetDateTime) -> Option<Self> {
		let at = at.to_offset(UtcOffset::UTC);
		let rendered = at.format(&Rfc3339).ok()?;

		Some(Self { op, at, rendered })
	}

	pub fn parse(path: &str, raw: &Value) -> Result<Self> {
		let (op, value) = single_operator(path, raw, &DATE_OPERATORS)?;
		let value_path = format!("{path}.{op}");
		let text = string(&value_path, value)?;
		let op = match op {
			"lt" => DateOp::Lt,
			"gt" => DateOp::Gt,
			"lte" => DateOp::Lte,
			_ => DateOp::Gte,
		};
		let at = parse_timestamp(&text)
			.ok_or_else(|| Error::InvalidDate { path: value_path.clone(), value: text.clone() })?;

		Self::new(op, at).ok_or(Error::InvalidDate { path: value_path, value: text })
	}

	pub fn to_native(&self) -> Value {
		let op = self.op.as_native();

		json!({ op: { "$date": self.rendered } })
	}
}

/// Compiles a raw `{eq|in|not|not_in: ...}` object.
pub fn compile_value(raw: &Value) -> Result<Value> {
	ValueConstraint::parse("$", raw).map(|constraint| constraint.to_native())
}

/// Compiles a raw `{lt|gt|lte|gte: "<ISO-8601>"}` object.
pub fn compile_date(raw: &Value) -> Result<Value> {
	DateConstraint::parse("$", raw).map(|constraint| constraint.to_native())
}

/// Unanchored pattern matching `substr` literally.
pub fn substring_pattern(substr: &str) -> String {
	regex::escape(substr)
}

/// Pattern matching values that start with `prefix` literally.
pub fn prefix_pattern(prefix: &str) -> String {
	format!("^{}", regex::escape(prefix))
}

/// Accepts RFC 3339, general ISO-8601 with an offset, a naive date-time (taken as UTC), or a bare
/// calendar date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Some(at);
	}
	if let Ok(at) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
		return Some(at);
	}
	if let Ok(at) = PrimitiveDateTime::parse(
		raw,
		format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
	) {
		return Some(at.assume_utc());
	}

	Date::parse(raw, format_description!("[year]-[month]-[day]"))
		.ok()
		.map(|date| date.midnight().assume_utc())
}

fn single_operator<'a>(
	path: &str,
	raw: &'a Value,
	allowed: &[&str],
) -> Result<(&'a str, &'a Value)> {
	let obj =
		raw.as_object().ok_or_else(|| Error::constraint(path, "constraint must be an object."))?;
	let expected = || format!("constraint must have exactly one of {}.", allowed.join(", "));
	let mut entries = obj.iter();
	let Some((op, value)) = entries.next() else {
		return Err(Error::constraint(path, expected()));
	};

	if entries.next().is_some() {
		return Err(Error::constraint(path, expected()));
	}
	if !allowed.contains(&op.as_str()) {
		return Err(Error::constraint(
			format!("{path}.{op}"),
			format!("unsupported operator '{op}', {}", expected()),
		));
	}

	Ok((op.as_str(), value))
}

fn scalar(path: &str, value: &Value) -> Result<Value> {
	match value {
		Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(value.clone()),
		_ => Err(Error::constraint(path, "value must be a string, number, or boolean.")),
	}
}

fn string(path: &str, value: &Value) -> Result<String> {
	value
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| Error::constraint(path, "value must be a string."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn each_value_operator_yields_one_comparison() {
		assert_eq!(compile_value(&json!({ "eq": "a" })).unwrap(), json!({ "$eq": "a" }));
		assert_eq!(compile_value(&json!({ "not": 3 })).unwrap(), json!({ "$ne": 3 }));
		assert_eq!(compile_value(&json!({ "in": "ab" })).unwrap(), json!({ "$regex": "ab" }));
		assert_eq!(
			compile_value(&json!({ "not_in": "ab" })).unwrap(),
			json!({ "$not": { "$regex": "ab" } })
		);
	}

	#[test]
	fn rejects_zero_or_many_operators() {
		for raw in [json!({}), json!({ "eq": "a", "in": "b" }), json!({ "like": "a" }), json!("a")]
		{
			let err = compile_value(&raw).expect_err("expected invalid constraint");

			assert!(matches!(err, Error::InvalidConstraint { .. }), "unexpected error: {err:?}");
		}
	}

	#[test]
	fn substring_is_matched_literally() {
		assert_eq!(
			compile_value(&json!({ "in": "a.b*(c)" })).unwrap(),
			json!({ "$regex": r"a\.b\*\(c\)" })
		);
		assert_eq!(prefix_pattern("ab+"), r"^ab\+");
	}

	#[test]
	fn compiles_date_operators() {
		assert_eq!(
			compile_date(&json!({ "gte": "2020-01-01" })).unwrap(),
			json!({ "$gte": { "$date": "2020-01-01T00:00:00Z" } })
		);
		assert_eq!(
			compile_date(&json!({ "lt": "2021-03-04T05:06:07+09:00" })).unwrap(),
			json!({ "$lt": { "$date": "2021-03-03T20:06:07Z" } })
		);
		assert_eq!(
			compile_date(&json!({ "gt": "2021-03-04T05:06:07" })).unwrap(),
			json!({ "$gt": { "$date": "2021-03-04T05:06:07Z" } })
		);
	}

	#[test]
	fn rejects_unparsable_dates() {
		let err = compile_date(&json!({ "lte": "yesterday" })).expect_err("expected invalid date");

		assert_eq!(
			err,
			Error::InvalidDate { path: "$.lte".to_string(), value: "yesterday".to_string() }
		);
		assert!(matches!(
			compile_date(&json!({ "eq": "2020-01-01" })),
			Err(Error::InvalidConstraint { .. })
		));
	}
}
