//! Per-cell predicate compilation.
//!
//! A cell match is an object whose keys come from a closed vocabulary, each optionally prefixed
//! with `not_`. Non-negated field expressions are merged into one object; negated expressions are
//! merged into a second object that is excluded as a whole. The result is wrapped in an element
//! match so that every predicate must hold for the same cell.

use serde_json::{Map, Value, json};

use crate::{
	CELLS_FIELD, Error, MEME_CURRENT_FIELD, MEME_NEXT_FIELD, MEME_PREVIOUS_FIELD, Result,
	value::ValueConstraint,
};

const NEGATION_PREFIX: &str = "not_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellField {
	Meme,
	InMeme,
	PrevMeme,
	InPrevMeme,
	NextMeme,
	InNextMeme,
	InCode,
	InMarkdown,
	InOutput,
}
impl CellField {
	pub const ALL: [Self; 9] = [
		Self::Meme,
		Self::InMeme,
		Self::PrevMeme,
		Self::InPrevMeme,
		Self::NextMeme,
		Self::InNextMeme,
		Self::InCode,
		Self::InMarkdown,
		Self::InOutput,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Meme => "meme",
			Self::InMeme => "in_meme",
			Self::PrevMeme => "prev_meme",
			Self::InPrevMeme => "in_prev_meme",
			Self::NextMeme => "next_meme",
			Self::InNextMeme => "in_next_meme",
			Self::InCode => "in_code",
			Self::InMarkdown => "in_markdown",
			Self::InOutput => "in_output",
		}
	}

	pub fn from_key(key: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|field| field.as_str() == key)
	}

	/// Field expressions contributed by this predicate, keyed by cell-relative path.
	fn partial(&self, value: &str) -> Map<String, Value> {
		let exact = || ValueConstraint::Eq(Value::String(value.to_string())).to_native();
		let contains = || ValueConstraint::In(value.to_string()).to_native();
		let mut out = Map::new();

		match self {
			Self::Meme => {
				out.insert(MEME_CURRENT_FIELD.to_string(), exact());
			},
			Self::InMeme => {
				out.insert(MEME_CURRENT_FIELD.to_string(), contains());
			},
			Self::PrevMeme => {
				out.insert(MEME_PREVIOUS_FIELD.to_string(), exact());
			},
			Self::InPrevMeme => {
				out.insert(MEME_PREVIOUS_FIELD.to_string(), contains());
			},
			Self::NextMeme => {
				out.insert(MEME_NEXT_FIELD.to_string(), exact());
			},
			Self::InNextMeme => {
				out.insert(MEME_NEXT_FIELD.to_string(), contains());
			},
			Self::InCode => {
				out.insert("cell_type".to_string(), Value::String("code".to_string()));
				out.insert("source".to_string(), contains());
			},
			Self::InMarkdown => {
				out.insert("cell_type".to_string(), Value::String("markdown".to_string()));
				out.insert("source".to_string(), contains());
			},
			Self::InOutput => {
				out.insert("outputs.text".to_string(), contains());
			},
		}

		out
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPredicate {
	pub field: CellField,
	pub negated: bool,
	pub value: String,
}
impl CellPredicate {
	pub fn parse(path: &str, key: &str, raw: &Value) -> Result<Self> {
		let (name, negated) = match key.strip_prefix(NEGATION_PREFIX) {
			Some(rest) => (rest, true),
			None => (key, false),
		};
		let field = CellField::from_key(name).ok_or_else(|| Error::UnknownPredicateKey {
			path: format!("{path}.{key}"),
			key: key.to_string(),
		})?;
		let value = raw
			.as_str()
			.ok_or_else(|| Error::constraint(format!("{path}.{key}"), "value must be a string."))?;

		Ok(Self { field, negated, value: value.to_string() })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMatch {
	pub predicates: Vec<CellPredicate>,
}
impl CellMatch {
	pub fn parse(path: &str, raw: &Value) -> Result<Self> {
		let obj =
			raw.as_object().ok_or_else(|| Error::constraint(path, "cell match must be an object."))?;

		if obj.is_empty() {
			return Err(Error::constraint(path, "cell match must contain at least one predicate."));
		}

		let predicates = obj
			.iter()
			.map(|(key, value)| CellPredicate::parse(path, key, value))
			.collect::<Result<Vec<_>>>()?;

		Ok(Self { predicates })
	}

	/// Expression evaluated against a single cell.
	pub fn to_cell_expr(&self) -> Value {
		let mut positive = Vec::new();
		let mut negative = Vec::new();

		for predicate in &self.predicates {
			let partial = predicate.field.partial(&predicate.value);

			if predicate.negated {
				negative.push(partial);
			} else {
				positive.push(partial);
			}
		}

		match (positive.is_empty(), negative.is_empty()) {
			(_, true) => merge_partials(positive),
			(true, false) => json!({ "$nor": [merge_partials(negative)] }),
			(false, false) => json!({
				"$and": [merge_partials(positive), { "$nor": [merge_partials(negative)] }]
			}),
		}
	}

	pub fn to_native(&self) -> Value {
		json!({ CELLS_FIELD: { "$elemMatch": self.to_cell_expr() } })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellClause {
	And(Vec<CellMatch>),
	Or(Vec<CellMatch>),
}
impl CellClause {
	/// `Ok(None)` when neither combinator is present or the list is empty.
	pub fn parse(path: &str, raw: &Value) -> Result<Option<Self>> {
		let obj =
			raw.as_object().ok_or_else(|| Error::constraint(path, "cell clause must be an object."))?;

		for key in obj.keys() {
			if !matches!(key.as_str(), "and" | "or") {
				return Err(Error::constraint(
					format!("{path}.{key}"),
					"cell clause accepts only 'and' or 'or'.",
				));
			}
		}

		let clause = match (obj.get("and"), obj.get("or")) {
			(Some(_), Some(_)) =>
				return Err(Error::constraint(path, "cell clause must not have both 'and' and 'or'.")),
			(Some(raw), None) => Self::And(parse_matches(&format!("{path}.and"), raw)?),
			(None, Some(raw)) => Self::Or(parse_matches(&format!("{path}.or"), raw)?),
			(None, None) => return Ok(None),
		};

		if clause.matches().is_empty() { Ok(None) } else { Ok(Some(clause)) }
	}

	pub fn matches(&self) -> &[CellMatch] {
		match self {
			Self::And(matches) | Self::Or(matches) => matches,
		}
	}

	pub fn to_native(&self) -> Value {
		let combinator = match self {
			Self::And(_) => "$and",
			Self::Or(_) => "$or",
		};
		let parts = self.matches().iter().map(CellMatch::to_native).collect::<Vec<_>>();

		json!({ combinator: parts })
	}
}

/// Compiles one raw cell match into an element match against the cells array.
pub fn compile_cell_match(raw: &Value) -> Result<Value> {
	CellMatch::parse("$", raw).map(|cell_match| cell_match.to_native())
}

fn parse_matches(path: &str, raw: &Value) -> Result<Vec<CellMatch>> {
	let items = raw.as_array().ok_or_else(|| Error::constraint(path, "must be an array."))?;

	items
		.iter()
		.enumerate()
		.map(|(idx, item)| CellMatch::parse(&format!("{path}[{idx}]"), item))
		.collect()
}

/// Merges partials into one object; partials that write the same field are kept apart under
/// `$and` so neither is dropped.
fn merge_partials(partials: Vec<Map<String, Value>>) -> Value {
	let mut merged = Map::new();
	let mut collided = false;

	for partial in &partials {
		for (key, value) in partial {
			if merged.insert(key.clone(), value.clone()).is_some() {
				collided = true;
			}
		}
	}

	if collided {
		json!({ "$and": partials.into_iter().map(Value::Object).collect::<Vec<_>>() })
	} else {
		Value::Object(merged)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn in_code_constrains_type_and_source() {
		assert_eq!(
			compile_cell_match(&json!({ "in_code": "X" })).unwrap(),
			json!({ "cells": { "$elemMatch": { "cell_type": "code", "source": { "$regex": "X" } } } })
		);
	}

	#[test]
	fn negation_wraps_the_whole_field_pair() {
		assert_eq!(
			compile_cell_match(&json!({ "not_in_code": "X" })).unwrap(),
			json!({ "cells": { "$elemMatch": {
				"$nor": [{ "cell_type": "code", "source": { "$regex": "X" } }]
			} } })
		);
	}

	#[test]
	fn negation_applies_only_to_its_own_field() {
		assert_eq!(
			compile_cell_match(&json!({ "in_code": "X", "not_in_output": "Y" })).unwrap(),
			json!({ "cells": { "$elemMatch": { "$and": [
				{ "cell_type": "code", "source": { "$regex": "X" } },
				{ "$nor": [{ "outputs.text": { "$regex": "Y" } }] }
			] } } })
		);
	}

	#[test]
	fn lineage_keys_map_to_meme_fields() {
		assert_eq!(
			compile_cell_match(&json!({ "meme": "m1", "in_prev_meme": "p", "next_meme": "n" }))
				.unwrap(),
			json!({ "cells": { "$elemMatch": {
				"metadata.lc_cell_meme.current": { "$eq": "m1" },
				"metadata.lc_cell_meme.previous": { "$regex": "p" },
				"metadata.lc_cell_meme.next": { "$eq": "n" }
			} } })
		);
	}

	#[test]
	fn colliding_fields_are_conjoined() {
		assert_eq!(
			compile_cell_match(&json!({ "in_code": "a", "in_markdown": "b" })).unwrap(),
			json!({ "cells": { "$elemMatch": { "$and": [
				{ "cell_type": "code", "source": { "$regex": "a" } },
				{ "cell_type": "markdown", "source": { "$regex": "b" } }
			] } } })
		);
	}

	#[test]
	fn unknown_key_is_reported() {
		let err = compile_cell_match(&json!({ "not_valid": "X" })).expect_err("expected error");

		assert_eq!(
			err,
			Error::UnknownPredicateKey { path: "$.not_valid".to_string(), key: "not_valid".to_string() }
		);
		assert!(matches!(
			compile_cell_match(&json!({ "not_not_in_code": "X" })),
			Err(Error::UnknownPredicateKey { .. })
		));
	}

	#[test]
	fn clause_rejects_both_combinators() {
		let raw = json!({ "and": [{ "in_code": "a" }], "or": [{ "in_code": "b" }] });

		assert!(matches!(CellClause::parse("$.cell", &raw), Err(Error::InvalidConstraint { .. })));
		assert_eq!(CellClause::parse("$.cell", &json!({})).unwrap(), None);
		assert_eq!(CellClause::parse("$.cell", &json!({ "or": [] })).unwrap(), None);
	}
}
