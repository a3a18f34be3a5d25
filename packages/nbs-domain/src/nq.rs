//! The notebook query document.

use serde_json::{Map, Value, json};

use crate::{Error, Result, cell::CellClause, notebook::NotebookClause};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetClause {
	pub text: Option<String>,
	pub history_in: Option<String>,
	pub history_related: Option<String>,
}
impl TargetClause {
	pub fn parse(path: &str, raw: &Value) -> Result<Self> {
		let obj = raw
			.as_object()
			.ok_or_else(|| Error::constraint(path, "target clause must be an object."))?;
		let mut clause = Self::default();

		for (key, value) in obj {
			let field_path = format!("{path}.{key}");
			let text = value
				.as_str()
				.ok_or_else(|| Error::constraint(&field_path, "value must be a string."))?;

			match key.as_str() {
				"type" if text == "all" => {},
				"type" => return Err(Error::constraint(field_path, "target type must be 'all'.")),
				"text" => clause.text = Some(text.to_string()),
				"history_in" => clause.history_in = Some(text.to_string()),
				"history_related" => clause.history_related = Some(text.to_string()),
				_ => {
					return Err(Error::constraint(
						field_path,
						"target clause accepts only text, history_in, or history_related.",
					));
				},
			}
		}

		Ok(clause)
	}

	pub fn is_empty(&self) -> bool {
		self.text.is_none() && self.history_in.is_none() && self.history_related.is_none()
	}
}

/// A parsed NQ. Clauses are independent and implicitly ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nq {
	pub target: Option<TargetClause>,
	pub notebook: Option<NotebookClause>,
	pub cell: Option<CellClause>,
	raw: Value,
}
impl Nq {
	/// Validates the whole document before anything is compiled.
	pub fn parse(raw: &Value) -> Result<Self> {
		let path = "$";
		let obj = raw.as_object().ok_or_else(|| Error::constraint(path, "nq must be an object."))?;
		let mut nq = Self { raw: raw.clone(), ..Self::default() };

		for (key, value) in obj {
			let clause_path = format!("{path}.{key}");

			match key.as_str() {
				"target" => {
					nq.target = Some(TargetClause::parse(&clause_path, value)?)
						.filter(|clause| !clause.is_empty());
				},
				"notebook" => {
					nq.notebook = Some(NotebookClause::parse(&clause_path, value)?)
						.filter(|clause| !clause.is_empty());
				},
				"cell" => nq.cell = CellClause::parse(&clause_path, value)?,
				_ => {
					return Err(Error::constraint(
						clause_path,
						"nq accepts only target, notebook, or cell.",
					));
				},
			}
		}

		Ok(nq)
	}

	/// Free-text shorthand.
	pub fn from_text(text: &str) -> Result<Self> {
		Self::parse(&json!({ "target": { "type": "all", "text": text } }))
	}

	/// Lineage-tag shorthand.
	pub fn from_meme(meme: &str) -> Result<Self> {
		Self::parse(&json!({ "cell": { "and": [{ "in_meme": meme }] } }))
	}

	/// Matches every notebook.
	pub fn empty() -> Self {
		Self { raw: Value::Object(Map::new()), ..Self::default() }
	}

	pub fn is_empty(&self) -> bool {
		self.target.is_none() && self.notebook.is_none() && self.cell.is_none()
	}

	/// The document as the client sent it.
	pub fn as_value(&self) -> &Value {
		&self.raw
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cell::{CellField, CellMatch, CellPredicate};

	#[test]
	fn shorthands_build_expected_documents() {
		let nq = Nq::from_text("QUERY").unwrap();

		assert_eq!(nq.as_value(), &json!({ "target": { "type": "all", "text": "QUERY" } }));
		assert_eq!(nq.target.and_then(|target| target.text), Some("QUERY".to_string()));

		let nq = Nq::from_meme("MEME").unwrap();

		assert_eq!(
			nq.cell,
			Some(CellClause::And(vec![CellMatch {
				predicates: vec![CellPredicate {
					field: CellField::InMeme,
					negated: false,
					value: "MEME".to_string(),
				}],
			}]))
		);
	}

	#[test]
	fn unknown_predicate_fails_under_both_combinators() {
		for combinator in ["and", "or"] {
			let raw = json!({ "cell": { combinator: [{ "not_valid": "OUTPUT" }] } });
			let err = Nq::parse(&raw).expect_err("expected unknown predicate");

			assert_eq!(
				err,
				Error::UnknownPredicateKey {
					path: format!("$.cell.{combinator}[0].not_valid"),
					key: "not_valid".to_string(),
				}
			);
		}
	}

	#[test]
	fn rejects_unknown_clause_and_target_type() {
		assert!(Nq::parse(&json!({ "owner": {} })).is_err());
		assert!(Nq::parse(&json!({ "target": { "type": "cell", "text": "a" } })).is_err());
		assert!(Nq::parse(&json!([])).is_err());
	}

	#[test]
	fn empty_clauses_are_dropped() {
		let nq = Nq::parse(&json!({ "target": { "type": "all" }, "notebook": {}, "cell": {} }))
			.unwrap();

		assert!(nq.is_empty());
	}
}
