//! Target clause compilation: full text, history membership and lineage relatedness.
//!
//! The history lookups are asynchronous and happen in the service layer. This module builds the
//! expressions once the lookups are done, and the secondary aggregation used to find shared
//! lineage prefixes.

use serde_json::{Map, Value, json};

use crate::{CELLS_FIELD, MEME_CURRENT_FIELD, pipeline::Stage, value::prefix_pattern};

const OBJECT_ID_LEN: usize = 24;
/// Field the relatedness aggregation projects each truncated tag into.
const PREFIX_FIELD: &str = "meme";

/// Target clause after its history lookups have completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTarget {
	pub text: Option<String>,
	/// Notebook ids recorded in the `history_in` entry.
	pub history_ids: Option<Vec<String>>,
	/// Lineage prefixes shared by the `history_related` entry's notebooks.
	pub related_prefixes: Option<Vec<String>>,
}
impl ResolvedTarget {
	/// Each part writes a distinct top-level field, so the union of their keys is their
	/// conjunction.
	pub fn to_native(&self) -> Option<Value> {
		let mut expr = Map::new();
		let parts = [
			self.text.as_deref().map(text_search_expr),
			self.history_ids.as_deref().map(history_in_expr),
			self.related_prefixes.as_deref().map(related_expr),
		];

		for part in parts.into_iter().flatten() {
			if let Value::Object(fields) = part {
				expr.extend(fields);
			}
		}

		if expr.is_empty() { None } else { Some(Value::Object(expr)) }
	}
}

pub fn text_search_expr(text: &str) -> Value {
	json!({ "$text": { "$search": text } })
}

pub fn history_in_expr(ids: &[String]) -> Value {
	json!({ "_id": { "$in": ids.iter().map(|id| object_id(id)).collect::<Vec<_>>() } })
}

/// Any cell whose current lineage tag starts with one of `prefixes`.
///
/// An empty prefix set yields an expression that matches nothing.
pub fn related_expr(prefixes: &[String]) -> Value {
	if prefixes.is_empty() {
		return json!({ CELLS_FIELD: { "$elemMatch": { MEME_CURRENT_FIELD: { "$in": [] } } } });
	}

	let anchors = prefixes
		.iter()
		.map(|prefix| json!({ MEME_CURRENT_FIELD: { "$regex": prefix_pattern(prefix) } }))
		.collect::<Vec<_>>();

	json!({ CELLS_FIELD: { "$elemMatch": { "$or": anchors } } })
}

/// Aggregation over the notebook collection that returns `{_id: prefix, count}` rows for every
/// lineage prefix seen in more than one cell of the given notebooks, most frequent first.
pub fn related_pipeline(ids: &[String], prefix_len: usize) -> Vec<Stage> {
	let tag = format!("{CELLS_FIELD}.{MEME_CURRENT_FIELD}");
	let tag_ref = format!("${tag}");
	let prefix_ref = format!("${PREFIX_FIELD}");

	vec![
		Stage::Match(history_in_expr(ids)),
		Stage::Unwind(format!("${CELLS_FIELD}")),
		Stage::Match(json!({ tag: { "$exists": true } })),
		Stage::Project(json!({ PREFIX_FIELD: { "$substrCP": [tag_ref, 0, prefix_len] } })),
		Stage::Group(json!({ "_id": prefix_ref, "count": { "$sum": 1 } })),
		Stage::Match(json!({ "count": { "$gt": 1 } })),
		Stage::Sort(json!({ "count": -1 })),
	]
}

/// Prefixes from the rows produced by [`related_pipeline`], in row order.
pub fn related_prefixes(rows: &[Value]) -> Vec<String> {
	rows.iter()
		.filter_map(|row| row.get("_id").and_then(Value::as_str))
		.filter(|prefix| !prefix.is_empty())
		.map(str::to_string)
		.collect()
}

/// Extended JSON object id for 24-hex ids; any other id is kept as a plain string.
pub fn object_id(id: &str) -> Value {
	if id.len() == OBJECT_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit()) {
		json!({ "$oid": id })
	} else {
		Value::String(id.to_string())
	}
}
