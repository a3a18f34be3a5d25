//! In-process evaluation of MongoDB-style filters and aggregation stages over JSON documents.
//!
//! Supported filter operators: `$and`, `$or`, `$nor`, `$text`, and per field `$eq`, `$ne`,
//! `$in`, `$regex`, `$not`, `$gt`, `$gte`, `$lt`, `$lte`, `$exists`, `$elemMatch`. Supported
//! stages: `$match`, `$unwind`, `$project` (with `$substrCP`), `$group` (with `$sum`), `$sort`,
//! `$skip`, `$limit`. Dotted paths traverse arrays element-wise.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use nbs_storage::{Error, FindOptions, Result, ext_json};

/// Fields searched by `$text`.
const TEXT_FIELDS: [&str; 2] = ["cells.source", "cells.outputs.text"];

pub fn matches(doc: &Value, filter: &Value) -> Result<bool> {
	let obj = filter.as_object().ok_or_else(|| invalid("filter must be an object."))?;

	for (key, cond) in obj {
		let ok = match key.as_str() {
			"$and" => try_all(clauses(key, cond)?, |clause| matches(doc, clause))?,
			"$or" => try_any(clauses(key, cond)?, |clause| matches(doc, clause))?,
			"$nor" => !try_any(clauses(key, cond)?, |clause| matches(doc, clause))?,
			"$text" => text_matches(doc, cond)?,
			op if op.starts_with('$') => return Err(invalid(format!("unsupported operator {op}."))),
			path => field_matches(&resolve(doc, path), cond)?,
		};

		if !ok {
			return Ok(false);
		}
	}

	Ok(true)
}

pub fn find(docs: Vec<Value>, filter: &Value, options: &FindOptions) -> Result<Vec<Value>> {
	let mut docs = filter_docs(docs, filter)?;

	if let Some(spec) = &options.sort {
		sort(&mut docs, spec)?;
	}

	let skip = options.skip.map(to_usize).unwrap_or(0);
	let limit = options.limit.map(to_usize).unwrap_or(usize::MAX);

	Ok(docs.into_iter().skip(skip).take(limit).collect())
}

pub fn aggregate(docs: Vec<Value>, stages: &[Value]) -> Result<Vec<Value>> {
	let mut docs = docs;

	for stage in stages {
		let (op, spec) = stage
			.as_object()
			.filter(|obj| obj.len() == 1)
			.and_then(|obj| obj.iter().next())
			.ok_or_else(|| invalid("each stage must have exactly one operator."))?;

		docs = match op.as_str() {
			"$match" => filter_docs(docs, spec)?,
			"$unwind" => unwind(docs, spec)?,
			"$project" => docs.iter().map(|doc| project(doc, spec)).collect::<Result<_>>()?,
			"$group" => group(&docs, spec)?,
			"$sort" => {
				sort(&mut docs, spec)?;

				docs
			},
			"$skip" => docs.into_iter().skip(count(op, spec)?).collect(),
			"$limit" => docs.into_iter().take(count(op, spec)?).collect(),
			_ => return Err(invalid(format!("unsupported stage {op}."))),
		};
	}

	Ok(docs)
}

/// Values reached by a dotted path. Arrays met along the way are traversed element-wise.
pub fn resolve<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
	let mut current = vec![doc];

	for segment in path.split('.') {
		let mut next = Vec::new();

		for value in current {
			match value {
				Value::Object(obj) => next.extend(obj.get(segment)),
				Value::Array(items) => next.extend(items.iter().filter_map(|item| item.get(segment))),
				_ => {},
			}
		}

		current = next;
	}

	current
}

fn filter_docs(docs: Vec<Value>, filter: &Value) -> Result<Vec<Value>> {
	let mut out = Vec::with_capacity(docs.len());

	for doc in docs {
		if matches(&doc, filter)? {
			out.push(doc);
		}
	}

	Ok(out)
}

fn field_matches(values: &[&Value], cond: &Value) -> Result<bool> {
	match cond.as_object() {
		Some(obj) if is_operator_doc(obj) => {
			for (op, arg) in obj {
				if !operator_matches(values, op, arg)? {
					return Ok(false);
				}
			}

			Ok(true)
		},
		_ => Ok(candidates(values).into_iter().any(|value| equals(value, cond))),
	}
}

fn operator_matches(values: &[&Value], op: &str, arg: &Value) -> Result<bool> {
	let candidates = candidates(values);

	match op {
		"$eq" => Ok(candidates.iter().any(|value| equals(value, arg))),
		"$ne" => Ok(!candidates.iter().any(|value| equals(value, arg))),
		"$in" => {
			let options = clauses(op, arg)?;

			Ok(candidates.iter().any(|value| options.iter().any(|option| equals(value, option))))
		},
		"$regex" => {
			let pattern = arg.as_str().ok_or_else(|| invalid("$regex requires a string."))?;
			let re = Regex::new(pattern).map_err(|err| invalid(format!("bad $regex: {err}")))?;

			Ok(candidates.iter().any(|value| value.as_str().is_some_and(|text| re.is_match(text))))
		},
		"$not" => Ok(!field_matches(values, arg)?),
		"$gt" | "$gte" | "$lt" | "$lte" => Ok(candidates.iter().any(|value| {
			compare(value, arg).is_some_and(|ord| match op {
				"$gt" => ord == Ordering::Greater,
				"$gte" => ord != Ordering::Less,
				"$lt" => ord == Ordering::Less,
				_ => ord != Ordering::Greater,
			})
		})),
		"$exists" => {
			let wanted = arg.as_bool().ok_or_else(|| invalid("$exists requires a boolean."))?;

			Ok(values.is_empty() != wanted)
		},
		"$elemMatch" => {
			for value in values {
				if let Some(items) = value.as_array()
					&& try_any(items, |item| matches(item, arg))?
				{
					return Ok(true);
				}
			}

			Ok(false)
		},
		_ => Err(invalid(format!("unsupported operator {op}."))),
	}
}

/// Case-insensitive match of any search term against the cell text fields.
fn text_matches(doc: &Value, cond: &Value) -> Result<bool> {
	let search = cond
		.get("$search")
		.and_then(Value::as_str)
		.ok_or_else(|| invalid("$text requires a $search string."))?;
	let terms = search.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>();

	if terms.is_empty() {
		return Ok(false);
	}

	Ok(TEXT_FIELDS.iter().any(|path| {
		candidates(&resolve(doc, path)).into_iter().filter_map(Value::as_str).any(|text| {
			let text = text.to_lowercase();

			terms.iter().any(|term| text.contains(term.as_str()))
		})
	}))
}

fn unwind(docs: Vec<Value>, spec: &Value) -> Result<Vec<Value>> {
	let path = spec
		.as_str()
		.or_else(|| spec.get("path").and_then(Value::as_str))
		.and_then(|path| path.strip_prefix('$'))
		.filter(|path| !path.contains('.'))
		.ok_or_else(|| invalid("$unwind requires a top-level \"$field\" path."))?;
	let mut out = Vec::new();

	for doc in docs {
		let Some(Value::Array(items)) = doc.get(path) else {
			continue;
		};

		for item in items {
			let mut copy = doc.clone();

			if let Some(obj) = copy.as_object_mut() {
				obj.insert(path.to_string(), item.clone());
			}

			out.push(copy);
		}
	}

	Ok(out)
}

fn project(doc: &Value, spec: &Value) -> Result<Value> {
	let spec = spec.as_object().ok_or_else(|| invalid("$project requires an object."))?;
	let mut out = Map::new();

	if !spec.get("_id").is_some_and(is_exclusion)
		&& let Some(id) = doc.get("_id")
	{
		out.insert("_id".to_string(), id.clone());
	}

	for (key, expr) in spec {
		if key == "_id" && (is_inclusion(expr) || is_exclusion(expr)) {
			continue;
		}
		if is_exclusion(expr) {
			continue;
		}
		if is_inclusion(expr) {
			if let Some(value) = resolve(doc, key).first() {
				out.insert(key.clone(), (*value).clone());
			}

			continue;
		}

		out.insert(key.clone(), eval_expr(doc, expr)?);
	}

	Ok(Value::Object(out))
}

fn group(docs: &[Value], spec: &Value) -> Result<Vec<Value>> {
	let spec = spec.as_object().ok_or_else(|| invalid("$group requires an object."))?;
	let key_expr = spec.get("_id").ok_or_else(|| invalid("$group requires an _id."))?;
	let mut groups: Vec<(Value, Vec<f64>)> = Vec::new();
	let accumulators = spec
		.iter()
		.filter(|(field, _)| field.as_str() != "_id")
		.map(|(field, acc)| {
			acc.get("$sum")
				.map(|expr| (field.as_str(), expr))
				.ok_or_else(|| invalid(format!("$group.{field} supports only $sum.")))
		})
		.collect::<Result<Vec<_>>>()?;

	for doc in docs {
		let key = eval_expr(doc, key_expr)?;
		let idx = match groups.iter().position(|(existing, _)| *existing == key) {
			Some(idx) => idx,
			None => {
				groups.push((key, vec![0.0; accumulators.len()]));

				groups.len() - 1
			},
		};

		for (slot, (_, expr)) in accumulators.iter().enumerate() {
			let amount = eval_expr(doc, expr)?.as_f64().unwrap_or(0.0);

			groups[idx].1[slot] += amount;
		}
	}

	Ok(groups
		.into_iter()
		.map(|(key, sums)| {
			let mut out = Map::new();

			out.insert("_id".to_string(), key);

			for ((field, _), sum) in accumulators.iter().zip(sums) {
				out.insert((*field).to_string(), number(sum));
			}

			Value::Object(out)
		})
		.collect())
}

fn sort(docs: &mut [Value], spec: &Value) -> Result<()> {
	let keys = spec
		.as_object()
		.ok_or_else(|| invalid("sort requires an object."))?
		.iter()
		.map(|(field, dir)| match dir.as_i64() {
			Some(1) => Ok((field.as_str(), false)),
			Some(-1) => Ok((field.as_str(), true)),
			_ => Err(invalid(format!("sort direction for {field} must be 1 or -1."))),
		})
		.collect::<Result<Vec<_>>>()?;

	docs.sort_by(|a, b| {
		for (field, descending) in &keys {
			let ord = sort_cmp(resolve(a, field).first().copied(), resolve(b, field).first().copied());
			let ord = if *descending { ord.reverse() } else { ord };

			if ord != Ordering::Equal {
				return ord;
			}
		}

		Ordering::Equal
	});

	Ok(())
}

fn eval_expr(doc: &Value, expr: &Value) -> Result<Value> {
	match expr {
		Value::String(raw) if raw.starts_with('$') =>
			Ok(resolve(doc, &raw[1..]).first().map(|value| (*value).clone()).unwrap_or(Value::Null)),
		Value::Object(obj) if obj.len() == 1 && obj.contains_key("$substrCP") => {
			let args = clauses("$substrCP", &obj["$substrCP"])?;
			let [text, start, len] = args else {
				return Err(invalid("$substrCP requires [string, start, length]."));
			};
			let text = eval_expr(doc, text)?;
			let start = start.as_u64().ok_or_else(|| invalid("$substrCP start must be >= 0."))?;
			let len = len.as_u64().ok_or_else(|| invalid("$substrCP length must be >= 0."))?;

			Ok(Value::String(
				text.as_str()
					.unwrap_or_default()
					.chars()
					.skip(to_usize(start))
					.take(to_usize(len))
					.collect(),
			))
		},
		_ => Ok(expr.clone()),
	}
}

/// A value plus, when it is an array, its elements.
fn candidates<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
	let mut out = Vec::with_capacity(values.len());

	for value in values {
		out.push(*value);

		if let Value::Array(items) = value {
			out.extend(items.iter());
		}
	}

	out
}

enum Scalar<'a> {
	Null,
	Bool(bool),
	Number(f64),
	Str(&'a str),
	Date(OffsetDateTime),
	Other(&'a Value),
}
impl Scalar<'_> {
	fn rank(&self) -> u8 {
		match self {
			Self::Null => 0,
			Self::Number(_) => 1,
			Self::Str(_) => 2,
			Self::Other(_) => 3,
			Self::Bool(_) => 4,
			Self::Date(_) => 5,
		}
	}
}

fn scalar(value: &Value) -> Scalar<'_> {
	if let Some(at) = ext_json::date_of(value) {
		return Scalar::Date(at);
	}

	match value {
		Value::Null => Scalar::Null,
		Value::Bool(flag) => Scalar::Bool(*flag),
		Value::Number(number) => number.as_f64().map(Scalar::Number).unwrap_or(Scalar::Other(value)),
		Value::String(text) => Scalar::Str(text),
		Value::Object(obj) if obj.len() == 1 => match obj.get("$oid").and_then(Value::as_str) {
			Some(id) => Scalar::Str(id),
			None => Scalar::Other(value),
		},
		_ => Scalar::Other(value),
	}
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
	match (scalar(a), scalar(b)) {
		(Scalar::Null, Scalar::Null) => Some(Ordering::Equal),
		(Scalar::Bool(x), Scalar::Bool(y)) => Some(x.cmp(&y)),
		(Scalar::Number(x), Scalar::Number(y)) => x.partial_cmp(&y),
		(Scalar::Str(x), Scalar::Str(y)) => Some(x.cmp(y)),
		(Scalar::Date(x), Scalar::Date(y)) => Some(x.cmp(&y)),
		_ => None,
	}
}

fn equals(a: &Value, b: &Value) -> bool {
	match (scalar(a), scalar(b)) {
		(Scalar::Other(x), Scalar::Other(y)) => x == y,
		_ => compare(a, b) == Some(Ordering::Equal),
	}
}

/// Total order for sorting: missing first, then by type, then by value.
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
	match (a, b) {
		(None, None) => Ordering::Equal,
		(None, Some(_)) => Ordering::Less,
		(Some(_), None) => Ordering::Greater,
		(Some(a), Some(b)) =>
			compare(a, b).unwrap_or_else(|| scalar(a).rank().cmp(&scalar(b).rank())),
	}
}

fn is_operator_doc(obj: &Map<String, Value>) -> bool {
	!obj.is_empty()
		&& obj.keys().all(|key| key.starts_with('$'))
		&& !(obj.len() == 1 && (obj.contains_key("$oid") || obj.contains_key("$date")))
}

fn is_inclusion(expr: &Value) -> bool {
	matches!(expr, Value::Bool(true)) || expr.as_i64() == Some(1)
}

fn is_exclusion(expr: &Value) -> bool {
	matches!(expr, Value::Bool(false)) || expr.as_i64() == Some(0)
}

fn clauses<'a>(op: &str, value: &'a Value) -> Result<&'a [Value]> {
	value.as_array().map(Vec::as_slice).ok_or_else(|| invalid(format!("{op} requires an array.")))
}

fn count(op: &str, spec: &Value) -> Result<usize> {
	spec.as_u64()
		.map(to_usize)
		.ok_or_else(|| invalid(format!("{op} requires a non-negative integer.")))
}

fn try_all(items: &[Value], mut pred: impl FnMut(&Value) -> Result<bool>) -> Result<bool> {
	for item in items {
		if !pred(item)? {
			return Ok(false);
		}
	}

	Ok(true)
}

fn try_any(items: &[Value], mut pred: impl FnMut(&Value) -> Result<bool>) -> Result<bool> {
	for item in items {
		if pred(item)? {
			return Ok(true);
		}
	}

	Ok(false)
}

fn number(value: f64) -> Value {
	if value.fract() == 0.0 && value.abs() < 9.0e15 {
		Value::from(value as i64)
	} else {
		Value::from(value)
	}
}

fn to_usize(value: u64) -> usize {
	usize::try_from(value).unwrap_or(usize::MAX)
}

fn invalid(message: impl Into<String>) -> Error {
	Error::InvalidQuery(message.into())
}
