//! Extended JSON conventions for stored documents: ids as `{"$oid": ...}` and timestamps as
//! `{"$date": "<RFC3339>"}`.

use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

const OBJECT_ID_LEN: usize = 24;

/// Fresh 24-hex document id.
pub fn new_object_id() -> String {
	let mut id = Uuid::new_v4().simple().to_string();

	id.truncate(OBJECT_ID_LEN);

	id
}

/// Plain string form of a stored id, from either a string or an `$oid` wrapper.
pub fn id_string(value: &Value) -> Option<String> {
	match value {
		Value::String(id) => Some(id.clone()),
		Value::Object(obj) if obj.len() == 1 =>
			obj.get("$oid").and_then(Value::as_str).map(str::to_string),
		_ => None,
	}
}

/// Instant carried by a `$date` wrapper, as an RFC3339 string or epoch milliseconds.
pub fn date_of(value: &Value) -> Option<OffsetDateTime> {
	let obj = value.as_object().filter(|obj| obj.len() == 1)?;

	match obj.get("$date")? {
		Value::String(raw) => OffsetDateTime::parse(raw, &Rfc3339).ok(),
		Value::Number(millis) => millis.as_i64().and_then(|millis| {
			OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
		}),
		_ => None,
	}
}

/// Transport projection of a stored document: `_id` becomes a string `id` and every `$date`
/// wrapper becomes its RFC3339 string. The stored value is left untouched.
pub fn to_transport(doc: &Value) -> Value {
	let Some(obj) = doc.as_object() else {
		return normalize(doc);
	};

	obj.iter()
		.map(|(key, value)| match key.as_str() {
			"_id" => {
				let id = id_string(value).map(Value::String).unwrap_or_else(|| normalize(value));

				("id".to_string(), id)
			},
			_ => (key.clone(), normalize(value)),
		})
		.collect::<serde_json::Map<_, _>>()
		.into()
}

fn normalize(value: &Value) -> Value {
	if let Some(at) = date_of(value)
		&& let Ok(rendered) = at.format(&Rfc3339)
	{
		return Value::String(rendered);
	}
	if let Some(id) = value.as_object().filter(|obj| obj.len() == 1).and_then(|obj| obj.get("$oid")) {
		return id.clone();
	}

	match value {
		Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
		Value::Object(obj) =>
			Value::Object(obj.iter().map(|(key, value)| (key.clone(), normalize(value))).collect()),
		_ => value.clone(),
	}
}

/// Serde adapter for `OffsetDateTime` stored as a `$date` wrapper. Plain RFC3339 strings are
/// accepted on read.
pub mod date {
	use serde::{Deserialize, Deserializer, Serializer, ser::SerializeMap};
	use time::{OffsetDateTime, format_description::well_known::Rfc3339};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Wrapped {
			#[serde(rename = "$date")]
			date: String,
		},
		Plain(String),
	}

	pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
		let mut map = serializer.serialize_map(Some(1))?;

		map.serialize_entry("$date", &formatted)?;
		map.end()
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = match Raw::deserialize(deserializer)? {
			Raw::Wrapped { date } | Raw::Plain(date) => date,
		};

		OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
	}
}

/// Serde adapter for string ids stored as an `$oid` wrapper. Plain strings are accepted on read.
pub mod object_id {
	use serde::{Deserialize, Deserializer, Serializer, ser::SerializeMap};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Wrapped {
			#[serde(rename = "$oid")]
			oid: String,
		},
		Plain(String),
	}

	pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(1))?;

		map.serialize_entry("$oid", value)?;
		map.end()
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Raw::deserialize(deserializer)? {
			Raw::Wrapped { oid } | Raw::Plain(oid) => Ok(oid),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn transport_rewrites_ids_and_dates() {
		let stored = json!({
			"_id": { "$oid": "0123456789abcdef01234567" },
			"mtime": { "$date": "2020-01-02T03:04:05Z" },
			"cells": [{ "meta": { "at": { "$date": 0 } } }],
			"path": "a.ipynb"
		});

		assert_eq!(
			to_transport(&stored),
			json!({
				"id": "0123456789abcdef01234567",
				"mtime": "2020-01-02T03:04:05Z",
				"cells": [{ "meta": { "at": "1970-01-01T00:00:00Z" } }],
				"path": "a.ipynb"
			})
		);
		assert!(stored.get("_id").is_some());
	}

	#[test]
	fn object_ids_are_24_hex() {
		let id = new_object_id();

		assert_eq!(id.len(), 24);
		assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
	}
}
