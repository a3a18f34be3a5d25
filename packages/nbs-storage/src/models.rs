use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::Result;

/// A saved snapshot of the notebook ids a query matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
	#[serde(rename = "_id", with = "crate::ext_json::object_id")]
	pub id: String,
	pub name: String,
	#[serde(with = "crate::ext_json::date")]
	pub created: OffsetDateTime,
	/// Seconds spent running the query.
	pub elapsed: f64,
	pub nq: Value,
	#[serde(default)]
	pub notebook_ids: Vec<String>,
}
impl HistoryEntry {
	pub fn to_document(&self) -> Result<Value> {
		Ok(serde_json::to_value(self)?)
	}

	pub fn from_document(doc: Value) -> Result<Self> {
		Ok(serde_json::from_value(doc)?)
	}
}
