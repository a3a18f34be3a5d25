use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, NbSearchService, Result};
use nbs_domain::Nq;
use nbs_storage::{FindOptions, ext_json, models::HistoryEntry};

#[derive(Debug, Clone)]
pub struct SaveHistoryRequest {
	pub name: String,
	pub nq: Nq,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveHistoryResponse {
	pub id: String,
	pub notebook_ids: Vec<String>,
	pub nq: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
	pub id: String,
	pub name: String,
	pub created: String,
	pub elapsed: f64,
	/// Number of notebooks the entry recorded.
	pub notebooks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListHistoryResponse {
	pub histories: Vec<HistorySummary>,
}

impl NbSearchService {
	/// Newest first.
	pub async fn list_history(&self) -> Result<ListHistoryResponse> {
		let options = FindOptions { sort: Some(json!({ "created": -1 })), ..FindOptions::default() };
		let docs = self.history.find(&json!({}), &options).await?;
		let mut histories = Vec::with_capacity(docs.len());

		for doc in docs {
			let entry = HistoryEntry::from_document(doc)?;

			histories.push(HistorySummary {
				created: format_created(entry.created)?,
				notebooks: entry.notebook_ids.len(),
				id: entry.id,
				name: entry.name,
				elapsed: entry.elapsed,
			});
		}

		Ok(ListHistoryResponse { histories })
	}

	/// Re-runs `nq` without pagination and records the matching ids as one new entry.
	pub async fn save_history(&self, req: SaveHistoryRequest) -> Result<SaveHistoryResponse> {
		let name = req.name.trim();

		if name.is_empty() {
			return Err(Error::InvalidRequest { message: "name must be non-empty.".to_string() });
		}

		let started = Instant::now();
		let docs = self.run_query(&req.nq, None, None).await?;
		let notebook_ids = docs
			.iter()
			.filter_map(|doc| doc.get("_id").and_then(ext_json::id_string))
			.collect::<Vec<_>>();
		let elapsed = started.elapsed().as_secs_f64();
		let entry = HistoryEntry {
			id: ext_json::new_object_id(),
			name: name.to_string(),
			created: OffsetDateTime::now_utc(),
			elapsed,
			nq: req.nq.as_value().clone(),
			notebook_ids,
		};
		let id = self.history.insert_one(entry.to_document()?).await?;

		tracing::info!(
			history_id = %id,
			name = %entry.name,
			count = entry.notebook_ids.len(),
			elapsed,
			"Saved history entry."
		);

		Ok(SaveHistoryResponse { id, notebook_ids: entry.notebook_ids, nq: entry.nq })
	}
}

fn format_created(created: OffsetDateTime) -> Result<String> {
	created.format(&Rfc3339).map_err(|err| Error::Storage { message: err.to_string() })
}
