//! Index-resolved notebook documents and their original bytes.

use serde::Serialize;
use serde_json::Value;

use crate::{Error, NbSearchService, Result};
use nbs_domain::import_path;
use nbs_index::{QueryParams, phrase_term};

#[derive(Debug, Clone)]
pub struct DownloadResponse {
	pub filename: String,
	pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataMetadata {
	pub id: String,
	pub filename: String,
	pub original_path: Option<String>,
	pub owner: Option<String>,
	pub server: Option<String>,
	pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
	pub notebook: Value,
	pub metadata: DataMetadata,
}

impl NbSearchService {
	/// Looks `id` up through the notebook index core. A raw primary-key lookup is never used.
	pub async fn resolve_document(&self, id: &str) -> Result<Value> {
		let q = phrase_term("id", id);
		let params = QueryParams { start: 0, rows: 1, sort: None };
		let response =
			self.index.query(&self.cfg.index, &self.cfg.index.notebook_core, &q, &params).await?;

		response
			.docs
			.into_iter()
			.next()
			.ok_or_else(|| Error::DocumentNotFound { id: id.to_string() })
	}

	pub async fn download(&self, id: &str) -> Result<DownloadResponse> {
		let doc = self.resolve_document(id).await?;
		let filename = stored_filename(&doc, id)?;
		let bytes = self.read_blob(id).await?;

		Ok(DownloadResponse { filename, bytes })
	}

	/// The notebook JSON plus the index metadata describing where it came from.
	pub async fn data(&self, id: &str) -> Result<DataResponse> {
		let doc = self.resolve_document(id).await?;
		let filename = stored_filename(&doc, id)?;
		let bytes = self.read_blob(id).await?;
		let notebook = serde_json::from_slice(&bytes).map_err(|err| Error::InvalidRequest {
			message: format!("Notebook {id} is not valid JSON: {err}"),
		})?;
		let metadata = DataMetadata {
			id: id.to_string(),
			filename,
			original_path: field_str(&doc, "path"),
			owner: field_str(&doc, "owner"),
			server: field_str(&doc, "signature_server_url"),
			modified: field_str(&doc, "mtime"),
		};

		Ok(DataResponse { notebook, metadata })
	}

	async fn read_blob(&self, id: &str) -> Result<Vec<u8>> {
		let mut bytes = Vec::new();

		self.blobs.download(id, &mut bytes).await?;

		Ok(bytes)
	}
}

/// Basename of the document's stored filename, falling back to its path.
pub(crate) fn stored_filename(doc: &Value, id: &str) -> Result<String> {
	let stored = field_str(doc, "filename")
		.or_else(|| field_str(doc, "path"))
		.ok_or_else(|| Error::InvalidRequest {
			message: format!("Document {id} has no filename."),
		})?;

	import_path::safe_basename(&stored).map(str::to_string).ok_or_else(|| Error::InvalidRequest {
		message: format!("Document {id} has an unusable filename {stored:?}."),
	})
}

/// A string field, or the first string of a multi-valued field.
fn field_str(doc: &Value, field: &str) -> Option<String> {
	match doc.get(field)? {
		Value::String(value) => Some(value.clone()),
		Value::Array(values) => values.iter().find_map(Value::as_str).map(str::to_string),
		_ => None,
	}
}
