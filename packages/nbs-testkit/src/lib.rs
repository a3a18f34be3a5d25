pub mod memory;

mod error;
mod eval;

pub use error::{Error, Result};
pub use memory::MemoryCollection;

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Mutex,
};

use serde_json::{Value, json};
use tempfile::TempDir;

use nbs_config::{Config, Index, Mongo, Search, Service, Storage};
use nbs_index::{BoxFuture, IndexResponse, QueryParams, SearchIndex};

/// A throwaway import root and blob directory, removed on drop.
pub struct TestRoot {
	_dir: TempDir,
	base_dir: PathBuf,
	blob_dir: PathBuf,
}
impl TestRoot {
	pub fn new() -> Result<Self> {
		let dir = tempfile::tempdir()?;
		let base_dir = dir.path().join("notebooks");
		let blob_dir = dir.path().join("blobs");

		fs::create_dir_all(&base_dir)?;
		fs::create_dir_all(&blob_dir)?;

		Ok(Self { _dir: dir, base_dir, blob_dir })
	}

	pub fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	pub fn blob_dir(&self) -> &Path {
		&self.blob_dir
	}

	pub fn config(&self) -> Config {
		test_config(&self.base_dir, &self.blob_dir)
	}
}

pub fn test_config(base_dir: &Path, blob_dir: &Path) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			base_dir: base_dir.to_path_buf(),
			staging_dir: "nbsearch-tmp".to_string(),
			blob_dir: blob_dir.to_path_buf(),
			mongo: Mongo {
				uri: "mongodb://127.0.0.1:27017".to_string(),
				database: "nbsearch-test".to_string(),
				notebook_collection: "notebooks".to_string(),
				history_collection: "history".to_string(),
			},
		},
		search: Search { default_limit: 50, max_limit: 1_000, lineage_prefix_len: 36 },
		index: Index {
			url: "http://127.0.0.1:8983/solr".to_string(),
			notebook_core: "jupyter-notebook".to_string(),
			cell_core: "jupyter-cell".to_string(),
			timeout_ms: 1_000,
		},
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCall {
	pub core: String,
	pub q: String,
	pub params: QueryParams,
}

/// Serves canned index documents and remembers every query it was asked.
///
/// `id:"<id>"` queries return the documents with that `id`; any other query returns every
/// document of the core.
pub struct RecordingIndex {
	notebooks: Vec<Value>,
	cells: Vec<Value>,
	calls: Mutex<Vec<IndexCall>>,
}
impl RecordingIndex {
	pub fn new(notebooks: Vec<Value>, cells: Vec<Value>) -> Self {
		Self { notebooks, cells, calls: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> Vec<IndexCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn respond(&self, cfg: &Index, core: &str, q: &str, params: &QueryParams) -> IndexResponse {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(IndexCall {
			core: core.to_string(),
			q: q.to_string(),
			params: params.clone(),
		});

		let docs = if core == cfg.notebook_core { &self.notebooks } else { &self.cells };
		let matched = match id_term(q) {
			Some(id) => docs
				.iter()
				.filter(|doc| doc.get("id").and_then(Value::as_str) == Some(id.as_str()))
				.cloned()
				.collect::<Vec<_>>(),
			None => docs.clone(),
		};
		let num_found = matched.len() as u64;
		let docs = matched
			.into_iter()
			.skip(params.start as usize)
			.take(params.rows as usize)
			.collect();

		IndexResponse { docs, num_found, start: params.start }
	}
}
impl SearchIndex for RecordingIndex {
	fn query<'a>(
		&'a self,
		cfg: &'a Index,
		core: &'a str,
		q: &'a str,
		params: &'a QueryParams,
	) -> BoxFuture<'a, nbs_index::Result<IndexResponse>> {
		let response = self.respond(cfg, core, q, params);

		Box::pin(async move { Ok(response) })
	}
}

fn id_term(q: &str) -> Option<String> {
	let quoted = q.strip_prefix("id:\"")?.strip_suffix('"')?;

	Some(quoted.replace("\\\"", "\"").replace("\\\\", "\\"))
}

pub fn code_cell(source: &str, meme: Option<&str>) -> Value {
	let mut cell = json!({
		"cell_type": "code",
		"source": source,
		"outputs": [],
		"metadata": {}
	});

	if let Some(meme) = meme {
		cell["metadata"] = json!({ "lc_cell_meme": { "current": meme } });
	}

	cell
}

pub fn markdown_cell(source: &str) -> Value {
	json!({ "cell_type": "markdown", "source": source, "metadata": {} })
}

/// A stored notebook document as the notebook collection holds it.
pub fn notebook_document(oid: &str, path: &str, cells: Vec<Value>) -> Value {
	json!({
		"_id": { "$oid": oid },
		"path": path,
		"server": "http://jupyter.example.org/",
		"mtime": { "$date": "2024-03-01T09:00:00Z" },
		"cells": cells
	})
}

/// An index document pointing at the blob stored under `id`.
pub fn index_document(id: &str, filename: &str) -> Value {
	json!({
		"id": id,
		"filename": [filename],
		"path": format!("/home/user/{filename}"),
		"owner": "user",
		"signature_server_url": "http://jupyter.example.org/",
		"mtime": "2024-03-01T09:00:00Z"
	})
}

/// The `.ipynb` bytes of a notebook with `cells`.
pub fn notebook_bytes(cells: Vec<Value>) -> Result<Vec<u8>> {
	let notebook = json!({
		"cells": cells,
		"metadata": {},
		"nbformat": 4,
		"nbformat_minor": 5
	});

	serde_json::to_vec(&notebook).map_err(|err| Error::Message(format!("{err}")))
}
