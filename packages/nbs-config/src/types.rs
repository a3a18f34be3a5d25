use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub search: Search,
	pub index: Index,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	/// Root directory imports are written under.
	pub base_dir: PathBuf,
	/// Reserved subdirectory of `base_dir` whose imports are made read-only.
	#[serde(default = "default_staging_dir")]
	pub staging_dir: String,
	pub blob_dir: PathBuf,
	pub mongo: Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mongo {
	pub uri: String,
	pub database: String,
	#[serde(default = "default_notebook_collection")]
	pub notebook_collection: String,
	#[serde(default = "default_history_collection")]
	pub history_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u64,
	pub max_limit: u64,
	/// Characters of the current lineage tag that identify a cell across edits.
	pub lineage_prefix_len: usize,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 50, max_limit: 1_000, lineage_prefix_len: 36 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Index {
	pub url: String,
	#[serde(default = "default_notebook_core")]
	pub notebook_core: String,
	#[serde(default = "default_cell_core")]
	pub cell_core: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_staging_dir() -> String {
	"nbsearch-tmp".to_string()
}

fn default_notebook_collection() -> String {
	"notebooks".to_string()
}

fn default_history_collection() -> String {
	"history".to_string()
}

fn default_notebook_core() -> String {
	"jupyter-notebook".to_string()
}

fn default_cell_core() -> String {
	"jupyter-cell".to_string()
}

fn default_timeout_ms() -> u64 {
	10_000
}
