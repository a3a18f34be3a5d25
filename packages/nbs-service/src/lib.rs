pub mod documents;
pub mod history;
pub mod import;
pub mod search;

mod error;
mod query;

use std::sync::Arc;

use serde_json::Value;

pub use documents::{DataMetadata, DataResponse, DownloadResponse};
pub use error::{Error, Result};
pub use history::{HistorySummary, ListHistoryResponse, SaveHistoryRequest, SaveHistoryResponse};
pub use import::{ImportRequest, ImportResponse};
pub use nbs_storage::BoxFuture;
pub use search::{
	IndexSearchRequest, IndexSearchResponse, IndexTarget, SearchRequest, SearchResponse,
};

use nbs_config::Config;
use nbs_domain::Nq;
use nbs_index::{SearchIndex, SolrIndex};
use nbs_storage::{BlobStore, DocumentCollection, blob::FsBlobStore, mongo::MongoCollection};

#[derive(Clone)]
pub struct Collaborators {
	pub notebooks: Arc<dyn DocumentCollection>,
	pub history: Arc<dyn DocumentCollection>,
	pub blobs: Arc<dyn BlobStore>,
	pub index: Arc<dyn SearchIndex>,
}

pub struct NbSearchService {
	pub cfg: Config,
	pub notebooks: Arc<dyn DocumentCollection>,
	pub history: Arc<dyn DocumentCollection>,
	pub blobs: Arc<dyn BlobStore>,
	pub index: Arc<dyn SearchIndex>,
}

impl Collaborators {
	/// MongoDB collections and filesystem blobs from the storage settings, with the HTTP index
	/// client.
	pub async fn from_config(cfg: &Config) -> Result<Self> {
		let (notebooks, history) = MongoCollection::connect_pair(&cfg.storage.mongo).await?;

		Ok(Self {
			notebooks: Arc::new(notebooks),
			history: Arc::new(history),
			blobs: Arc::new(FsBlobStore::new(&cfg.storage.blob_dir)),
			index: Arc::new(SolrIndex),
		})
	}
}

impl NbSearchService {
	pub async fn new(cfg: Config) -> Result<Self> {
		let collaborators = Collaborators::from_config(&cfg).await?;

		Ok(Self::with_collaborators(cfg, collaborators))
	}

	pub fn with_collaborators(cfg: Config, collaborators: Collaborators) -> Self {
		let Collaborators { notebooks, history, blobs, index } = collaborators;

		Self { cfg, notebooks, history, blobs, index }
	}
}

/// Builds the NQ for a request from `nq` (JSON), else `meme`, else `q`. None of them is the empty
/// query.
pub fn nq_from_params(nq: Option<&str>, meme: Option<&str>, q: Option<&str>) -> Result<Nq> {
	if let Some(raw) = nq {
		let value: Value = serde_json::from_str(raw).map_err(|err| Error::InvalidRequest {
			message: format!("nq must be a JSON object: {err}"),
		})?;

		return Ok(Nq::parse(&value)?);
	}
	if let Some(meme) = meme {
		return Ok(Nq::from_meme(meme)?);
	}
	if let Some(q) = q {
		return Ok(Nq::from_text(q)?);
	}

	Ok(Nq::empty())
}
