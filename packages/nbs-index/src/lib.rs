pub mod solr;

mod error;

use std::{future::Future, pin::Pin};

use serde_json::Value;

pub use error::{Error, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Paging and ordering for one `select` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
	pub start: u64,
	pub rows: u64,
	/// `"<field> asc"` or `"<field> desc"`.
	pub sort: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexResponse {
	pub docs: Vec<Value>,
	pub num_found: u64,
	pub start: u64,
}

/// Full-text index lookups against one core.
pub trait SearchIndex
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		cfg: &'a nbs_config::Index,
		core: &'a str,
		q: &'a str,
		params: &'a QueryParams,
	) -> BoxFuture<'a, Result<IndexResponse>>;
}

/// The HTTP `select` client.
pub struct SolrIndex;

impl SearchIndex for SolrIndex {
	fn query<'a>(
		&'a self,
		cfg: &'a nbs_config::Index,
		core: &'a str,
		q: &'a str,
		params: &'a QueryParams,
	) -> BoxFuture<'a, Result<IndexResponse>> {
		Box::pin(solr::query(cfg, core, q, params))
	}
}

/// Quotes `value` as a single phrase term, e.g. `id:"<value>"`.
pub fn phrase_term(field: &str, value: &str) -> String {
	let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");

	format!("{field}:\"{escaped}\"")
}
