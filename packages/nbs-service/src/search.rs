use serde::Serialize;
use serde_json::Value;

use crate::{Error, NbSearchService, Result};
use nbs_domain::{
	Nq,
	page::{Page, SortSpec},
};
use nbs_index::QueryParams;
use nbs_storage::ext_json;

#[derive(Debug, Clone)]
pub struct SearchRequest {
	pub nq: Nq,
	pub start: Option<String>,
	pub limit: Option<String>,
	pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub notebooks: Vec<Value>,
	pub limit: u64,
	pub size: usize,
	pub start: u64,
	pub nq: Value,
	pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTarget {
	Notebook,
	Cell,
}
impl IndexTarget {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"notebook" => Some(Self::Notebook),
			"cell" => Some(Self::Cell),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct IndexSearchRequest {
	pub target: String,
	pub query: Option<String>,
	pub start: Option<String>,
	pub limit: Option<String>,
	pub sort: Option<String>,
}

/// Exactly one of `notebooks` or `cells` is present, matching the request target.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSearchResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notebooks: Option<Vec<Value>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cells: Option<Vec<Value>>,
	pub error: Option<String>,
	pub limit: u64,
	#[serde(rename = "numFound")]
	pub num_found: u64,
	pub size: usize,
	pub solrquery: String,
	pub sort: Option<String>,
	pub start: u64,
}

impl NbSearchService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let page = self.page(req.start.as_deref(), req.limit.as_deref())?;
		let sort = req.sort.as_deref().map(SortSpec::parse).transpose()?;
		let docs = self.run_query(&req.nq, sort.as_ref(), Some(page)).await?;
		let notebooks = docs.iter().map(ext_json::to_transport).collect::<Vec<_>>();

		Ok(SearchResponse {
			size: notebooks.len(),
			notebooks,
			limit: page.limit,
			start: page.start,
			nq: req.nq.as_value().clone(),
			error: None,
		})
	}

	/// Passes a raw query string to the full-text index core for `target`.
	pub async fn index_search(&self, req: IndexSearchRequest) -> Result<IndexSearchResponse> {
		let target = IndexTarget::parse(&req.target).ok_or_else(|| Error::NotFound {
			message: format!("Unknown search target {:?}.", req.target),
		})?;
		let query = req
			.query
			.filter(|query| !query.trim().is_empty())
			.ok_or_else(|| Error::InvalidRequest { message: "query is required.".to_string() })?;
		let page = self.page(req.start.as_deref(), req.limit.as_deref())?;
		let sort =
			req.sort.as_deref().map(SortSpec::parse).transpose()?.map(|sort| sort.to_index());
		let core = match target {
			IndexTarget::Notebook => &self.cfg.index.notebook_core,
			IndexTarget::Cell => &self.cfg.index.cell_core,
		};
		let params = QueryParams { start: page.start, rows: page.limit, sort: sort.clone() };
		let response = self.index.query(&self.cfg.index, core, &query, &params).await?;
		let size = response.docs.len();
		let (notebooks, cells) = match target {
			IndexTarget::Notebook => (Some(response.docs), None),
			IndexTarget::Cell => (None, Some(response.docs)),
		};

		Ok(IndexSearchResponse {
			notebooks,
			cells,
			error: None,
			limit: page.limit,
			num_found: response.num_found,
			size,
			solrquery: query,
			sort,
			start: response.start,
		})
	}

	fn page(&self, start: Option<&str>, limit: Option<&str>) -> Result<Page> {
		Ok(Page::parse(start, limit, self.cfg.search.default_limit, self.cfg.search.max_limit)?)
	}
}
