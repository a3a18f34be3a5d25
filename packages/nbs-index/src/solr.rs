// std
use std::time::Duration as StdDuration;

// crates.io
use reqwest::Client;
use serde_json::Value;

use crate::{Error, IndexResponse, QueryParams, Result};

pub async fn query(
	cfg: &nbs_config::Index,
	core: &str,
	q: &str,
	params: &QueryParams,
) -> Result<IndexResponse> {
	let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
	let res = client.get(select_url(cfg, core)).query(&select_params(q, params)).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_select_response(json)
}

pub fn select_url(cfg: &nbs_config::Index, core: &str) -> String {
	format!("{}/{}/select", cfg.url.trim_end_matches('/'), core)
}

pub fn select_params(q: &str, params: &QueryParams) -> Vec<(&'static str, String)> {
	let mut out = vec![
		("q", q.to_string()),
		("start", params.start.to_string()),
		("rows", params.rows.to_string()),
		("wt", "json".to_string()),
	];

	if let Some(sort) = &params.sort {
		out.push(("sort", sort.clone()));
	}

	out
}

pub fn parse_select_response(json: Value) -> Result<IndexResponse> {
	let response = json.get("response").ok_or_else(|| Error::InvalidResponse {
		message: "Index response is missing the response object.".to_string(),
	})?;
	let docs = response.get("docs").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Index response is missing docs array.".to_string() }
	})?;
	let num_found = response.get("numFound").and_then(Value::as_u64).ok_or_else(|| {
		Error::InvalidResponse { message: "Index response is missing numFound.".to_string() }
	})?;
	let start = response.get("start").and_then(Value::as_u64).unwrap_or(0);

	Ok(IndexResponse { docs: docs.clone(), num_found, start })
}
