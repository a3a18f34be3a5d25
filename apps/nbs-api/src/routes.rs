use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::{StatusCode, header},
	response::{IntoResponse, Response},
	routing::get,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use nbs_service::{
	DataResponse, Error as ServiceError, ImportRequest, ImportResponse, IndexSearchRequest,
	IndexSearchResponse, ListHistoryResponse, SaveHistoryRequest, SaveHistoryResponse,
	SearchRequest, SearchResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct NqParams {
	pub nq: Option<String>,
	pub meme: Option<String>,
	pub q: Option<String>,
}
impl NqParams {
	fn to_nq(&self) -> Result<nbs_domain::Nq, ApiError> {
		Ok(nbs_service::nq_from_params(
			self.nq.as_deref(),
			self.meme.as_deref(),
			self.q.as_deref(),
		)?)
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
	#[serde(flatten)]
	pub nq: NqParams,
	pub start: Option<String>,
	pub limit: Option<String>,
	pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexSearchParams {
	pub query: Option<String>,
	pub start: Option<String>,
	pub limit: Option<String>,
	pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveHistoryBody {
	#[serde(default)]
	pub name: String,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", get(search))
		.route("/v1/{target}/search", get(index_search))
		.route("/v1/history", get(list_history).put(save_history))
		.route("/v1/import/{*rest}", get(import))
		.route("/v1/download/{id}", get(download))
		.route("/v1/data/{id}", get(data))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
	let request = SearchRequest {
		nq: params.nq.to_nq()?,
		start: params.start,
		limit: params.limit,
		sort: params.sort,
	};
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

async fn index_search(
	State(state): State<AppState>,
	Path(target): Path<String>,
	Query(params): Query<IndexSearchParams>,
) -> Result<Json<IndexSearchResponse>, ApiError> {
	let request = IndexSearchRequest {
		target,
		query: params.query,
		start: params.start,
		limit: params.limit,
		sort: params.sort,
	};
	let response = state.service.index_search(request).await?;

	Ok(Json(response))
}

async fn list_history(
	State(state): State<AppState>,
) -> Result<Json<ListHistoryResponse>, ApiError> {
	let response = state.service.list_history().await?;

	Ok(Json(response))
}

async fn save_history(
	State(state): State<AppState>,
	Query(params): Query<NqParams>,
	Json(body): Json<SaveHistoryBody>,
) -> Result<Json<SaveHistoryResponse>, ApiError> {
	let request = SaveHistoryRequest { name: body.name, nq: params.to_nq()? };
	let response = state.service.save_history(request).await?;

	Ok(Json(response))
}

/// `rest` is `[<destination>/]<id>`. A bare id imports into the import root; an empty
/// destination segment (`//<id>`) is a missing destination.
async fn import(
	State(state): State<AppState>,
	Path(rest): Path<String>,
) -> Result<Json<ImportResponse>, ApiError> {
	let (path, id) = match rest.rsplit_once('/') {
		Some(("", id)) => (None, id),
		Some((destination, id)) => (Some(format!("/{destination}")), id),
		None => (Some("/".to_string()), rest.as_str()),
	};
	let request = ImportRequest { path, id: id.to_string() };
	let response = state.service.import(request).await?;

	Ok(Json(response))
}

async fn download(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Response, ApiError> {
	let response = state.service.download(&id).await?;
	let disposition = format!("attachment; filename=\"{}\"", response.filename.replace('"', "\\\""));
	let headers = [
		(header::CONTENT_TYPE, "application/octet-stream".to_string()),
		(header::CONTENT_DISPOSITION, disposition),
	];

	Ok((headers, response.bytes).into_response())
}

async fn data(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<DataResponse>, ApiError> {
	let response = state.service.data(&id).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match &err {
			ServiceError::Query(query) => {
				let fields = query.path().map(|path| vec![path.to_string()]);
				let (status, code) = query_status(query);

				Self::new(status, code, message, fields)
			},
			ServiceError::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			ServiceError::HistoryNotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "HISTORY_NOT_FOUND", message, None),
			ServiceError::DocumentNotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "DOCUMENT_NOT_FOUND", message, None),
			ServiceError::NotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			ServiceError::Storage { .. } | ServiceError::Io(_) => {
				tracing::error!(error = %err, "Storage failure.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message, None)
			},
			ServiceError::Index { .. } => {
				tracing::error!(error = %err, "Index failure.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INDEX_ERROR", message, None)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

fn query_status(err: &nbs_domain::Error) -> (StatusCode, &'static str) {
	use nbs_domain::Error;

	match err {
		Error::InvalidConstraint { .. } => (StatusCode::BAD_REQUEST, "INVALID_CONSTRAINT"),
		Error::InvalidDate { .. } => (StatusCode::BAD_REQUEST, "INVALID_DATE"),
		Error::UnknownPredicateKey { .. } => (StatusCode::BAD_REQUEST, "UNKNOWN_PREDICATE_KEY"),
		Error::InvalidPage { .. } => (StatusCode::BAD_REQUEST, "INVALID_PAGE"),
		Error::InvalidSort { .. } => (StatusCode::BAD_REQUEST, "INVALID_SORT"),
		Error::PathTraversalRejected { .. } => (StatusCode::BAD_REQUEST, "PATH_TRAVERSAL_REJECTED"),
		Error::DestinationMissing => (StatusCode::NOT_FOUND, "DESTINATION_MISSING"),
	}
}
