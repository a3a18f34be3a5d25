use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header},
	response::Response,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use nbs_api::{routes, state::AppState};
use nbs_service::{Collaborators, NbSearchService};
use nbs_storage::blob::FsBlobStore;
use nbs_testkit::{
	MemoryCollection, RecordingIndex, TestRoot, code_cell, index_document, notebook_bytes,
	notebook_document,
};

async fn test_app() -> (TestRoot, Router) {
	let root = TestRoot::new().expect("Failed to create test root.");
	let notebooks = MemoryCollection::with_documents(vec![
		notebook_document(
			"aaaaaaaaaaaaaaaaaaaaaaaa",
			"/work/a.ipynb",
			vec![code_cell("import pandas as pd", Some("11111111-aaaa-1"))],
		),
		notebook_document(
			"bbbbbbbbbbbbbbbbbbbbbbbb",
			"/work/b.ipynb",
			vec![code_cell("print('posix')", Some("22222222-bbbb-1"))],
		),
	]);
	let blobs = FsBlobStore::new(root.blob_dir());
	let bytes = notebook_bytes(vec![code_cell("import pandas as pd", None)])
		.expect("Failed to build notebook bytes.");

	blobs.put("nb-1", &bytes).await.expect("Failed to store blob.");

	let collaborators = Collaborators {
		notebooks: Arc::new(notebooks),
		history: Arc::new(MemoryCollection::new()),
		blobs: Arc::new(blobs),
		index: Arc::new(RecordingIndex::new(
			vec![index_document("nb-1", "notebook1.ipynb")],
			Vec::new(),
		)),
	};
	let service = NbSearchService::with_collaborators(root.config(), collaborators);

	(root, routes::router(AppState::from_service(service)))
}

fn encode(raw: &str) -> String {
	raw.bytes()
		.map(|byte| match byte {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' =>
				(byte as char).to_string(),
			_ => format!("%{byte:02X}"),
		})
		.collect()
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
	let mut builder = Request::builder().method(method).uri(uri);
	let body = match body {
		Some(body) => {
			builder = builder.header("content-type", "application/json");

			Body::from(body.to_string())
		},
		None => Body::empty(),
	};

	app.clone()
		.oneshot(builder.body(body).expect("Failed to build request."))
		.await
		.expect("Failed to call router.")
}

async fn json_body(response: Response) -> Value {
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&body).expect("Failed to parse response.")
}

#[tokio::test]
async fn health_ok() {
	let (_root, app) = test_app().await;
	let response = call(&app, "GET", "/health", None).await;

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn search_accepts_meme_shorthand() {
	let (_root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/search?meme=22222222", None).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["size"], 1);
	assert_eq!(json["notebooks"][0]["id"], "bbbbbbbbbbbbbbbbbbbbbbbb");
	assert_eq!(json["nq"], json!({ "cell": { "and": [{ "in_meme": "22222222" }] } }));
}

#[tokio::test]
async fn unknown_predicate_reports_its_path() {
	let (_root, app) = test_app().await;
	let nq = encode(r#"{"cell":{"and":[{"not_valid":"x"}]}}"#);
	let response = call(&app, "GET", &format!("/v1/search?nq={nq}"), None).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "UNKNOWN_PREDICATE_KEY");
	assert_eq!(json["fields"][0], "$.cell.and[0].not_valid");
}

#[tokio::test]
async fn malformed_nq_and_bad_page_are_bad_requests() {
	let (_root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/search?nq=%7Bnope", None).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error_code"], "INVALID_REQUEST");

	let response = call(&app, "GET", "/v1/search?limit=abc", None).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error_code"], "INVALID_PAGE");
}

#[tokio::test]
async fn history_is_saved_and_listed() {
	let (_root, app) = test_app().await;
	let response =
		call(&app, "PUT", "/v1/history?q=posix", Some(json!({ "name": "posix notebooks" }))).await;

	assert_eq!(response.status(), StatusCode::OK);

	let saved = json_body(response).await;

	assert_eq!(saved["notebook_ids"], json!(["bbbbbbbbbbbbbbbbbbbbbbbb"]));

	let listed = json_body(call(&app, "GET", "/v1/history", None).await).await;

	assert_eq!(listed["histories"][0]["id"], saved["id"]);
	assert_eq!(listed["histories"][0]["name"], "posix notebooks");
	assert_eq!(listed["histories"][0]["notebooks"], 1);

	let response = call(&app, "PUT", "/v1/history", Some(json!({}))).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_history_is_not_found() {
	let (_root, app) = test_app().await;
	let nq = encode(r#"{"target":{"type":"all","history_in":"ffffffffffffffffffffffff"}}"#);
	let response = call(&app, "GET", &format!("/v1/search?nq={nq}"), None).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(json_body(response).await["error_code"], "HISTORY_NOT_FOUND");
}

#[tokio::test]
async fn import_writes_into_staging_directory() {
	let (root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/import/nbsearch-tmp/nb-1", None).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(json_body(response).await["filename"], "notebook1.ipynb");

	let response = call(&app, "GET", "/v1/import/nbsearch-tmp/nb-1", None).await;

	assert_eq!(json_body(response).await["filename"], "notebook1 (1).ipynb");
	assert!(root.base_dir().join("nbsearch-tmp/notebook1 (1).ipynb").is_file());
}

#[tokio::test]
async fn import_rejects_traversal_and_missing_destination() {
	let (root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/import/work/../nb-1", None).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error_code"], "PATH_TRAVERSAL_REJECTED");

	let response = call(&app, "GET", "/v1/import//nb-1", None).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(json_body(response).await["error_code"], "DESTINATION_MISSING");

	let response = call(&app, "GET", "/v1/import///etc/nb-1", None).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let response = call(&app, "GET", "/v1/import/absent/nb-1", None).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(std::fs::read_dir(root.base_dir()).expect("Failed to list root.").count(), 0);
}

#[tokio::test]
async fn bare_id_imports_into_root() {
	let (root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/import/nb-1", None).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(json_body(response).await["filename"], "notebook1.ipynb");
	assert!(root.base_dir().join("notebook1.ipynb").is_file());
}

#[tokio::test]
async fn download_sets_attachment_filename() {
	let (_root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/download/nb-1", None).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers()[header::CONTENT_DISPOSITION],
		"attachment; filename=\"notebook1.ipynb\""
	);

	let json = json_body(response).await;

	assert_eq!(json["nbformat"], 4);
}

#[tokio::test]
async fn data_wraps_notebook_with_metadata() {
	let (_root, app) = test_app().await;
	let json = json_body(call(&app, "GET", "/v1/data/nb-1", None).await).await;

	assert_eq!(json["notebook"]["nbformat"], 4);
	assert_eq!(json["metadata"]["filename"], "notebook1.ipynb");

	let response = call(&app, "GET", "/v1/data/unknown", None).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(json_body(response).await["error_code"], "DOCUMENT_NOT_FOUND");
}

#[tokio::test]
async fn index_search_checks_target() {
	let (_root, app) = test_app().await;
	let response = call(&app, "GET", "/v1/notebook/search?query=pandas", None).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["numFound"], 1);
	assert_eq!(json["solrquery"], "pandas");
	assert!(json.get("cells").is_none());

	let response = call(&app, "GET", "/v1/owner/search?query=pandas", None).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
