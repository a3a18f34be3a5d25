#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Mongo(#[from] mongodb::error::Error),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Invalid query: {0}")]
	InvalidQuery(String),
}
