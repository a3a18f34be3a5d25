pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Query(#[from] nbs_domain::Error),
	#[error("History {id} not found.")]
	HistoryNotFound { id: String },
	#[error("Document {id} not found.")]
	DocumentNotFound { id: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
impl From<nbs_storage::Error> for Error {
	fn from(err: nbs_storage::Error) -> Self {
		match err {
			nbs_storage::Error::Io(inner) => Self::Io(inner),
			nbs_storage::Error::NotFound(message) => Self::NotFound { message },
			nbs_storage::Error::Json(inner) => Self::Storage { message: inner.to_string() },
			nbs_storage::Error::Mongo(inner) => Self::Storage { message: inner.to_string() },
			nbs_storage::Error::InvalidQuery(message) => Self::Storage { message },
		}
	}
}

impl From<nbs_index::Error> for Error {
	fn from(err: nbs_index::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}
