pub mod blob;
pub mod ext_json;
pub mod models;
pub mod mongo;

mod error;

use std::{future::Future, pin::Pin};

use serde_json::Value;
use tokio::io::AsyncWrite;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Modifiers applied to a filtered find, in sort, skip, limit order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
	pub sort: Option<Value>,
	pub skip: Option<u64>,
	pub limit: Option<u64>,
}

/// A collection of plain documents queried in the MongoDB dialect.
pub trait DocumentCollection
where
	Self: Send + Sync,
{
	fn find<'a>(
		&'a self,
		filter: &'a Value,
		options: &'a FindOptions,
	) -> BoxFuture<'a, Result<Vec<Value>>>;

	fn aggregate<'a>(&'a self, stages: &'a [Value]) -> BoxFuture<'a, Result<Vec<Value>>>;

	fn find_one<'a>(&'a self, filter: &'a Value) -> BoxFuture<'a, Result<Option<Value>>>;

	/// Returns the stored document's id, assigning one when the document has none.
	fn insert_one<'a>(&'a self, doc: Value) -> BoxFuture<'a, Result<String>>;
}

/// Original file bytes, addressed by notebook id.
pub trait BlobStore
where
	Self: Send + Sync,
{
	/// Streams the blob into `sink` and returns the number of bytes written.
	fn download<'a>(
		&'a self,
		id: &'a str,
		sink: &'a mut (dyn AsyncWrite + Unpin + Send),
	) -> BoxFuture<'a, Result<u64>>;
}
