//! Collections backed by a MongoDB server. Filters, sorts and stages arrive as extended JSON and
//! are converted to BSON before they reach the driver.

use mongodb::{
	Client, Collection, Cursor,
	bson::{Bson, Document},
};
use serde_json::Value;

use crate::{BoxFuture, DocumentCollection, Error, FindOptions, Result};

pub struct MongoCollection {
	inner: Collection<Document>,
}
impl MongoCollection {
	pub fn new(inner: Collection<Document>) -> Self {
		Self { inner }
	}

	/// The notebook and history collections named by the storage settings, sharing one client.
	pub async fn connect_pair(cfg: &nbs_config::Mongo) -> Result<(Self, Self)> {
		let client = Client::with_uri_str(&cfg.uri).await?;
		let db = client.database(&cfg.database);

		tracing::info!(
			database = %cfg.database,
			notebooks = %cfg.notebook_collection,
			history = %cfg.history_collection,
			"Connected to MongoDB."
		);

		Ok((
			Self::new(db.collection(&cfg.notebook_collection)),
			Self::new(db.collection(&cfg.history_collection)),
		))
	}

	pub fn name(&self) -> &str {
		self.inner.name()
	}
}

impl DocumentCollection for MongoCollection {
	fn find<'a>(
		&'a self,
		filter: &'a Value,
		options: &'a FindOptions,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move {
			let mut find = self.inner.find(to_document(filter)?);

			if let Some(sort) = &options.sort {
				find = find.sort(to_document(sort)?);
			}
			if let Some(skip) = options.skip {
				find = find.skip(skip);
			}
			if let Some(limit) = options.limit {
				find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
			}

			collect(find.await?).await
		})
	}

	fn aggregate<'a>(&'a self, stages: &'a [Value]) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move {
			let pipeline = stages.iter().map(to_document).collect::<Result<Vec<_>>>()?;

			tracing::debug!(
				collection = %self.name(),
				stages = pipeline.len(),
				"Running aggregation."
			);

			collect(self.inner.aggregate(pipeline).await?).await
		})
	}

	fn find_one<'a>(&'a self, filter: &'a Value) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move {
			let found = self.inner.find_one(to_document(filter)?).await?;

			Ok(found.map(to_value))
		})
	}

	fn insert_one<'a>(&'a self, doc: Value) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let inserted = self.inner.insert_one(to_document(&doc)?).await?;

			Ok(inserted_id(inserted.inserted_id))
		})
	}
}

/// Parses extended JSON into a BSON document. Non-object values are rejected.
pub fn to_document(value: &Value) -> Result<Document> {
	match Bson::try_from(value.clone()) {
		Ok(Bson::Document(doc)) => Ok(doc),
		Ok(other) => Err(Error::InvalidQuery(format!(
			"expected a document, found {:?}.",
			other.element_type()
		))),
		Err(err) => Err(Error::InvalidQuery(err.to_string())),
	}
}

/// Relaxed extended JSON: ids stay `{"$oid": ...}` and dates stay `{"$date": "<RFC3339>"}`.
pub fn to_value(doc: Document) -> Value {
	Bson::Document(doc).into_relaxed_extjson()
}

fn inserted_id(id: Bson) -> String {
	match id {
		Bson::ObjectId(oid) => oid.to_hex(),
		Bson::String(id) => id,
		other => other.to_string(),
	}
}

async fn collect(mut cursor: Cursor<Document>) -> Result<Vec<Value>> {
	let mut docs = Vec::new();

	while cursor.advance().await? {
		docs.push(to_value(cursor.deserialize_current()?));
	}

	Ok(docs)
}
