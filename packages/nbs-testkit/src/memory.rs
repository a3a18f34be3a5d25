//! In-process stand-in for a MongoDB collection, evaluated by [`crate::eval`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};

use nbs_storage::{BoxFuture, DocumentCollection, Error, FindOptions, Result, ext_json};

use crate::eval;

#[derive(Default)]
pub struct MemoryCollection {
	docs: Mutex<Vec<Value>>,
}
impl MemoryCollection {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_documents(docs: Vec<Value>) -> Self {
		Self { docs: Mutex::new(docs) }
	}

	fn snapshot(&self) -> Vec<Value> {
		self.lock().clone()
	}

	fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
		self.docs.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl DocumentCollection for MemoryCollection {
	fn find<'a>(
		&'a self,
		filter: &'a Value,
		options: &'a FindOptions,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move { eval::find(self.snapshot(), filter, options) })
	}

	fn aggregate<'a>(&'a self, stages: &'a [Value]) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move { eval::aggregate(self.snapshot(), stages) })
	}

	fn find_one<'a>(&'a self, filter: &'a Value) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move {
			let options = FindOptions { limit: Some(1), ..FindOptions::default() };

			Ok(eval::find(self.snapshot(), filter, &options)?.into_iter().next())
		})
	}

	fn insert_one<'a>(&'a self, doc: Value) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let mut doc = doc;
			let obj = doc
				.as_object_mut()
				.ok_or_else(|| Error::InvalidQuery("document must be an object.".to_string()))?;
			let id = match obj.get("_id").and_then(ext_json::id_string) {
				Some(id) => id,
				None => {
					let id = ext_json::new_object_id();

					obj.insert("_id".to_string(), json!({ "$oid": id }));

					id
				},
			};

			self.lock().push(doc);

			Ok(id)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn insert_assigns_an_id_the_collection_can_find() {
		let collection = MemoryCollection::new();
		let id = collection
			.insert_one(json!({ "name": "first" }))
			.await
			.expect("Failed to insert document.");
		let found = collection
			.find_one(&json!({ "_id": { "$oid": id } }))
			.await
			.expect("Failed to query collection.")
			.expect("Inserted document must be found.");
		let all = collection
			.find(&json!({}), &FindOptions::default())
			.await
			.expect("Failed to query collection.");

		assert_eq!(all.len(), 1);
		assert_eq!(found["name"], "first");
		assert!(matches!(
			collection.insert_one(json!([])).await,
			Err(Error::InvalidQuery(_))
		));
	}
}
