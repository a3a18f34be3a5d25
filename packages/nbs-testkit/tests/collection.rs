use std::sync::Arc;

use serde_json::{Value, json};

use nbs_storage::{DocumentCollection, FindOptions};
use nbs_testkit::MemoryCollection;

fn cell(meme: &str) -> Value {
	json!({
		"cell_type": "code",
		"source": "x = 1",
		"metadata": { "lc_cell_meme": { "current": meme } }
	})
}

fn collection() -> Arc<dyn DocumentCollection> {
	Arc::new(MemoryCollection::with_documents(vec![
		json!({
			"_id": { "$oid": "aaaaaaaaaaaaaaaaaaaaaaaa" },
			"path": "/a.ipynb",
			"cells": [
				cell("11111111-2222-3333-4444-555555555555-1"),
				cell("11111111-2222-3333-4444-555555555555-2-x")
			]
		}),
		json!({
			"_id": { "$oid": "bbbbbbbbbbbbbbbbbbbbbbbb" },
			"path": "/b.ipynb",
			"cells": [cell("99999999-2222-3333-4444-555555555555-1")]
		}),
	]))
}

#[tokio::test]
async fn lineage_prefixes_shared_by_two_cells_are_grouped() {
	let stages = vec![
		json!({ "$match": { "_id": { "$in": [
			{ "$oid": "aaaaaaaaaaaaaaaaaaaaaaaa" },
			{ "$oid": "bbbbbbbbbbbbbbbbbbbbbbbb" }
		] } } }),
		json!({ "$unwind": "$cells" }),
		json!({ "$match": { "cells.metadata.lc_cell_meme.current": { "$exists": true } } }),
		json!({ "$project": { "meme": {
			"$substrCP": ["$cells.metadata.lc_cell_meme.current", 0, 36]
		} } }),
		json!({ "$group": { "_id": "$meme", "count": { "$sum": 1 } } }),
		json!({ "$match": { "count": { "$gt": 1 } } }),
		json!({ "$sort": { "count": -1 } }),
	];
	let rows = collection().aggregate(&stages).await.expect("Failed to aggregate.");

	assert_eq!(rows, vec![json!({ "_id": "11111111-2222-3333-4444-555555555555", "count": 2 })]);
}

#[tokio::test]
async fn find_matches_cell_prefix_and_pages() {
	let filter = json!({ "cells": { "$elemMatch": { "$or": [
		{ "metadata.lc_cell_meme.current": { "$regex": "^99999999" } }
	] } } });
	let docs = collection()
		.find(&filter, &FindOptions::default())
		.await
		.expect("Failed to find documents.");

	assert_eq!(docs.len(), 1);
	assert_eq!(docs[0]["path"], "/b.ipynb");

	let options = FindOptions { sort: Some(json!({ "path": -1 })), skip: Some(1), limit: Some(1) };
	let paged = collection()
		.find(&json!({}), &options)
		.await
		.expect("Failed to find documents.");

	assert_eq!(paged[0]["path"], "/a.ipynb");
}
