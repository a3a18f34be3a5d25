use serde_json::{Value, json};

use nbs_domain::{
	Error, Nq, TraversalReason,
	cell::compile_cell_match,
	import_path::{candidate_filename, validate_destination},
	page::{Page, SortSpec},
	pipeline::{self, CompiledQuery, Stage},
	target::{self, ResolvedTarget},
	value::compile_value,
};

fn compile(raw: Value, target: Option<ResolvedTarget>) -> Vec<Stage> {
	let nq = Nq::parse(&raw).expect("Failed to parse NQ.");

	pipeline::assemble_nq(&nq, target.as_ref())
}

#[test]
fn value_operators_compile_to_one_comparison() {
	for (op, native) in [("eq", "$eq"), ("not", "$ne"), ("in", "$regex")] {
		let compiled = compile_value(&json!({ op: "v" })).expect("Failed to compile value.");
		let obj = compiled.as_object().expect("Compiled value must be an object.");

		assert_eq!(obj.len(), 1);
		assert!(obj.contains_key(native));
	}
}

#[test]
fn meme_shorthand_compiles_to_elem_match() {
	let nq = Nq::from_meme("MEME").expect("Failed to build NQ.");
	let stages = pipeline::assemble_nq(&nq, None);

	assert_eq!(
		stages,
		vec![Stage::Match(json!({ "$and": [{ "cells": { "$elemMatch": {
			"metadata.lc_cell_meme.current": { "$regex": "MEME" }
		} } }] }))]
	);
}

#[test]
fn text_and_cell_clauses_collapse_into_one_match() {
	let target = ResolvedTarget { text: Some("TEXT".to_string()), ..Default::default() };
	let stages = compile(
		json!({
			"target": { "type": "all", "text": "TEXT" },
			"cell": { "and": [{ "in_code": "CODE" }] }
		}),
		Some(target),
	);

	assert_eq!(
		stages,
		vec![Stage::Match(json!({ "$and": [
			{ "$text": { "$search": "TEXT" } },
			{ "$and": [{ "cells": { "$elemMatch": {
				"cell_type": "code",
				"source": { "$regex": "CODE" }
			} } }] }
		] }))]
	);
}

#[test]
fn clause_order_is_target_notebook_cell() {
	let target = ResolvedTarget { history_ids: Some(vec!["x".to_string()]), ..Default::default() };
	let stages = compile(
		json!({
			"cell": { "or": [{ "in_output": "OUT" }] },
			"notebook": { "server": { "eq": "s1" } },
			"target": { "history_in": "h" }
		}),
		Some(target),
	);
	let Some(Stage::Match(expr)) = stages.first() else {
		panic!("expected a collapsed match stage");
	};
	let parts = expr["$and"].as_array().expect("Collapsed match must be a conjunction.");

	assert_eq!(parts.len(), 3);
	assert!(parts[0].get("_id").is_some());
	assert!(parts[1].get("server").is_some());
	assert!(parts[2].get("$or").is_some());
}

#[test]
fn related_prefixes_are_one_anchor_each() {
	let rows = vec![json!({ "_id": "P", "count": 5 })];
	let prefixes = target::related_prefixes(&rows);
	let expr = target::related_expr(&prefixes);

	assert_eq!(
		expr,
		json!({ "cells": { "$elemMatch": { "$or": [
			{ "metadata.lc_cell_meme.current": { "$regex": "^P" } }
		] } } })
	);
}

#[test]
fn unknown_cell_predicate_is_never_ignored() {
	assert!(matches!(
		compile_cell_match(&json!({ "in_code": "a", "in_everything": "b" })),
		Err(Error::UnknownPredicateKey { key, .. }) if key == "in_everything"
	));
}

#[test]
fn paged_find_for_empty_query() {
	let page = Page::parse(Some("20"), None, 50, 1_000).expect("Failed to parse page.");
	let sort = SortSpec::parse("mtime-desc").expect("Failed to parse sort.");
	let query = CompiledQuery::new(pipeline::assemble_nq(&Nq::empty(), None), Some(&sort), Some(page));

	assert_eq!(
		query,
		CompiledQuery::Find {
			filter: json!({}),
			sort: Some(json!({ "mtime": -1 })),
			skip: Some(20),
			limit: Some(50),
		}
	);
}

#[test]
fn import_destinations_map_to_distinct_failures() {
	for raw in ["..", "../x", "x/..", ".", "./x", "x/."] {
		assert!(matches!(
			validate_destination(Some(raw)),
			Err(Error::PathTraversalRejected { reason: TraversalReason::SpecialComponent, .. })
		));
	}
	for raw in ["//x", "///x"] {
		assert!(matches!(
			validate_destination(Some(raw)),
			Err(Error::PathTraversalRejected { reason: TraversalReason::Absolute, .. })
		));
	}

	assert_eq!(validate_destination(None), Err(Error::DestinationMissing));
}

#[test]
fn collision_picks_lowest_free_index() {
	let existing = ["notebook1.ipynb", "notebook1 (1).ipynb", "notebook1 (3).ipynb"];
	let chosen = (0..)
		.map(|index| candidate_filename("notebook1.ipynb", index))
		.find(|candidate| !existing.contains(&candidate.as_str()))
		.expect("Some candidate must be free.");

	assert_eq!(chosen, "notebook1 (2).ipynb");
}
