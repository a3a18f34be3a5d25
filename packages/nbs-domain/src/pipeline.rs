//! Pipeline assembly.
//!
//! Each top-level clause compiles to at most one match stage, in `target`, `notebook`, `cell`
//! order. When every stage is a bare match they collapse into one conjunction, and a single
//! match is executed as a plain filtered query rather than an aggregation.

use serde_json::{Map, Value, json};

use crate::{
	Nq,
	page::{Page, SortSpec},
	target::ResolvedTarget,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
	Match(Value),
	Unwind(String),
	Project(Value),
	Group(Value),
	Sort(Value),
	Skip(u64),
	Limit(u64),
}
impl Stage {
	pub fn to_native(&self) -> Value {
		match self {
			Self::Match(expr) => json!({ "$match": expr }),
			Self::Unwind(path) => json!({ "$unwind": path }),
			Self::Project(spec) => json!({ "$project": spec }),
			Self::Group(spec) => json!({ "$group": spec }),
			Self::Sort(spec) => json!({ "$sort": spec }),
			Self::Skip(count) => json!({ "$skip": count }),
			Self::Limit(count) => json!({ "$limit": count }),
		}
	}

	pub fn as_match(&self) -> Option<&Value> {
		match self {
			Self::Match(expr) => Some(expr),
			_ => None,
		}
	}
}

/// Orders the compiled clauses and applies the collapsing rule.
pub fn assemble(target: Option<Value>, notebook: Option<Value>, cell: Option<Value>) -> Vec<Stage> {
	let stages = [target, notebook, cell].into_iter().flatten().map(Stage::Match).collect::<Vec<_>>();

	collapse(stages)
}

/// Compiles `nq` with its target lookups already resolved.
pub fn assemble_nq(nq: &Nq, target: Option<&ResolvedTarget>) -> Vec<Stage> {
	assemble(
		target.and_then(ResolvedTarget::to_native),
		nq.notebook.as_ref().and_then(|clause| clause.to_native()),
		nq.cell.as_ref().map(|clause| clause.to_native()),
	)
}

/// Merges two or more match stages into one `$and`; anything else is returned unchanged.
pub fn collapse(stages: Vec<Stage>) -> Vec<Stage> {
	if stages.len() < 2 || !stages.iter().all(|stage| stage.as_match().is_some()) {
		return stages;
	}

	let conditions = stages
		.into_iter()
		.filter_map(|stage| match stage {
			Stage::Match(expr) => Some(expr),
			_ => None,
		})
		.collect::<Vec<_>>();

	vec![Stage::Match(json!({ "$and": conditions }))]
}

/// How the assembled stages are executed against the notebook collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
	Find { filter: Value, sort: Option<Value>, skip: Option<u64>, limit: Option<u64> },
	Aggregate { stages: Vec<Value> },
}
impl CompiledQuery {
	/// An empty pipeline or a single match runs as a filtered find with sort and page applied as
	/// modifiers; otherwise sort, skip and limit are appended as trailing stages.
	pub fn new(stages: Vec<Stage>, sort: Option<&SortSpec>, page: Option<Page>) -> Self {
		let filter = match stages.as_slice() {
			[] => Some(Value::Object(Map::new())),
			[Stage::Match(expr)] => Some(expr.clone()),
			_ => None,
		};

		if let Some(filter) = filter {
			return Self::Find {
				filter,
				sort: sort.map(SortSpec::to_native),
				skip: page.map(|page| page.start),
				limit: page.map(|page| page.limit),
			};
		}

		let mut stages = stages;

		if let Some(sort) = sort {
			stages.push(Stage::Sort(sort.to_native()));
		}
		if let Some(page) = page {
			stages.push(Stage::Skip(page.start));
			stages.push(Stage::Limit(page.limit));
		}

		Self::Aggregate { stages: stages.iter().map(Stage::to_native).collect() }
	}
}
