use serde_json::{Value, json};

use crate::{Error, NbSearchService, Result};
use nbs_domain::{
	Nq,
	nq::TargetClause,
	page::{Page, SortSpec},
	pipeline::{self, CompiledQuery, Stage},
	target::{self, ResolvedTarget},
};
use nbs_storage::{FindOptions, ext_json};

impl NbSearchService {
	/// Runs the history lookups a target clause needs. The relatedness aggregation completes
	/// before the caller executes the outer pipeline.
	pub async fn resolve_target(&self, clause: &TargetClause) -> Result<ResolvedTarget> {
		let history_ids = match &clause.history_in {
			Some(id) => Some(self.history_notebook_ids(id).await?),
			None => None,
		};
		let related_prefixes = match &clause.history_related {
			Some(id) => {
				let ids = self.history_notebook_ids(id).await?;

				Some(self.shared_lineage_prefixes(&ids).await?)
			},
			None => None,
		};

		Ok(ResolvedTarget { text: clause.text.clone(), history_ids, related_prefixes })
	}

	pub async fn assemble_pipeline(&self, nq: &Nq) -> Result<Vec<Stage>> {
		let target = match &nq.target {
			Some(clause) => Some(self.resolve_target(clause).await?),
			None => None,
		};

		Ok(pipeline::assemble_nq(nq, target.as_ref()))
	}

	/// Executes `nq` against the notebook collection. Results are stored documents, not yet
	/// projected for transport.
	pub(crate) async fn run_query(
		&self,
		nq: &Nq,
		sort: Option<&SortSpec>,
		page: Option<Page>,
	) -> Result<Vec<Value>> {
		let stages = self.assemble_pipeline(nq).await?;

		match CompiledQuery::new(stages, sort, page) {
			CompiledQuery::Find { filter, sort, skip, limit } => {
				tracing::debug!(filter = %filter, "Running notebook find.");

				let options = FindOptions { sort, skip, limit };

				Ok(self.notebooks.find(&filter, &options).await?)
			},
			CompiledQuery::Aggregate { stages } => {
				let pipeline = Value::Array(stages.clone());

				tracing::debug!(%pipeline, "Running notebook aggregation.");

				Ok(self.notebooks.aggregate(&stages).await?)
			},
		}
	}

	async fn history_notebook_ids(&self, id: &str) -> Result<Vec<String>> {
		let filter = json!({ "_id": target::object_id(id) });
		let entry = self
			.history
			.find_one(&filter)
			.await?
			.ok_or_else(|| Error::HistoryNotFound { id: id.to_string() })?;
		let ids = entry
			.get("notebook_ids")
			.and_then(Value::as_array)
			.map(|ids| ids.iter().filter_map(ext_json::id_string).collect())
			.unwrap_or_default();

		Ok(ids)
	}

	async fn shared_lineage_prefixes(&self, ids: &[String]) -> Result<Vec<String>> {
		let stages = target::related_pipeline(ids, self.cfg.search.lineage_prefix_len)
			.iter()
			.map(Stage::to_native)
			.collect::<Vec<_>>();
		let rows = self.notebooks.aggregate(&stages).await?;
		let prefixes = target::related_prefixes(&rows);

		tracing::debug!(
			notebooks = ids.len(),
			prefixes = prefixes.len(),
			"Resolved related lineage."
		);

		Ok(prefixes)
	}
}
