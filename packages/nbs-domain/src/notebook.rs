use serde_json::{Map, Value};

use crate::{
	Error, Result,
	value::{DateConstraint, ValueConstraint},
};

/// Document-level predicates. Absent fields are omitted from the compiled expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotebookClause {
	pub path: Option<ValueConstraint>,
	pub server: Option<ValueConstraint>,
	pub mtime: Option<DateConstraint>,
}
impl NotebookClause {
	pub fn parse(path: &str, raw: &Value) -> Result<Self> {
		let obj = raw
			.as_object()
			.ok_or_else(|| Error::constraint(path, "notebook clause must be an object."))?;
		let mut clause = Self::default();

		for (key, value) in obj {
			let field_path = format!("{path}.{key}");

			match key.as_str() {
				"path" => clause.path = Some(ValueConstraint::parse(&field_path, value)?),
				"server" => clause.server = Some(ValueConstraint::parse(&field_path, value)?),
				"mtime" => clause.mtime = Some(DateConstraint::parse(&field_path, value)?),
				_ => {
					return Err(Error::constraint(
						field_path,
						"notebook clause accepts only path, server, or mtime.",
					));
				},
			}
		}

		Ok(clause)
	}

	pub fn is_empty(&self) -> bool {
		self.path.is_none() && self.server.is_none() && self.mtime.is_none()
	}

	/// `None` when no field is constrained.
	pub fn to_native(&self) -> Option<Value> {
		let mut out = Map::new();

		if let Some(path) = &self.path {
			out.insert("path".to_string(), path.to_native());
		}
		if let Some(server) = &self.server {
			out.insert("server".to_string(), server.to_native());
		}
		if let Some(mtime) = &self.mtime {
			out.insert("mtime".to_string(), mtime.to_native());
		}

		if out.is_empty() { None } else { Some(Value::Object(out)) }
	}
}

pub fn compile_notebook(clause: &NotebookClause) -> Option<Value> {
	clause.to_native()
}
