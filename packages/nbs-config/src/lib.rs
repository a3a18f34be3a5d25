mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Index, Mongo, Search, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.base_dir.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.base_dir must be non-empty.".to_string(),
		});
	}
	if cfg.storage.blob_dir.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.blob_dir must be non-empty.".to_string(),
		});
	}


	for (label, value) in [
		("storage.mongo.uri", &cfg.storage.mongo.uri),
		("storage.mongo.database", &cfg.storage.mongo.database),
		("storage.mongo.notebook_collection", &cfg.storage.mongo.notebook_collection),
		("storage.mongo.history_collection", &cfg.storage.mongo.history_collection),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if !cfg.storage.mongo.uri.starts_with("mongodb://")
		&& !cfg.storage.mongo.uri.starts_with("mongodb+srv://")
	{
		return Err(Error::Validation {
			message: "storage.mongo.uri must use the mongodb:// or mongodb+srv:// scheme."
				.to_string(),
		});
	}

	let staging_dir = cfg.storage.staging_dir.as_str();

	if staging_dir.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.staging_dir must be non-empty.".to_string(),
		});
	}
	if staging_dir.contains(['/', '\\', '\0']) || matches!(staging_dir, "." | "..") {
		return Err(Error::Validation {
			message: "storage.staging_dir must be a single directory name under storage.base_dir."
				.to_string(),
		});
	}
	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_limit > cfg.search.max_limit {
		return Err(Error::Validation {
			message: "search.default_limit must not exceed search.max_limit.".to_string(),
		});
	}
	if cfg.search.lineage_prefix_len == 0 {
		return Err(Error::Validation {
			message: "search.lineage_prefix_len must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("index.url", &cfg.index.url),
		("index.notebook_core", &cfg.index.notebook_core),
		("index.cell_core", &cfg.index.cell_core),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.index.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "index.timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.mongo.uri = cfg.storage.mongo.uri.trim().to_string();
	cfg.storage.mongo.database = cfg.storage.mongo.database.trim().to_string();

	cfg.index.url = cfg.index.url.trim().trim_end_matches('/').to_string();
}
