//! Writes a notebook's original bytes under the import root.
//!
//! The destination is validated before any lookup or filesystem call. The final name is claimed
//! with an exclusive create, so a name taken between attempts moves the search to the next index
//! instead of overwriting.

use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use serde::Serialize;
use tokio::fs;

use crate::{Error, NbSearchService, Result, documents};
use nbs_domain::import_path::{self, Destination};

#[derive(Debug, Clone)]
pub struct ImportRequest {
	/// Destination directory relative to the import root, as supplied by the client.
	pub path: Option<String>,
	pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
	pub filename: String,
}

impl NbSearchService {
	pub async fn import(&self, req: ImportRequest) -> Result<ImportResponse> {
		let destination = import_path::validate_destination(req.path.as_deref())?;
		let doc = self.resolve_document(&req.id).await?;
		let filename = documents::stored_filename(&doc, &req.id)?;
		let staged = destination.is_staging(&self.cfg.storage.staging_dir);
		let dir = self.prepare_directory(&destination, staged).await?;
		let (final_name, mut file) = create_unique(&dir, &filename).await?;
		let path = dir.join(&final_name);

		let downloaded = self.blobs.download(&req.id, &mut file).await;

		if let Err(err) = downloaded {
			drop(file);

			if let Err(cleanup) = fs::remove_file(&path).await {
				tracing::warn!(
					path = %path.display(),
					error = %cleanup,
					"Failed to remove partial import."
				);
			}

			return Err(err.into());
		}

		file.sync_all().await?;
		drop(file);

		if staged && let Err(err) = make_read_only(&path).await {
			tracing::warn!(
				path = %path.display(),
				error = %err,
				"Failed to mark staged import read-only."
			);
		}

		tracing::info!(
			id = %req.id,
			destination = %destination.as_str(),
			filename = %final_name,
			staged,
			"Imported notebook."
		);

		Ok(ImportResponse { filename: final_name })
	}

	/// The staging directory is created on demand; any other destination must already exist.
	async fn prepare_directory(&self, destination: &Destination, staged: bool) -> Result<PathBuf> {
		let dir = destination.resolve(&self.cfg.storage.base_dir);

		if staged {
			fs::create_dir_all(&dir).await?;

			return Ok(dir);
		}

		match fs::metadata(&dir).await {
			Ok(meta) if meta.is_dir() => Ok(dir),
			Ok(_) => Err(Error::NotFound {
				message: format!("Destination {:?} is not a directory.", destination.as_str()),
			}),
			Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::NotFound {
				message: format!("Destination {:?} does not exist.", destination.as_str()),
			}),
			Err(err) => Err(err.into()),
		}
	}
}

/// Claims the lowest free `name`, `stem (1)ext`, `stem (2)ext`, ... in `dir`.
async fn create_unique(dir: &Path, name: &str) -> Result<(String, fs::File)> {
	let mut index = 0;

	loop {
		let candidate = import_path::candidate_filename(name, index);
		let opened =
			fs::OpenOptions::new().write(true).create_new(true).open(dir.join(&candidate)).await;

		match opened {
			Ok(file) => return Ok((candidate, file)),
			Err(err) if err.kind() == ErrorKind::AlreadyExists => index += 1,
			Err(err) => return Err(err.into()),
		}
	}
}

#[cfg(unix)]
async fn make_read_only(path: &Path) -> std::io::Result<()> {
	use std::os::unix::fs::PermissionsExt;

	fs::set_permissions(path, std::fs::Permissions::from_mode(0o400)).await
}

#[cfg(not(unix))]
async fn make_read_only(path: &Path) -> std::io::Result<()> {
	let mut permissions = fs::metadata(path).await?.permissions();

	permissions.set_readonly(true);

	fs::set_permissions(path, permissions).await
}
