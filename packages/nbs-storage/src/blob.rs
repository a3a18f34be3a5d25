use std::{io::ErrorKind, path::PathBuf};

use tokio::{
	fs,
	io::{self, AsyncWrite, AsyncWriteExt},
};

use crate::{BlobStore, BoxFuture, Error, Result};

/// Blobs stored as `{root}/{id}`.
pub struct FsBlobStore {
	root: PathBuf,
}
impl FsBlobStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
		let path = self.blob_path(id)?;

		fs::create_dir_all(&self.root).await?;
		fs::write(path, bytes).await?;

		Ok(())
	}

	fn blob_path(&self, id: &str) -> Result<PathBuf> {
		if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\', '\0']) {
			return Err(Error::NotFound(format!("blob {id:?}")));
		}

		Ok(self.root.join(id))
	}
}

impl BlobStore for FsBlobStore {
	fn download<'a>(
		&'a self,
		id: &'a str,
		sink: &'a mut (dyn AsyncWrite + Unpin + Send),
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let path = self.blob_path(id)?;
			let mut file = match fs::File::open(&path).await {
				Ok(file) => file,
				Err(err) if err.kind() == ErrorKind::NotFound =>
					return Err(Error::NotFound(format!("blob {id:?}"))),
				Err(err) => return Err(err.into()),
			};
			let copied = io::copy(&mut file, &mut *sink).await?;

			sink.flush().await?;

			Ok(copied)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn download_streams_stored_bytes() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let store = FsBlobStore::new(dir.path().join("blobs"));

		store.put("nb1", b"{\"cells\": []}").await.expect("Failed to store blob.");

		let mut sink = Vec::new();
		let copied = store.download("nb1", &mut sink).await.expect("Failed to download blob.");

		assert_eq!(copied, 13);
		assert_eq!(sink, b"{\"cells\": []}");
	}

	#[tokio::test]
	async fn missing_or_unsafe_ids_are_not_found() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let store = FsBlobStore::new(dir.path());
		let mut sink = Vec::new();

		assert!(matches!(store.download("absent", &mut sink).await, Err(Error::NotFound(_))));
		assert!(matches!(store.download("../etc", &mut sink).await, Err(Error::NotFound(_))));
	}
}
