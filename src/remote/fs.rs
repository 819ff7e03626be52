//! Remote storage over a mounted directory

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

use super::{Credentials, RemoteConnector, RemoteResult, RemoteStorage};
use crate::error::ConnectionError;
use crate::path::RelPath;

fn remote_err(operation: &'static str, path: &str, source: io::Error) -> ConnectionError {
	ConnectionError::Remote { operation, path: path.to_string(), source }
}

/// Remote paths resolved below a local mount point
#[derive(Debug, Clone)]
pub struct FsRemote {
	root: PathBuf,
}

impl FsRemote {
	pub fn new(root: PathBuf) -> Self {
		FsRemote { root }
	}

	fn resolve(&self, operation: &'static str, path: &str) -> RemoteResult<PathBuf> {
		match RelPath::parse(path) {
			Some(rel) => Ok(rel.to_native(&self.root)),
			None if path.trim_matches('/').is_empty() => Ok(self.root.clone()),
			None => Err(remote_err(
				operation,
				path,
				io::Error::new(io::ErrorKind::InvalidInput, "path escapes the remote root"),
			)),
		}
	}
}

#[async_trait]
impl RemoteStorage for FsRemote {
	async fn exists(&self, path: &str) -> RemoteResult<bool> {
		let native = self.resolve("exists", path)?;
		tokio::fs::try_exists(&native).await.map_err(|e| remote_err("exists", path, e))
	}

	async fn mkdir(&self, path: &str) -> RemoteResult<()> {
		let native = self.resolve("mkdir", path)?;
		match tokio::fs::create_dir(&native).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists && native.is_dir() => Ok(()),
			Err(e) => Err(remote_err("mkdir", path, e)),
		}
	}

	async fn mkdirs(&self, path: &str) -> RemoteResult<()> {
		let native = self.resolve("mkdirs", path)?;
		tokio::fs::create_dir_all(&native).await.map_err(|e| remote_err("mkdirs", path, e))
	}

	async fn download(&self, remote: &str, local: &Path) -> RemoteResult<u64> {
		let native = self.resolve("download", remote)?;
		if let Some(parent) = local.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(|e| remote_err("download", remote, e))?;
		}
		tokio::fs::copy(&native, local).await.map_err(|e| remote_err("download", remote, e))
	}

	async fn upload(&self, local: &Path, remote: &str) -> RemoteResult<u64> {
		let native = self.resolve("upload", remote)?;
		// Write under a temporary name so the intake never sees partial files
		let mut partial = native.clone().into_os_string();
		partial.push(".part");
		let partial = PathBuf::from(partial);
		let size = tokio::fs::copy(local, &partial).await.map_err(|e| remote_err("upload", remote, e))?;
		tokio::fs::rename(&partial, &native).await.map_err(|e| remote_err("upload", remote, e))?;
		Ok(size)
	}
}

/// Connector for a mounted share
///
/// Mounting (and therefore authentication) happens outside the process, so no
/// credentials are requested.
#[derive(Debug, Clone)]
pub struct FsConnector {
	root: PathBuf,
}

impl FsConnector {
	pub fn new(root: PathBuf) -> Self {
		FsConnector { root }
	}
}

#[async_trait]
impl RemoteConnector for FsConnector {
	fn location(&self) -> String {
		self.root.display().to_string()
	}

	fn needs_credentials(&self) -> bool {
		false
	}

	async fn connect(&self, _credentials: Option<&Credentials>) -> RemoteResult<Box<dyn RemoteStorage>> {
		match tokio::fs::metadata(&self.root).await {
			Ok(meta) if meta.is_dir() => Ok(Box::new(FsRemote::new(self.root.clone()))),
			Ok(_) => Err(ConnectionError::Unreachable {
				location: self.location(),
				source: Box::new(io::Error::other("not a directory")),
			}),
			Err(e) => Err(ConnectionError::Unreachable { location: self.location(), source: Box::new(e) }),
		}
	}
}


// vim: ts=4
