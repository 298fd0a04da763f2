//! A [`StorageBackend`] that uses a local directory tree on disk.

use super::error::{Error, ErrorKind};
use super::storage_backend::{FEATURE_RESTART, Fileinfo, Metadata, Result, StorageBackend};
use crate::auth::UserDetail;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncSeekExt};

/// The Filesystem struct is an implementation of the StorageBackend trait that
/// uses the local filesystem as its storage, rooted at the directory given to
/// [`Filesystem::new`].
///
/// Paths handed to this back-end are virtual absolute paths as produced by the
/// session's path resolution, so `..` components have already been folded away
/// and the root prefix simply maps onto the configured root directory.
#[derive(Debug)]
pub struct Filesystem {
    root: PathBuf,
}

impl Filesystem {
    /// Create a new Filesystem backend, with the given root. No operation
    /// will escape this root.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Filesystem { root: root.into() }
    }

    fn full_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }
}

impl Metadata for std::fs::Metadata {
    fn len(&self) -> u64 {
        self.len()
    }

    fn is_dir(&self) -> bool {
        self.is_dir()
    }

    fn is_file(&self) -> bool {
        self.is_file()
    }

    fn is_symlink(&self) -> bool {
        self.file_type().is_symlink()
    }

    fn modified(&self) -> Result<SystemTime> {
        self.modified().map_err(|e| e.into())
    }

    fn gid(&self) -> u32 {
        #[cfg(unix)]
        {
            std::os::unix::fs::MetadataExt::gid(self)
        }
        #[cfg(not(unix))]
        {
            0
        }
    }

    fn uid(&self) -> u32 {
        #[cfg(unix)]
        {
            std::os::unix::fs::MetadataExt::uid(self)
        }
        #[cfg(not(unix))]
        {
            0
        }
    }
}

#[async_trait::async_trait]
impl<User: UserDetail> StorageBackend<User> for Filesystem {
    type Metadata = std::fs::Metadata;

    fn name(&self) -> &str {
        "Filesystem"
    }

    fn supported_features(&self) -> u32 {
        FEATURE_RESTART
    }

    #[tracing_attributes::instrument]
    async fn metadata<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P) -> Result<Self::Metadata> {
        let meta = tokio::fs::metadata(self.full_path(path)).await?;
        Ok(meta)
    }

    #[allow(clippy::type_complexity)]
    #[tracing_attributes::instrument]
    async fn list<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P) -> Result<Vec<Fileinfo<PathBuf, Self::Metadata>>> {
        let mut entries = tokio::fs::read_dir(self.full_path(path)).await?;
        let mut fis: Vec<Fileinfo<PathBuf, Self::Metadata>> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Entries that vanish mid-listing are skipped.
                Err(_) => continue,
            };
            fis.push(Fileinfo {
                path: entry.path(),
                metadata,
            });
        }
        Ok(fis)
    }

    #[tracing_attributes::instrument]
    async fn get<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P, start_pos: u64) -> Result<Box<dyn AsyncRead + Send + Sync + Unpin>> {
        let mut file = tokio::fs::File::open(self.full_path(path)).await?;
        if start_pos > 0 {
            file.seek(std::io::SeekFrom::Start(start_pos)).await?;
        }
        Ok(Box::new(file))
    }

    async fn put<P: AsRef<Path> + Send + Debug, R: AsyncRead + Send + Sync + Unpin + 'static>(
        &self,
        _user: &User,
        mut input: R,
        path: P,
        start_pos: u64,
    ) -> Result<u64> {
        // A fresh STOR truncates, a restarted or appended one writes in place.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(start_pos == 0)
            .open(self.full_path(path))
            .await?;
        if start_pos > 0 {
            file.seek(std::io::SeekFrom::Start(start_pos)).await?;
        }
        let bytes = tokio::io::copy(&mut input, &mut file).await?;
        Ok(bytes)
    }

    #[tracing_attributes::instrument]
    async fn del<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P) -> Result<()> {
        tokio::fs::remove_file(self.full_path(path)).await?;
        Ok(())
    }

    #[tracing_attributes::instrument]
    async fn mkd<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P) -> Result<()> {
        tokio::fs::create_dir(self.full_path(path)).await?;
        Ok(())
    }

    #[tracing_attributes::instrument]
    async fn rename<P: AsRef<Path> + Send + Debug>(&self, _user: &User, from: P, to: P) -> Result<()> {
        let from = self.full_path(from);
        let to = self.full_path(to);
        tokio::fs::symlink_metadata(&from).await?;
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    #[tracing_attributes::instrument]
    async fn rmd<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P) -> Result<()> {
        tokio::fs::remove_dir(self.full_path(path)).await?;
        Ok(())
    }

    #[tracing_attributes::instrument]
    async fn cwd<P: AsRef<Path> + Send + Debug>(&self, _user: &User, path: P) -> Result<()> {
        let meta = tokio::fs::metadata(self.full_path(path)).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(Error::from(ErrorKind::PermanentFileNotAvailable))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DefaultUser;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Filesystem::new(tmp.path());

        let content = b"hello world".to_vec();
        let bytes = fs
            .put(&DefaultUser {}, std::io::Cursor::new(content.clone()), "/greeting.txt", 0)
            .await
            .unwrap();
        assert_eq!(bytes, content.len() as u64);

        let mut reader = fs.get(&DefaultUser {}, "/greeting.txt", 0).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn get_honors_start_pos() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Filesystem::new(tmp.path());
        fs.put(&DefaultUser {}, std::io::Cursor::new(b"0123456789".to_vec()), "/digits", 0)
            .await
            .unwrap();

        let mut reader = fs.get(&DefaultUser {}, "/digits", 6).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"6789");
    }

    #[tokio::test]
    async fn put_at_offset_leaves_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Filesystem::new(tmp.path());
        fs.put(&DefaultUser {}, std::io::Cursor::new(b"aaaa".to_vec()), "/f", 0).await.unwrap();
        fs.put(&DefaultUser {}, std::io::Cursor::new(b"bb".to_vec()), "/f", 4).await.unwrap();

        let mut reader = fs.get(&DefaultUser {}, "/f", 0).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"aaaabb");
    }

    #[tokio::test]
    async fn mkd_cwd_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Filesystem::new(tmp.path());
        fs.mkd(&DefaultUser {}, "/sub").await.unwrap();
        fs.cwd(&DefaultUser {}, "/sub").await.unwrap();
        assert!(fs.cwd(&DefaultUser {}, "/nope").await.is_err());

        let listing = fs.list(&DefaultUser {}, "/").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].metadata.is_dir());
    }

    #[tokio::test]
    async fn del_and_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Filesystem::new(tmp.path());
        fs.put(&DefaultUser {}, std::io::Cursor::new(b"x".to_vec()), "/a", 0).await.unwrap();
        fs.rename(&DefaultUser {}, "/a", "/b").await.unwrap();
        assert!(fs.metadata(&DefaultUser {}, "/a").await.is_err());
        fs.del(&DefaultUser {}, "/b").await.unwrap();
        assert!(fs.metadata(&DefaultUser {}, "/b").await.is_err());
    }
}
