//! Artifact fetching: streaming download and archive extraction.
//!
//! [`ArtifactInstaller`] is the capability seam the sync engine drives;
//! [`HttpInstaller`] is the default implementation. It reconciles the
//! installation's `mods/` directory with a lockfile: fetches missing or
//! outdated artifacts over HTTP with BLAKE3 verification, extracts them
//! into place, and removes directories no longer locked. Per-mod
//! progress is reported as typed events on an mpsc channel; sub-progress
//! events may be dropped under backpressure (consumers coalesce), but
//! completion events are always delivered.

use std::collections::BTreeMap;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::installation::Installation;
use crate::lockfile::{LockedMod, Lockfile};
use crate::progress::ByteProgress;

/// Marker file recording what is installed in a mod directory.
const META_FILE: &str = ".modsync-meta.json";

/// Typed progress events emitted by an [`ArtifactInstaller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    /// Download progress for one mod.
    Download {
        mod_reference: String,
        progress: ByteProgress,
    },
    /// Extraction progress for one mod.
    Extract {
        mod_reference: String,
        progress: ByteProgress,
    },
    /// The mod's artifact is fully downloaded and extracted.
    ModComplete { mod_reference: String },
    /// The capability's own whole-operation summary. Consumers that
    /// aggregate the per-mod events must ignore it.
    Overall(ByteProgress),
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hash mismatch for {mod_reference}: expected {expected}, got {actual}")]
    HashMismatch {
        mod_reference: String,
        expected: String,
        actual: String,
    },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Performs the artifact IO for one sync pass.
#[async_trait]
pub trait ArtifactInstaller: Send + Sync {
    /// Reconcile the on-disk mod set of `installation` with `lockfile`,
    /// reporting per-mod progress on `events`. Must block (await) until
    /// every artifact operation has finished.
    async fn install(
        &self,
        installation: &Installation,
        lockfile: &Lockfile,
        events: mpsc::Sender<InstallEvent>,
    ) -> Result<(), InstallError>;

    /// Drop installed artifacts for the named mods so the next install
    /// pass fetches them fresh.
    async fn invalidate(
        &self,
        installation: &Installation,
        mods: &[String],
    ) -> Result<(), InstallError> {
        let _ = (installation, mods);
        Ok(())
    }
}

/// What an installed mod directory currently holds.
#[derive(Debug, Serialize, Deserialize)]
struct InstalledMeta {
    version: semver::Version,
    hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        // Registry artifacts are zip-packed (".smod" is the game's zip
        // container); tarballs show up from direct release links.
        if path.ends_with(".zip") || path.ends_with(".smod") {
            Some(Self::Zip)
        } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if path.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else if path.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Installs mod artifacts over HTTP into `<installation>/mods/<reference>`.
#[derive(Debug, Clone)]
pub struct HttpInstaller {
    client: reqwest::Client,
}

impl Default for HttpInstaller {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpInstaller {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactInstaller for HttpInstaller {
    async fn install(
        &self,
        installation: &Installation,
        lockfile: &Lockfile,
        events: mpsc::Sender<InstallEvent>,
    ) -> Result<(), InstallError> {
        let mods_dir = installation.mods_dir();
        tokio::fs::create_dir_all(&mods_dir).await?;

        let pending: BTreeMap<String, LockedMod> = lockfile
            .mods
            .iter()
            .filter(|(reference, locked)| !is_current(&mods_dir, reference, locked))
            .map(|(reference, locked)| (reference.clone(), locked.clone()))
            .collect();

        let total = pending.len() as u64;
        let mut set: JoinSet<Result<(), InstallError>> = JoinSet::new();
        for (reference, locked) in pending {
            let client = self.client.clone();
            let mods_dir = mods_dir.clone();
            let events = events.clone();
            // Downloads run concurrently; the effective limit is the
            // client's connection pool. Tasks share nothing but the
            // events channel and write to per-mod staging directories.
            set.spawn(async move {
                fetch_mod(&client, &mods_dir, &reference, &locked, &events).await
            });
        }

        let mut completed = 0u64;
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {
                    completed += 1;
                    let _ = events.try_send(InstallEvent::Overall(ByteProgress::new(
                        completed, total,
                    )));
                }
                Ok(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error =
                            Some(InstallError::Other(format!("install task failed: {join_error}")));
                    }
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        remove_stale(&mods_dir, lockfile).await
    }

    async fn invalidate(
        &self,
        installation: &Installation,
        mods: &[String],
    ) -> Result<(), InstallError> {
        for reference in mods {
            let dir = installation.mods_dir().join(reference);
            if dir.is_dir() {
                tokio::fs::remove_dir_all(&dir).await?;
            }
        }
        Ok(())
    }
}

fn is_current(mods_dir: &Path, reference: &str, locked: &LockedMod) -> bool {
    let meta_path = mods_dir.join(reference).join(META_FILE);
    let Ok(content) = std::fs::read_to_string(meta_path) else {
        return false;
    };
    let Ok(meta) = serde_json::from_str::<InstalledMeta>(&content) else {
        return false;
    };
    meta.version == locked.version && (locked.hash.is_empty() || meta.hash == locked.hash)
}

async fn fetch_mod(
    client: &reqwest::Client,
    mods_dir: &Path,
    reference: &str,
    locked: &LockedMod,
    events: &mpsc::Sender<InstallEvent>,
) -> Result<(), InstallError> {
    if locked.download_url.is_empty() {
        return Err(InstallError::Other(format!(
            "no download url for {reference}@{}",
            locked.version
        )));
    }
    let format = ArchiveFormat::from_url(&locked.download_url)
        .ok_or_else(|| InstallError::UnsupportedFormat(locked.download_url.clone()))?;

    let response = client
        .get(&locked.download_url)
        .send()
        .await?
        .error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    send_progress(events, download_event(reference, 0, total));

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(mods_dir)?;
    let archive_path = staging.path().join("artifact");

    let mut file = tokio::fs::File::create(&archive_path).await?;
    let mut hasher = blake3::Hasher::new();
    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        send_progress(
            events,
            download_event(reference, downloaded, total.max(downloaded)),
        );
    }
    file.flush().await?;
    drop(file);

    let actual = hasher.finalize().to_hex().to_string();
    if !locked.hash.is_empty() && actual != locked.hash {
        return Err(InstallError::HashMismatch {
            mod_reference: reference.to_string(),
            expected: locked.hash.clone(),
            actual,
        });
    }

    let contents = staging.path().join("contents");
    tokio::fs::create_dir_all(&contents).await?;
    extract_archive(&archive_path, &contents, reference, format, events).await?;

    let meta = InstalledMeta {
        version: locked.version.clone(),
        hash: actual,
    };
    tokio::fs::write(contents.join(META_FILE), serde_json::to_vec_pretty(&meta)?).await?;

    let final_dir = mods_dir.join(reference);
    if final_dir.exists() {
        tokio::fs::remove_dir_all(&final_dir).await?;
    }
    tokio::fs::rename(&contents, &final_dir).await?;

    // Completion must not be lost to backpressure.
    let _ = events
        .send(InstallEvent::ModComplete {
            mod_reference: reference.to_string(),
        })
        .await;
    Ok(())
}

async fn extract_archive(
    archive_path: &Path,
    dest: &Path,
    reference: &str,
    format: ArchiveFormat,
    events: &mpsc::Sender<InstallEvent>,
) -> Result<(), InstallError> {
    if format == ArchiveFormat::Zip {
        let archive_path = archive_path.to_path_buf();
        let dest = dest.to_path_buf();
        let reference = reference.to_string();
        let events = events.clone();
        return tokio::task::spawn_blocking(move || {
            extract_zip(&archive_path, &dest, &reference, &events)
        })
        .await
        .map_err(|e| InstallError::Other(format!("extract task failed: {e}")))?;
    }

    use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};

    let file = tokio::fs::File::open(archive_path).await?;
    let total = file.metadata().await?.len();
    let reader = tokio::io::BufReader::new(ProgressReader {
        inner: file,
        mod_reference: reference.to_string(),
        total,
        read: 0,
        events: events.clone(),
    });
    match format {
        ArchiveFormat::TarGz => {
            tokio_tar::Archive::new(GzipDecoder::new(reader))
                .unpack(dest)
                .await?;
        }
        ArchiveFormat::TarZst => {
            tokio_tar::Archive::new(ZstdDecoder::new(reader))
                .unpack(dest)
                .await?;
        }
        ArchiveFormat::Tar => {
            tokio_tar::Archive::new(reader).unpack(dest).await?;
        }
        ArchiveFormat::Zip => unreachable!("zip handled above"),
    }
    Ok(())
}

fn extract_zip(
    archive_path: &Path,
    dest: &Path,
    reference: &str,
    events: &mpsc::Sender<InstallEvent>,
) -> Result<(), InstallError> {
    let file = std::fs::File::open(archive_path)?;
    let total = file.metadata()?.len();
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| InstallError::Archive(e.to_string()))?;

    let mut consumed = 0u64;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| InstallError::Archive(e.to_string()))?;
        // Entries escaping the destination are skipped, not an error.
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut target = std::fs::File::create(&out)?;
            std::io::copy(&mut entry, &mut target)?;
        }
        consumed = (consumed + entry.compressed_size()).min(total);
        send_progress(
            events,
            InstallEvent::Extract {
                mod_reference: reference.to_string(),
                progress: ByteProgress::new(consumed, total),
            },
        );
    }
    Ok(())
}

async fn remove_stale(mods_dir: &Path, lockfile: &Lockfile) -> Result<(), InstallError> {
    let mut entries = tokio::fs::read_dir(mods_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        // Dotted entries are lockfiles and staging leftovers.
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_dir() && !lockfile.mods.contains_key(&name) {
            tokio::fs::remove_dir_all(entry.path()).await?;
        }
    }
    Ok(())
}

fn download_event(reference: &str, completed: u64, total: u64) -> InstallEvent {
    InstallEvent::Download {
        mod_reference: reference.to_string(),
        progress: ByteProgress::new(completed, total),
    }
}

/// A full channel drops the sample rather than stalling IO; the
/// aggregator coalesces sub-progress anyway.
fn send_progress(events: &mpsc::Sender<InstallEvent>, event: InstallEvent) {
    let _ = events.try_send(event);
}

/// AsyncRead adapter that reports cumulative bytes read as extraction
/// progress. The archive's compressed size is the total, so progress
/// tracks how much of the archive has been consumed.
struct ProgressReader<R> {
    inner: R,
    mod_reference: String,
    total: u64,
    read: u64,
    events: mpsc::Sender<InstallEvent>,
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let n = (buf.filled().len() - before) as u64;
            if n > 0 {
                this.read += n;
                send_progress(
                    &this.events,
                    InstallEvent::Extract {
                        mod_reference: this.mod_reference.clone(),
                        progress: ByteProgress::new(this.read, this.total),
                    },
                );
            }
        }
        result
    }
}
