//! Delivery to a local output directory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use kf_core::{Error, JobId, Result};
use kf_pipeline::{ConversionJob, Delivery};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Upper bound on `-N` suffixes tried for one name.
const MAX_SUFFIX: usize = 10_000;

/// Copies finished videos into a directory and echoes status updates.
///
/// The delivered file is named after the source: `note.kwz` becomes
/// `note.mp4`. If that name is taken, `note-1.mp4`, `note-2.mp4`, ... are
/// tried. Names are claimed with `create_new`, so concurrent jobs never
/// share a file and earlier output is never overwritten.
#[derive(Debug)]
pub struct DirectoryDelivery {
    output_dir: PathBuf,
    quiet: bool,
    delivered: Mutex<HashMap<JobId, PathBuf>>,
}

impl DirectoryDelivery {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            quiet: false,
            delivered: Mutex::new(HashMap::new()),
        }
    }

    /// Log status updates instead of printing them.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Preferred path for the video of `source_name`, before collisions.
    pub fn destination(&self, source_name: &str) -> PathBuf {
        self.candidate(&stem_of(source_name), 0)
    }

    /// Where the video of `job` was actually written.
    pub fn delivered(&self, job: &JobId) -> Option<PathBuf> {
        self.delivered
            .lock()
            .ok()
            .and_then(|paths| paths.get(job).cloned())
    }

    fn candidate(&self, stem: &str, n: usize) -> PathBuf {
        if n == 0 {
            self.output_dir.join(format!("{stem}.mp4"))
        } else {
            self.output_dir.join(format!("{stem}-{n}.mp4"))
        }
    }

    /// Claim the first free name for `source_name`.
    async fn reserve(&self, source_name: &str) -> Result<(PathBuf, File)> {
        let stem = stem_of(source_name);
        for n in 0..MAX_SUFFIX {
            let path = self.candidate(&stem, n);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Error::Delivery(format!(
                        "cannot create {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Err(Error::Delivery(format!(
            "no free name for {stem}.mp4 in {}",
            self.output_dir.display()
        )))
    }
}

fn stem_of(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "converted".to_string())
}

async fn write_into(artifact: &mut File, dest: &mut File) -> std::io::Result<()> {
    tokio::io::copy(artifact, dest).await?;
    dest.flush().await?;
    dest.sync_all().await
}

#[async_trait]
impl Delivery for DirectoryDelivery {
    async fn status(&self, job: &ConversionJob, message: &str) {
        tracing::debug!("job {}: status: {message}", job.id);
        if !self.quiet {
            println!("[{}] {}", job.name, message);
        }
    }

    async fn deliver(&self, job: &ConversionJob, artifact: &Path) -> Result<()> {
        let mut source = File::open(artifact).await.map_err(|e| {
            Error::Delivery(format!("cannot read {}: {e}", artifact.display()))
        })?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                Error::Delivery(format!(
                    "cannot create {}: {e}",
                    self.output_dir.display()
                ))
            })?;

        let (dest, mut file) = self.reserve(&job.name).await?;
        if let Err(e) = write_into(&mut source, &mut file).await {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&dest).await {
                tracing::warn!("job {}: cannot remove partial {}: {rm}", job.id, dest.display());
            }
            return Err(Error::Delivery(format!("cannot write {}: {e}", dest.display())));
        }

        tracing::info!("job {}: delivered {}", job.id, dest.display());
        if let Ok(mut paths) = self.delivered.lock() {
            paths.insert(job.id, dest);
        }
        Ok(())
    }
}
