use std::fs;
use std::path::{Path, PathBuf};

use embed::{open_image, ImageTensor, ImageTransform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{BatchPolicy, CorpusConfig, CorpusError, EnumerationOrder};

/// An eligible file that was skipped: undecodable, or a name the path list
/// cannot store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// One group of decoded, preprocessed images.
///
/// `tensors[i]` belongs to `paths[i]`. Files that failed to decode are in
/// `failures` and take no slot, so the remaining pairs stay aligned.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based position of this batch in the sequence.
    pub index: usize,
    pub tensors: Vec<ImageTensor>,
    pub paths: Vec<PathBuf>,
    pub failures: Vec<DecodeFailure>,
}

impl Batch {
    /// Number of successfully decoded images.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// `(tensor, path)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&ImageTensor, &Path)> {
        self.tensors
            .iter()
            .zip(self.paths.iter().map(PathBuf::as_path))
    }
}

/// Enumerates an image directory and hands it out in preprocessed batches.
///
/// The file list is fixed at [`open`](Self::open); [`batches`](Self::batches)
/// can be called any number of times and always yields the same sequence.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    root: PathBuf,
    transform: ImageTransform,
    config: CorpusConfig,
    files: Vec<PathBuf>,
    dropped: Vec<PathBuf>,
    rejected: Vec<DecodeFailure>,
}

/// Why `path` cannot be written one-per-line as UTF-8, if it cannot.
fn unstorable_reason(path: &Path) -> Option<&'static str> {
    match path.to_str() {
        None => Some("path is not valid UTF-8"),
        Some(text) if text.contains(['\n', '\r']) => Some("path contains a line break"),
        Some(_) => None,
    }
}

impl CorpusLoader {
    /// List eligible files directly inside `dir` (no recursion).
    pub fn open(
        dir: impl AsRef<Path>,
        transform: ImageTransform,
        config: CorpusConfig,
    ) -> Result<Self, CorpusError> {
        let root = dir.as_ref().to_path_buf();
        config.validate()?;
        transform
            .validate()
            .map_err(|e| CorpusError::InvalidConfig(e.to_string()))?;
        if !root.is_dir() {
            return Err(CorpusError::NotADirectory(root));
        }

        let io_err = |e: std::io::Error| CorpusError::Io {
            path: root.clone(),
            message: e.to_string(),
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&root).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && config.is_eligible(&path) {
                files.push(path);
            }
        }

        if config.order == EnumerationOrder::Sorted {
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        }

        let mut rejected = Vec::new();
        files.retain(|path| match unstorable_reason(path) {
            Some(reason) => {
                warn!(path = %path.display(), reason, "skipping image with unstorable name");
                rejected.push(DecodeFailure {
                    path: path.clone(),
                    reason: reason.to_string(),
                });
                false
            }
            None => true,
        });

        let eligible = files.len();
        let dropped = match config.batch_policy {
            BatchPolicy::KeepPartial => Vec::new(),
            BatchPolicy::DropPartial => {
                let keep = eligible - eligible % config.batch_size;
                files.split_off(keep)
            }
        };
        if !dropped.is_empty() {
            warn!(
                count = dropped.len(),
                batch_size = config.batch_size,
                "trailing partial batch dropped"
            );
        }

        info!(
            dir = %root.display(),
            eligible,
            batches = files.len().div_ceil(config.batch_size),
            "corpus enumerated"
        );

        Ok(Self {
            root,
            transform,
            config,
            files,
            dropped,
            rejected,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Files that will be yielded, in row order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files excluded by [`BatchPolicy::DropPartial`]. Empty otherwise.
    pub fn dropped(&self) -> &[PathBuf] {
        &self.dropped
    }

    /// Files whose names the path list cannot store. They take no row.
    pub fn rejected(&self) -> &[DecodeFailure] {
        &self.rejected
    }

    /// Every file that matched the extension filter, dropped and rejected
    /// ones included.
    pub fn eligible(&self) -> usize {
        self.files.len() + self.dropped.len() + self.rejected.len()
    }

    pub fn batch_count(&self) -> usize {
        self.files.len().div_ceil(self.config.batch_size)
    }

    /// Lazily decode and preprocess batches. Each call starts over.
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            loader: self,
            next: 0,
        }
    }
}

/// Iterator returned by [`CorpusLoader::batches`].
pub struct Batches<'a> {
    loader: &'a CorpusLoader,
    next: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let size = self.loader.config.batch_size;
        let start = self.next * size;
        if start >= self.loader.files.len() {
            return None;
        }
        let end = (start + size).min(self.loader.files.len());
        let chunk = &self.loader.files[start..end];
        let transform = &self.loader.transform;

        // Decode in parallel; `collect` on an indexed par_iter keeps input order.
        let decoded: Vec<Result<ImageTensor, String>> = chunk
            .par_iter()
            .map(|path| {
                open_image(path)
                    .map(|img| transform.apply(&img))
                    .map_err(|e| e.to_string())
            })
            .collect();

        let mut batch = Batch {
            index: self.next,
            tensors: Vec::with_capacity(chunk.len()),
            paths: Vec::with_capacity(chunk.len()),
            failures: Vec::new(),
        };
        for (path, result) in chunk.iter().zip(decoded) {
            match result {
                Ok(tensor) => {
                    batch.tensors.push(tensor);
                    batch.paths.push(path.clone());
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping undecodable image");
                    batch.failures.push(DecodeFailure {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }
        debug!(
            batch = batch.index,
            decoded = batch.len(),
            failed = batch.failures.len(),
            "batch ready"
        );

        self.next += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.loader.batch_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}
