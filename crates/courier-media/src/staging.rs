use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use courier_core::types::{Attachment, MediaRef};

use crate::error::{MediaError, Result};

/// An uploaded file before staging: name and content type as supplied by the
/// caller, bytes already read off the wire.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Filesystem staging area, one subdirectory per job key.
#[derive(Debug, Clone)]
pub struct MediaStaging {
    root: PathBuf,
}

impl MediaStaging {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A staging key for a job whose id is not assigned yet.
    pub fn temp_key() -> String {
        format!("tmp-{}", Uuid::new_v4())
    }

    fn dir_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Write `uploads` under `key`, returning one [`MediaRef`] per file.
    /// File names are flattened to their final path component.
    pub fn stage(&self, uploads: &[Upload], key: &str) -> Result<Vec<MediaRef>> {
        let dir = self.dir_for(key);
        fs::create_dir_all(&dir)?;

        let mut refs = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = sanitize_name(&upload.file_name);
            let path = dir.join(&name);
            fs::write(&path, &upload.bytes)?;
            debug!(key, file = %name, bytes = upload.bytes.len(), "staged media file");
            refs.push(MediaRef {
                original_name: upload.file_name.clone(),
                storage_path: path.to_string_lossy().into_owned(),
                size: upload.bytes.len() as u64,
                content_type: upload.content_type.clone(),
            });
        }
        Ok(refs)
    }

    /// Move a temp-keyed staging directory to its final job id, rewriting the
    /// stored paths. This is the filesystem half of the two-phase commit; the
    /// caller persists the returned refs as the metadata half. A rename
    /// failure must fail the job.
    pub fn commit(&self, refs: &[MediaRef], temp_key: &str, job_id: i64) -> Result<Vec<MediaRef>> {
        let from = self.dir_for(temp_key);
        let final_key = job_id.to_string();
        let to = self.dir_for(&final_key);

        fs::rename(&from, &to).map_err(|source| MediaError::CommitFailed {
            key: temp_key.to_string(),
            source,
        })?;

        let committed = refs
            .iter()
            .map(|r| {
                let file = Path::new(&r.storage_path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| MediaError::InvalidPath(r.storage_path.clone()))?;
                Ok(MediaRef {
                    storage_path: to.join(file).to_string_lossy().into_owned(),
                    ..r.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(temp_key, job_id, files = committed.len(), "staging committed");
        Ok(committed)
    }

    /// Read staged files back as in-memory attachments for the send call.
    pub fn load(&self, refs: &[MediaRef]) -> Result<Vec<Attachment>> {
        refs.iter()
            .map(|r| {
                let bytes = fs::read(&r.storage_path)?;
                Ok(Attachment {
                    file_name: r.original_name.clone(),
                    content_type: r.content_type.clone(),
                    bytes,
                })
            })
            .collect()
    }

    /// Delete staged files and, when emptied, their directory. Idempotent:
    /// files already gone are not an error, and reclaiming twice is a no-op.
    pub fn reclaim(&self, refs: &[MediaRef]) {
        let mut dirs = Vec::new();
        for r in refs {
            let path = Path::new(&r.storage_path);
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %r.storage_path, "reclaimed media file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %r.storage_path, error = %e, "failed to reclaim media file"),
            }
            if let Some(parent) = path.parent() {
                if !dirs.contains(&parent.to_path_buf()) {
                    dirs.push(parent.to_path_buf());
                }
            }
        }
        for dir in dirs {
            // Only removes empty directories; shared or non-empty dirs stay.
            let _ = fs::remove_dir(&dir);
        }
    }
}

/// Keep only the final path component and drop anything that could traverse
/// out of the staging directory.
fn sanitize_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .trim_matches('.');
    if base.is_empty() {
        "file".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn stage_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let staging = MediaStaging::new(dir.path());

        let refs = staging
            .stage(&[upload("a.png", b"aaa"), upload("b.png", b"bbbb")], "42")
            .unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].size, 3);

        let attachments = staging.load(&refs).unwrap();
        assert_eq!(attachments[1].bytes, b"bbbb");
        assert_eq!(attachments[0].file_name, "a.png");
    }

    #[test]
    fn commit_renames_dir_and_rewrites_paths() {
        let dir = tempfile::tempdir().unwrap();
        let staging = MediaStaging::new(dir.path());

        let temp = MediaStaging::temp_key();
        let refs = staging.stage(&[upload("pic.png", b"data")], &temp).unwrap();
        assert!(refs[0].storage_path.contains(&temp));

        let committed = staging.commit(&refs, &temp, 7).unwrap();
        assert!(committed[0].storage_path.contains("/7/"));
        assert!(!dir.path().join(&temp).exists());
        assert!(Path::new(&committed[0].storage_path).exists());
    }

    #[test]
    fn commit_of_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let staging = MediaStaging::new(dir.path());
        let err = staging.commit(&[], "tmp-nope", 9).unwrap_err();
        assert!(matches!(err, MediaError::CommitFailed { .. }));
    }

    #[test]
    fn reclaim_is_idempotent_and_removes_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let staging = MediaStaging::new(dir.path());

        let refs = staging
            .stage(&[upload("x.png", b"x"), upload("y.png", b"y")], "11")
            .unwrap();
        let job_dir = dir.path().join("11");
        assert!(job_dir.exists());

        staging.reclaim(&refs);
        assert!(!Path::new(&refs[0].storage_path).exists());
        assert!(!job_dir.exists());

        // Second reclaim is a no-op, not an error.
        staging.reclaim(&refs);
    }

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("dir\\evil.png"), "evil.png");
        assert_eq!(sanitize_name("..."), "file");
        assert_eq!(sanitize_name("ok.png"), "ok.png");
    }
}
