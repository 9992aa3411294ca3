use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Creates a fresh, uniquely named staging directory under `build_root`.
///
/// The directory is never reused: creation fails rather than adopting an
/// existing directory of the same name.
pub fn create_staging_dir(build_root: &Path) -> Result<PathBuf, StageError> {
    std::fs::create_dir_all(build_root).map_err(|e| StageError::Create {
        path: build_root.to_path_buf(),
        source: e,
    })?;

    let staging_dir = build_root.join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir(&staging_dir).map_err(|e| StageError::Create {
        path: staging_dir.clone(),
        source: e,
    })?;

    tracing::debug!(path = %staging_dir.display(), "staging directory created");
    Ok(staging_dir)
}

/// Path the `git archive` output for `staging_dir` is spooled to before unpacking.
pub fn archive_path(staging_dir: &Path) -> PathBuf {
    staging_dir.with_extension("tar")
}

/// Unpacks the tar file at `archive` into `dest`, reading it as a stream.
pub fn unpack_archive_file(archive: &Path, dest: &Path) -> Result<usize, StageError> {
    let file = File::open(archive).map_err(|e| StageError::Open {
        path: archive.to_path_buf(),
        source: e,
    })?;
    unpack_archive(BufReader::new(file), dest)
}

/// Unpacks a `git archive` tar stream into `dest`. Returns the number of
/// tree entries written.
///
/// Modification times are not restored, so every file looks freshly
/// checked out to the build tools.
pub fn unpack_archive<R: Read>(reader: R, dest: &Path) -> Result<usize, StageError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_mtime(false);

    let entries = archive.entries().map_err(|e| StageError::Unpack {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut unpacked = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| StageError::Unpack {
            path: dest.to_path_buf(),
            source: e,
        })?;

        // git archive writes the commit id as a pax global header
        let kind = entry.header().entry_type();
        if kind.is_pax_global_extensions() || kind.is_pax_local_extensions() {
            continue;
        }

        let written = entry.unpack_in(dest).map_err(|e| StageError::Unpack {
            path: dest.to_path_buf(),
            source: e,
        })?;
        if written {
            unpacked += 1;
        } else {
            tracing::warn!("skipped archive entry outside the staging directory");
        }
    }

    if unpacked == 0 {
        return Err(StageError::EmptyTree {
            path: dest.to_path_buf(),
        });
    }

    Ok(unpacked)
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to create staging directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open source archive {path}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to unpack source archive into {path}")]
    Unpack {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("source archive produced no files in {path}")]
    EmptyTree { path: PathBuf },
}
