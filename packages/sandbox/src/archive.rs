// ABOUTME: Tar staging helpers for moving single files in and out of containers
// ABOUTME: Every transfer goes through a scratch directory that is removed when dropped

use crate::error::{GatewayError, Result};
use std::fs;
use std::path::{Component, Path};
use tar::{Archive, Builder};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = "runbox-";

/// Create a fresh scratch directory under the staging area.
///
/// The directory and everything in it is deleted when the returned guard
/// drops, whichever way the caller exits.
pub fn scratch_dir(staging: &Path) -> Result<TempDir> {
    fs::create_dir_all(staging)?;
    Ok(tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(staging)?)
}

/// Split an absolute container path into its parent directory and basename
pub fn split_container_path(path: &str) -> Result<(String, String)> {
    if !path.starts_with('/') {
        return Err(GatewayError::InvalidPath(format!(
            "{} (container paths must be absolute)",
            path
        )));
    }
    if path.ends_with('/') {
        return Err(GatewayError::InvalidPath(format!(
            "{} (expected a file path)",
            path
        )));
    }

    let (dir, name) = match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((dir, name)) => (dir, name),
        None => return Err(GatewayError::InvalidPath(path.to_string())),
    };

    if name.is_empty() || name == "." || name == ".." {
        return Err(GatewayError::InvalidPath(path.to_string()));
    }

    Ok((dir.to_string(), name.to_string()))
}

/// Write `content` to `scratch/name` and wrap it in a single-entry tar archive
pub fn pack_file(scratch: &Path, name: &str, content: &[u8]) -> Result<Vec<u8>> {
    let staged = scratch.join(name);
    fs::write(&staged, content)?;

    let mut builder = Builder::new(Vec::new());
    let mut file = fs::File::open(&staged)?;
    builder.append_file(name, &mut file)?;

    Ok(builder.into_inner()?)
}

/// Unpack the file called `name` from an archive into `scratch` and read it back.
///
/// Only a regular file entry is extracted. Links and directories in the
/// archive are never written to the host, so a symlink inside the container
/// cannot point the read at a host file. Fails with
/// [`GatewayError::FileNotFound`] when no such entry exists.
pub fn unpack_file(archive: &[u8], scratch: &Path, name: &str) -> Result<Vec<u8>> {
    let mut archive = Archive::new(archive);

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() || !names_file(&entry.path()?, name) {
            continue;
        }

        entry.unpack_in(scratch)?;
        let extracted = scratch.join(name);
        if !fs::symlink_metadata(&extracted)?.file_type().is_file() {
            break;
        }
        return Ok(fs::read(extracted)?);
    }

    Err(GatewayError::FileNotFound(name.to_string()))
}

/// Whether an archive entry path is exactly `name`, ignoring a leading `./`
fn names_file(entry_path: &Path, name: &str) -> bool {
    let mut parts = entry_path
        .components()
        .filter(|c| !matches!(c, Component::CurDir));
    matches!(
        (parts.next(), parts.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}
