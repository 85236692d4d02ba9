//! Small filesystem and hashing helpers shared across modules.

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use std::io::Write;
use std::path::Path;

use crate::core::BuildError;

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Write `content` to `path` through a temporary sibling and a rename, so readers
/// never observe a half-written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Not a file path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let mut file = std::fs::File::create(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all().with_context(|| format!("Failed to sync {}", tmp.display()))?;
    drop(file);

    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))
}

/// Append `lines` to a text table, writing `header` first if the file is new.
pub fn append_lines(path: &Path, header: &str, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for appending", path.display()))?;
    let mut buf = String::new();
    if is_new {
        buf.push_str(header);
        buf.push('\n');
    }
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes()).with_context(|| format!("Failed to append to {}", path.display()))
}

/// Require `dir` to be an existing, writable directory.
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    let meta = std::fs::metadata(dir).map_err(|_| {
        BuildError::configuration(format!("directory '{}' does not exist", dir.display()))
    })?;
    if !meta.is_dir() {
        return Err(
            BuildError::configuration(format!("'{}' is not a directory", dir.display())).into()
        );
    }
    let probe = dir.join(format!(".buildprep-write-test-{}", std::process::id()));
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(
            BuildError::configuration(format!("directory '{}' isn't writable", dir.display()))
                .into(),
        ),
    }
}
