use crate::foundation::error::{IoResultExt, LapseError, LapseResult};
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::Path;

/// Create `path` (and parents) unless it already exists as a directory.
pub fn ensure_dir(path: &Path) -> LapseResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(LapseError::config(format!(
            "'{}' exists and is not a directory",
            path.display()
        ))),
        Err(_) => fs::create_dir_all(path)
            .io_context(|| format!("create directory '{}'", path.display())),
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> LapseResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Remove a directory tree, logging instead of failing.
pub fn remove_dir_quiet(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!(dir = %path.display(), "removed directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %path.display(), error = %e, "failed to remove directory"),
    }
}

/// Write `bytes` to `dst` through a sibling `.part` file that is fsynced and renamed into place.
pub fn write_durable(dst: &Path, bytes: &[u8]) -> LapseResult<()> {
    let mut part = dst.as_os_str().to_owned();
    part.push(".part");
    let part = Path::new(&part);

    let res = (|| -> LapseResult<()> {
        let mut f = File::create(part).io_context(|| format!("create '{}'", part.display()))?;
        f.write_all(bytes)
            .io_context(|| format!("write '{}'", part.display()))?;
        f.sync_all()
            .io_context(|| format!("sync '{}'", part.display()))?;
        fs::rename(part, dst).io_context(|| format!("rename into '{}'", dst.display()))
    })();
    if res.is_err() {
        let _ = fs::remove_file(part);
    }
    res
}

/// Copy `src` to `dst` and flush the copy to disk.
pub fn copy_durable(src: &Path, dst: &Path) -> LapseResult<u64> {
    let res = (|| -> LapseResult<u64> {
        let mut reader = File::open(src).io_context(|| format!("open '{}'", src.display()))?;
        let mut writer = File::create(dst).io_context(|| format!("create '{}'", dst.display()))?;
        let n = io::copy(&mut reader, &mut writer).io_context(|| {
            format!("copy '{}' -> '{}'", src.display(), dst.display())
        })?;
        writer
            .sync_all()
            .io_context(|| format!("sync '{}'", dst.display()))?;
        Ok(n)
    })();
    if res.is_err() {
        let _ = fs::remove_file(dst);
    }
    res
}

/// Move a file, falling back to copy + delete when `rename` crosses filesystems.
pub fn move_file(src: &Path, dst: &Path) -> LapseResult<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %e,
                "rename failed, falling back to copy"
            );
            copy_durable(src, dst)?;
            fs::remove_file(src).io_context(|| format!("remove '{}'", src.display()))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/fsutil.rs"]
mod tests;
