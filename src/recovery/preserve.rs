use crate::capture::stager::{frame_file_name, frame_path};
use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::fsutil::{copy_durable, ensure_dir, remove_dir_quiet};
use std::path::{Path, PathBuf};

/// Copy raw frames to removable storage as `<recovery_dir>/<prefix>_<stamp>_<pid>/`.
///
/// The parent of `recovery_dir` is the storage mount point and must already exist; nothing is
/// created on the root filesystem when the stick is absent. Returns the new directory.
pub fn preserve_frames(
    frame_dir: &Path,
    frame_count: u32,
    recovery_dir: &Path,
    prefix: &str,
    stamp: &str,
    pid: u32,
) -> LapseResult<PathBuf> {
    if frame_count == 0 {
        return Err(LapseError::NoData);
    }
    if let Some(mount) = recovery_dir.parent()
        && !mount.as_os_str().is_empty()
        && !mount.is_dir()
    {
        return Err(LapseError::config(format!(
            "removable storage '{}' is not mounted",
            mount.display()
        )));
    }

    let dest = recovery_dir.join(format!("{prefix}_{stamp}_{pid}"));
    ensure_dir(&dest)?;

    let bytes = match copy_frames(frame_dir, frame_count, &dest) {
        Ok(bytes) => bytes,
        Err(e) => {
            // Never leave a partial copy on the stick.
            remove_dir_quiet(&dest);
            return Err(e);
        }
    };
    tracing::info!(
        dest = %dest.display(),
        frames = frame_count,
        bytes,
        "preserved raw frames"
    );
    Ok(dest)
}

fn copy_frames(frame_dir: &Path, frame_count: u32, dest: &Path) -> LapseResult<u64> {
    let mut bytes = 0u64;
    for index in 0..frame_count {
        let dst = dest.join(frame_file_name(index));
        bytes += copy_durable(&frame_path(frame_dir, index), &dst)?;
    }
    Ok(bytes)
}

#[cfg(test)]
#[path = "../../tests/unit/recovery/preserve.rs"]
mod tests;
