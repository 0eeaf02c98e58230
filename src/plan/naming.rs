use std::path::{Path, PathBuf};

/// Final video and thumbnail locations for one encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPaths {
    pub video: PathBuf,
    pub thumbnail: PathBuf,
}

/// How an encode's outputs are named.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputName {
    /// `<base>_<seq:02>` for a live session.
    Session { base_name: String, sequence: u32 },
    /// `recovered_<stamp>` for an orphan without session context.
    Recovered { stem: String },
}

impl OutputName {
    pub fn stem(&self) -> String {
        match self {
            Self::Session {
                base_name,
                sequence,
            } => format!("{base_name}_{sequence:02}"),
            Self::Recovered { stem } => stem.clone(),
        }
    }

    /// Paths for an encode of `frame_count` frames into `output_dir`.
    pub fn paths(&self, output_dir: &Path, frame_count: u32) -> OutputPaths {
        let stem = self.stem();
        OutputPaths {
            video: output_dir.join(format!("{stem}.mp4")),
            thumbnail: output_dir.join(format!("{stem}_{frame_count}.jpg")),
        }
    }
}

/// Next free sequence number for `base_name` in `output_dir`.
///
/// Looks at every entry starting with `<base_name>_` and parses the leading digits that follow
/// (`job_03.mp4` and `job_03_120.jpg` both count as 3). Returns 1 when nothing matches or the
/// directory does not exist.
pub fn next_sequence(base_name: &str, output_dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return 1;
    };
    let prefix = format!("{base_name}_");

    let max = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter_map(|name| name.strip_prefix(&prefix).map(leading_number))
        .max()
        .unwrap_or(0);
    max.saturating_add(1)
}

/// Session output paths, `<dir>/<base>_<seq:02>.mp4` and `<dir>/<base>_<seq:02>_<n>.jpg`.
pub fn output_paths(
    output_dir: &Path,
    base_name: &str,
    sequence: u32,
    frame_count: u32,
) -> OutputPaths {
    OutputName::Session {
        base_name: base_name.to_string(),
        sequence,
    }
    .paths(output_dir, frame_count)
}

/// A `recovered_<stamp>` name that does not collide with an existing video in `output_dir`.
pub fn recovered_name(output_dir: &Path, stamp: &str) -> OutputName {
    let base = format!("recovered_{stamp}");
    let mut stem = base.clone();
    let mut n = 2u32;
    while output_dir.join(format!("{stem}.mp4")).exists() {
        stem = format!("{base}_{n}");
        n += 1;
    }
    OutputName::Recovered { stem }
}

/// Recovered-video paths; a `_<n>` suffix keeps an existing video from being overwritten.
pub fn recovered_paths(output_dir: &Path, stamp: &str, frame_count: u32) -> OutputPaths {
    recovered_name(output_dir, stamp).paths(output_dir, frame_count)
}

/// Per-process frame directory, `<temp_base>_<pid>`.
pub fn frame_dir(temp_base: &Path, pid: u32) -> PathBuf {
    let mut name = temp_base.as_os_str().to_owned();
    name.push(format!("_{pid}"));
    PathBuf::from(name)
}

/// Owner pid of a sibling frame directory, if `candidate` is named `<temp_base>_<digits>`.
pub fn frame_dir_pid(temp_base: &Path, candidate: &Path) -> Option<u32> {
    if candidate.parent() != temp_base.parent() {
        return None;
    }
    let prefix = format!("{}_", temp_base.file_name()?.to_str()?);
    let rest = candidate.file_name()?.to_str()?.strip_prefix(&prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Wall-clock stamp used for recovered videos and preserved-frame directories.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn leading_number(s: &str) -> u32 {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
#[path = "../../tests/unit/plan/naming.rs"]
mod tests;
