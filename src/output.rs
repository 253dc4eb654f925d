//! Post-run discovery of the converter's output.
//!
//! The converter expands the output template itself and never reports the
//! final path, so the newest file with the expected extension is taken as the
//! result. A file left over from an earlier run can win if the converter wrote
//! nothing newer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

/// Returns the most recently modified regular file in `dir` (not recursive)
/// whose extension equals `extension`, ignoring ASCII case.
pub fn find_latest_output(dir: &Path, extension: &str) -> io::Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        debug!(path = %path.display(), ?modified, "output candidate");

        match &newest {
            Some((best, _)) if *best >= modified => {}
            _ => newest = Some((modified, path)),
        }
    }

    Ok(newest.map(|(_, path)| path))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
