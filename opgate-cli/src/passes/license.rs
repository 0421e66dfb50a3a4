//! In-process license header check
//!
//! Every `*.go` file under the source roots must carry one of the markers
//! within its first few lines. `vendor/` trees are never inspected.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

const SOURCE_EXTENSION: &str = "go";
const VENDOR_DIR: &str = "vendor";

/// Return the files (relative to `root`, sorted) whose header lacks every marker.
///
/// Source directories that do not exist are skipped. This walks the tree
/// synchronously; async callers should use `spawn_blocking`.
pub fn find_missing_headers(
    root: &Path,
    source_dirs: &[String],
    header_lines: usize,
    markers: &[String],
) -> std::io::Result<Vec<String>> {
    let mut missing = Vec::new();

    for dir in source_dirs {
        let start = root.join(dir);
        if !start.is_dir() {
            debug!(dir = %start.display(), "source directory absent, skipping license check");
            continue;
        }
        for file in collect_sources(&start)? {
            if !has_marker(&file, header_lines, markers)? {
                let relative = file.strip_prefix(root).unwrap_or(&file);
                missing.push(relative.display().to_string());
            }
        }
    }

    missing.sort();
    missing.dedup();
    Ok(missing)
}

fn collect_sources(start: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![start.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                if entry.file_name() != VENDOR_DIR {
                    pending.push(path);
                }
            } else if file_type.is_file()
                && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
            {
                files.push(path);
            }
        }
    }

    Ok(files)
}

fn has_marker(path: &Path, header_lines: usize, markers: &[String]) -> std::io::Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.split(b'\n').take(header_lines) {
        let line = line?;
        let text = String::from_utf8_lossy(&line);
        if markers.iter().any(|m| text.contains(m.as_str())) {
            return Ok(true);
        }
    }
    Ok(false)
}
