//! Converter binary resolution.

use std::path::{Path, PathBuf};

/// Where LibreOffice is usually installed on unix hosts and containers.
const DEFAULT_CANDIDATES: &[&str] = &[
    "/usr/bin/soffice",
    "/usr/local/bin/soffice",
    "/opt/libreoffice/program/soffice",
];

const WINDOWS_CANDIDATES: &[&str] = &[
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];

/// Ordered candidate list for the current platform.
///
/// An explicitly configured path is probed first.
pub fn default_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    candidates.extend(DEFAULT_CANDIDATES.iter().map(PathBuf::from));
    if cfg!(windows) {
        candidates.extend(WINDOWS_CANDIDATES.iter().map(PathBuf::from));
    }
    candidates
}

/// Pick the first candidate for which `exists` holds.
pub fn resolve_converter<F>(candidates: &[PathBuf], exists: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    candidates.iter().find(|path| exists(path.as_path())).cloned()
}
