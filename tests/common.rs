#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use report_converter::db::MemoryTemplateStore;
use report_converter::{AppConfig, AppState};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Copies the input to `<outdir>/<stem>.pdf`, like a converter that succeeded.
pub const COPYING_STUB: &str = r#"name=$(basename "$6")
cp "$6" "$5/${name%.*}.pdf""#;

/// Build a minimal docx whose body is `body`.
pub fn docx_with_body(body: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<Types/>").unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    write!(
        writer,
        "<w:document><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
        body
    )
    .unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn read_document_xml(bytes: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name("word/document.xml").unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

/// Write an executable `/bin/sh` script.
#[cfg(unix)]
pub fn stub_converter(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Configuration rooted in `dir`, optionally pointing at a converter.
pub fn test_config(dir: &Path, converter: Option<PathBuf>) -> AppConfig {
    AppConfig {
        storage_dir: dir.join("storage"),
        converter_path: converter,
        ..AppConfig::default()
    }
}

pub fn test_state(dir: &Path, converter: Option<PathBuf>) -> AppState {
    AppState::with_store(
        test_config(dir, converter),
        Arc::new(MemoryTemplateStore::new()),
    )
}

/// Files left in a directory; a missing directory counts as empty.
pub fn entries_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}
