//! Word-processor container handling.
//!
//! A `.docx` file is a ZIP archive. Placeholders live in the XML text of the
//! main document part and, optionally, the header and footer parts. Every
//! other entry is copied through untouched.

use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::substitution::{find_placeholders, substitute};
use super::{PipelineError, Substitutions};

pub const MAIN_PART: &str = "word/document.xml";

fn is_text_part(name: &str) -> bool {
    if name == MAIN_PART {
        return true;
    }
    match name.strip_prefix("word/") {
        Some(rest) => {
            (rest.starts_with("header") || rest.starts_with("footer")) && rest.ends_with(".xml")
        }
        None => false,
    }
}

/// Escape the five XML special characters.
pub fn escape_xml_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn malformed(reason: impl Into<String>) -> PipelineError {
    PipelineError::MalformedDocument {
        reason: reason.into(),
    }
}

/// An in-memory docx whose text parts can be rewritten.
pub struct DocxDocument {
    raw: Vec<u8>,
    parts: Vec<(String, String)>,
}

impl DocxDocument {
    /// Read a template from disk.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PipelineError::TemplateNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PipelineError::TemplateUnreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_bytes(raw)
    }

    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, PipelineError> {
        let mut archive =
            ZipArchive::new(Cursor::new(raw.as_slice())).map_err(|e| malformed(e.to_string()))?;

        let mut parts = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| malformed(e.to_string()))?;
            let name = entry.name().to_string();
            if !is_text_part(&name) {
                continue;
            }
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| malformed(format!("{name}: {e}")))?;
            parts.push((name, text));
        }

        if !parts.iter().any(|(name, _)| name == MAIN_PART) {
            return Err(malformed(format!("missing {MAIN_PART}")));
        }

        Ok(Self { raw, parts })
    }

    /// Text of the main document part.
    pub fn content(&self) -> &str {
        self.parts
            .iter()
            .find(|(name, _)| name == MAIN_PART)
            .map(|(_, text)| text.as_str())
            .unwrap_or_default()
    }

    /// Apply substitution to every text part. Values are XML-escaped first so
    /// they land in the document as text, never as markup.
    pub fn substitute(&mut self, values: &Substitutions) {
        let escaped: Substitutions = values
            .iter()
            .map(|(key, value)| (key.clone(), escape_xml_text(value)))
            .collect();
        for (_, text) in self.parts.iter_mut() {
            *text = substitute(text, &escaped);
        }
    }

    /// Placeholders left in any text part.
    pub fn unresolved(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (_, text) in &self.parts {
            for name in find_placeholders(text) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Serialize back into a docx container.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut archive = ZipArchive::new(Cursor::new(self.raw.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.raw.len())));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();
            match self.parts.iter().find(|(part, _)| *part == name) {
                Some((_, text)) => {
                    writer.start_file(name, options)?;
                    writer.write_all(text.as_bytes())?;
                }
                None => writer.raw_copy_file(entry)?,
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Write the container to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), PipelineError> {
        let staging = |source| PipelineError::Staging {
            path: path.to_path_buf(),
            source,
        };
        let bytes = self.to_bytes().map_err(staging)?;
        std::fs::write(path, bytes).map_err(staging)
    }
}
