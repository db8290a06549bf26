//! Canonical filenames and text-content detection for ingested posts.
//!
//! A post is identified inside a user's namespace by its canonical filename:
//! the uploaded name with any directories and extension stripped and `.txt`
//! appended. Content is only accepted when it decodes as UTF-8 and contains
//! no control characters besides whitespace.

use std::path::Path;

use thiserror::Error;

pub const CANONICAL_EXTENSION: &str = "txt";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename `{input}` has no usable stem")]
    EmptyStem { input: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("file must be a text file: content is not valid UTF-8")]
    InvalidUtf8,
    #[error("file must be a text file: found control character U+{codepoint:04X}")]
    ControlCharacter { codepoint: u32 },
    #[error("file must be a text file: `{path}` looks like {mime}")]
    UnsupportedType { path: String, mime: String },
}

/// Derive the canonical filename for an uploaded file name.
pub fn sanitize_file_ext(name: &str) -> Result<String, FilenameError> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();

    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(index) => &base[..index],
    };

    if stem.is_empty() || stem == "." {
        return Err(FilenameError::EmptyStem {
            input: name.to_string(),
        });
    }

    Ok(format!("{stem}.{CANONICAL_EXTENSION}"))
}

/// Decode raw bytes as post text, rejecting anything that is not plain text.
pub fn decode_text(bytes: Vec<u8>) -> Result<String, ContentError> {
    let text = String::from_utf8(bytes).map_err(|_| ContentError::InvalidUtf8)?;
    if let Some(ch) = text
        .chars()
        .find(|ch| ch.is_control() && !matches!(ch, '\t' | '\n' | '\r'))
    {
        return Err(ContentError::ControlCharacter {
            codepoint: ch as u32,
        });
    }
    Ok(text)
}

/// Reject paths whose extension maps to a non-text MIME type.
///
/// Paths without an extension, or with one `mime_guess` does not know, are
/// judged by their content alone.
pub fn ensure_text_path(path: &Path) -> Result<(), ContentError> {
    let Some(mime) = mime_guess::from_path(path).first() else {
        return Ok(());
    };

    if mime.type_() == mime_guess::mime::TEXT {
        return Ok(());
    }

    Err(ContentError::UnsupportedType {
        path: path.display().to_string(),
        mime: mime.essence_str().to_string(),
    })
}
