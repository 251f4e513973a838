//! Loading the existing build file.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::LoadError;
use crate::parser;
use crate::types::File;

/// Load the build file at `path`.
///
/// A missing file yields an empty tree anchored to `path`; this is how a new
/// build file starts out. An empty file does too, without invoking the parser.
/// Any other read failure is an [`LoadError::Io`], and malformed content is a
/// [`LoadError::Syntax`].
pub fn load(path: impl AsRef<Path>) -> Result<File, LoadError> {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "build file does not exist; starting empty");
            return Ok(File::empty(path));
        }
        Err(source) => {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if bytes.is_empty() {
        return Ok(File::empty(path));
    }
    Ok(parser::parse_bytes(path, &bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD");
        let file = load(&path).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.path, path);
    }

    #[test]
    fn test_zero_byte_file_is_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD.bazel");
        std::fs::write(&path, "").unwrap();
        let file = load(&path).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.path, path);
    }

    #[test]
    fn test_parses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD");
        std::fs::write(&path, "go_library(name = \"foo\")\n").unwrap();
        let file = load(&path).unwrap();
        assert_eq!(file.rule("foo").map(|r| r.kind().into_owned()).as_deref(), Some("go_library"));
    }

    #[test]
    fn test_syntax_error_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BUILD");
        std::fs::write(&path, "go_library(name = \n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Syntax(_)));
        assert_eq!(err.path(), path);
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        // Reading a directory fails with something other than NotFound.
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().starts_with("failed to read"));
    }
}
