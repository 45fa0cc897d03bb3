//! Locating and loading classes from a class path directory.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::parser::{parse_class, ParseError};
use crate::program::Class;

/// File extension of textual class files.
pub const CLASS_FILE_EXTENSION: &str = "jir";

#[derive(Debug)]
pub enum LoadError {
    /// No class file at the expected location.
    NotFound(PathBuf),
    /// File I/O error.
    Io(PathBuf, io::Error),
    /// The class file does not parse.
    Parse(PathBuf, ParseError),
    /// The file declares a different class than requested.
    NameMismatch { expected: String, found: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(path) => write!(f, "class file not found: {}", path.display()),
            LoadError::Io(path, e) => write!(f, "I/O error reading {}: {}", path.display(), e),
            LoadError::Parse(path, e) => write!(f, "{}: {}", path.display(), e),
            LoadError::NameMismatch { expected, found } => {
                write!(f, "expected class {}, file declares {}", expected, found)
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(_, e) => Some(e),
            LoadError::Parse(_, e) => Some(e),
            _ => None,
        }
    }
}

/// `<classpath>/a/b/Name.jir` for the class `a.b.Name`.
pub fn class_file(classpath: &Path, class_name: &str) -> PathBuf {
    let mut path = classpath.to_path_buf();
    path.extend(class_name.split('.'));
    path.set_extension(CLASS_FILE_EXTENSION);
    path
}

/// Loads and parses the class `class_name` from `classpath`.
pub fn load_class(classpath: &Path, class_name: &str) -> Result<Class, LoadError> {
    let path = class_file(classpath, class_name);
    log::debug!("Loading {} from {}", class_name, path.display());

    let source = fs::read_to_string(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.clone()),
        _ => LoadError::Io(path.clone(), e),
    })?;
    let class = parse_class(&source).map_err(|e| LoadError::Parse(path.clone(), e))?;

    if class.name != class_name {
        return Err(LoadError::NameMismatch {
            expected: class_name.to_string(),
            found: class.name,
        });
    }
    Ok(class)
}
