use std::{
    io,
    path::{Path, PathBuf},
};

use log::debug;
use walkdir::WalkDir;

use crate::{
    errors::{Error, Result},
    helpers::{is_pattern, wildcard_match},
};

/// Where a dataset's snapshots come from.
///
/// Strings convert to a `Pattern` when they contain `*` or `?`, otherwise to a `Path`.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),

    /// Glob style pattern. Wildcards are honoured in the final path component only.
    Pattern(String),

    /// Explicit list of paths, loaded in the order given
    Paths(Vec<PathBuf>),
}

impl Source {
    /// Resolve this source to the paths to load.
    ///
    /// Pattern matches are sorted lexicographically. A pattern matching nothing fails with
    /// `NoSourceMatch`, an empty list of paths with `NoSources`.
    ///
    pub fn expand(&self) -> Result<Vec<PathBuf>> {
        match self {
            Self::Path(path) => Ok(vec![path.clone()]),
            Self::Pattern(pattern) => {
                let paths = expand_pattern(pattern)?;
                debug!("pattern {pattern} matched {} paths", paths.len());
                if paths.is_empty() {
                    Err(Error::NoSourceMatch(pattern.clone()))
                } else {
                    Ok(paths)
                }
            }
            Self::Paths(paths) => {
                if paths.is_empty() {
                    Err(Error::NoSources)
                } else {
                    Ok(paths.clone())
                }
            }
        }
    }
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    let name = match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name,
        None => return Ok(vec![]),
    };
    // Matches keep the parent as written: `plt*` gives `plt00000`
    let written = path.parent().unwrap_or_else(|| Path::new(""));
    let parent = if written.as_os_str().is_empty() {
        Path::new(".")
    } else {
        written
    };
    if !parent.is_dir() {
        return Ok(vec![]);
    }

    let mut paths = vec![];
    for entry in WalkDir::new(parent).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let matches = entry
            .file_name()
            .to_str()
            .map_or(false, |entry_name| wildcard_match(name, entry_name));
        if matches {
            paths.push(written.join(entry.file_name()));
        }
    }
    paths.sort();

    Ok(paths)
}

impl From<&str> for Source {
    fn from(source: &str) -> Self {
        if is_pattern(source) {
            Self::Pattern(source.to_string())
        } else {
            Self::Path(PathBuf::from(source))
        }
    }
}

impl From<String> for Source {
    fn from(source: String) -> Self {
        Self::from(source.as_str())
    }
}

impl From<&Path> for Source {
    fn from(source: &Path) -> Self {
        Self::Path(source.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(source: PathBuf) -> Self {
        Self::Path(source)
    }
}

impl<P: Into<PathBuf>> From<Vec<P>> for Source {
    fn from(sources: Vec<P>) -> Self {
        Self::Paths(sources.into_iter().map(Into::into).collect())
    }
}
