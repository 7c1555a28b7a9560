//! Repository declaration parsing
//!
//! Declaration files are apt-style `*.list` files. Every line of the form
//! `deb <mirror-url> <dist-path> [components...]` yields one
//! [`RepoDeclaration`]; everything else is ignored.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// File extension that marks a declaration file
pub const DECLARATION_EXTENSION: &str = "list";

/// Sentinel distribution path meaning "no distribution subpath"
pub const FLAT_DIST: &str = "./";

/// One `deb` entry parsed from a declaration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDeclaration {
    /// Name of the file this entry came from (e.g. "foo.list")
    pub source_filename: String,

    /// Mirror base URL, e.g. "http://apt.example.com/"
    pub mirror_url: String,

    /// Distribution path relative to the mirror, or "./"
    pub dist_path: String,
}

impl RepoDeclaration {
    pub fn new(
        source_filename: impl Into<String>,
        mirror_url: impl Into<String>,
        dist_path: impl Into<String>,
    ) -> Self {
        Self {
            source_filename: source_filename.into(),
            mirror_url: mirror_url.into(),
            dist_path: dist_path.into(),
        }
    }

    /// Third `/`-delimited segment of the mirror URL; empty when absent
    pub fn hostname(&self) -> &str {
        self.mirror_url.split('/').nth(2).unwrap_or("")
    }

    /// Whether the declaration uses the flat "./" layout
    pub fn is_flat(&self) -> bool {
        self.dist_path == FLAT_DIST
    }
}

/// Parse a single line; `None` for blank, non-`deb` or truncated lines
pub fn parse_line(source_filename: &str, line: &str) -> Option<RepoDeclaration> {
    let mut tokens = line.split_whitespace();

    if tokens.next()? != "deb" {
        return None;
    }

    let mirror_url = tokens.next()?;
    let dist_path = tokens.next()?;

    Some(RepoDeclaration::new(source_filename, mirror_url, dist_path))
}

/// List declaration files in `dir`, minus `exclusions`, sorted by name
pub fn list_declaration_files(dir: &Path, exclusions: &[String]) -> Result<Vec<String>> {
    if !dir.is_dir() {
        bail!("Repository directory {} is missing", dir.display());
    }

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut files = Vec::new();

    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let has_extension = path
            .extension()
            .map(|ext| ext == DECLARATION_EXTENSION)
            .unwrap_or(false);
        if !has_extension {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!("Skipping non UTF-8 file name: {}", path.display());
            continue;
        };

        if exclusions.iter().any(|excluded| excluded == name) {
            tracing::debug!("Excluding {}", name);
            continue;
        }

        files.push(name.to_string());
    }

    files.sort();
    Ok(files)
}

/// Parse every declaration from `filenames` inside `dir`, in file-then-line order
pub fn parse_declarations(dir: &Path, filenames: &[String]) -> Result<Vec<RepoDeclaration>> {
    let mut declarations = Vec::new();

    for filename in filenames {
        let path = dir.join(filename);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read declaration file: {}", path.display()))?;
        // Legacy-encoded comments decode lossily
        let content = String::from_utf8_lossy(&bytes);

        let before = declarations.len();
        declarations.extend(
            content
                .lines()
                .filter_map(|line| parse_line(filename, line)),
        );

        tracing::debug!(
            "Parsed {} declarations from {}",
            declarations.len() - before,
            filename
        );
    }

    Ok(declarations)
}
