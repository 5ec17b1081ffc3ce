//! Package index regeneration.
//!
//! For each architecture:
//!
//! 1. Run the indexer over `pool/`. A failure here aborts before anything is
//!    written, so the previous `Packages` stays in place.
//! 2. Normalise `Filename:` entries to clean repository-relative paths.
//! 3. Atomically replace `Packages`.
//! 4. Compress the freshly renamed `Packages` into `.gz` and `.xz`, each via
//!    its own temp file, so a failed compression keeps the prior archive.

use std::path::{Path, PathBuf};

use serde::Serialize;

use debrepo_core::layout::{tmp_path_for, RepoLayout};

use crate::atomic::{commit_tmp, write_atomic};
use crate::error::SyncError;
use crate::tools::{Compression, Compressor, Indexer};

/// Result of indexing one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    pub arch: String,
    pub packages_path: PathBuf,
    pub package_count: usize,
}

/// Regenerate the index of every architecture, in configured order.
pub fn build_all(
    layout: &RepoLayout,
    architectures: &[String],
    indexer: &dyn Indexer,
    compressor: &dyn Compressor,
) -> Result<Vec<IndexOutcome>, SyncError> {
    architectures
        .iter()
        .map(|arch| build_index(layout, arch, indexer, compressor))
        .collect()
}

/// Regenerate `Packages`, `Packages.gz` and `Packages.xz` for `arch`.
pub fn build_index(
    layout: &RepoLayout,
    arch: &str,
    indexer: &dyn Indexer,
    compressor: &dyn Compressor,
) -> Result<IndexOutcome, SyncError> {
    let raw = indexer.scan(layout.root(), arch)?;
    let index = normalize_index(&raw, layout.root());
    let package_count = count_packages(&index);

    let packages_path = layout.packages_path(arch);
    write_atomic(&packages_path, index.as_bytes())?;
    tracing::info!(
        "indexed {package_count} package(s) for {arch}: {}",
        packages_path.display()
    );

    for format in Compression::all() {
        compress_sibling(compressor, *format, &packages_path)?;
    }

    Ok(IndexOutcome {
        arch: arch.to_string(),
        packages_path,
        package_count,
    })
}

/// `Packages` -> `Packages.<ext>`
pub fn compressed_path(packages_path: &Path, format: Compression) -> PathBuf {
    let name = packages_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(debrepo_core::layout::PACKAGES_FILE);
    packages_path.with_file_name(format!("{name}.{}", format.extension()))
}

fn compress_sibling(
    compressor: &dyn Compressor,
    format: Compression,
    packages_path: &Path,
) -> Result<(), SyncError> {
    let target = compressed_path(packages_path, format);
    let tmp = tmp_path_for(&target);
    if let Err(err) = compressor.compress(format, packages_path, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        tracing::error!("compression to {} failed; keeping previous copy", target.display());
        return Err(err);
    }
    commit_tmp(&tmp, &target)?;
    tracing::debug!("wrote: {}", target.display());
    Ok(())
}

/// Rewrite `Filename:` values so they are relative to the repository root.
///
/// Strips an absolute `repo_root` prefix and any leading `./` markers; all
/// other lines, and the original line terminators, pass through unchanged.
pub fn normalize_index(text: &str, repo_root: &Path) -> String {
    let root = repo_root.to_string_lossy();
    let root = root.trim_end_matches('/');
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let (body, terminator) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        match body.strip_prefix("Filename:") {
            Some(value) => {
                out.push_str("Filename: ");
                out.push_str(&normalize_relative(value.trim(), root));
            }
            None => out.push_str(body),
        }
        out.push_str(terminator);
    }
    out
}

fn normalize_relative<'a>(value: &'a str, root: &str) -> &'a str {
    let mut value = value;
    if !root.is_empty() {
        if let Some(rest) = value.strip_prefix(root) {
            if rest.starts_with('/') {
                value = rest.trim_start_matches('/');
            }
        }
    }
    while let Some(rest) = value.strip_prefix("./") {
        value = rest.trim_start_matches('/');
    }
    value
}

fn count_packages(index: &str) -> usize {
    index
        .lines()
        .filter(|line| line.starts_with("Package:"))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANZA: &str = "Package: hello\nVersion: 1.0\nFilename: ./pool/h/hello_1.0_amd64.deb\nSize: 1024\n\n";

    #[test]
    fn strips_dot_slash_prefix() {
        let out = normalize_index(STANZA, Path::new("/srv/apt"));
        assert!(out.contains("Filename: pool/h/hello_1.0_amd64.deb\n"));
        assert!(!out.contains("./pool"));
    }

    #[test]
    fn strips_absolute_repository_root() {
        let raw = "Package: hello\nFilename: /srv/apt/pool/hello.deb\n";
        let out = normalize_index(raw, Path::new("/srv/apt/"));
        assert_eq!(out, "Package: hello\nFilename: pool/hello.deb\n");
    }

    #[test]
    fn leaves_similarly_named_roots_alone() {
        let raw = "Filename: /srv/apt-old/pool/hello.deb\n";
        let out = normalize_index(raw, Path::new("/srv/apt"));
        assert_eq!(out, raw);
    }

    #[test]
    fn preserves_other_lines_and_missing_final_newline() {
        let raw = "Package: a\nDescription: ./not a path\nFilename: pool/a.deb";
        let out = normalize_index(raw, Path::new("/srv/apt"));
        assert_eq!(out, raw);
    }

    #[test]
    fn counts_stanzas() {
        let two = format!("{STANZA}{STANZA}");
        assert_eq!(count_packages(&two), 2);
        assert_eq!(count_packages(""), 0);
    }

    #[test]
    fn compressed_paths_sit_next_to_packages() {
        let packages = Path::new("/srv/apt/dists/stable/main/binary-amd64/Packages");
        assert_eq!(
            compressed_path(packages, Compression::Xz),
            PathBuf::from("/srv/apt/dists/stable/main/binary-amd64/Packages.xz")
        );
    }
}
