//! Checksum manifests for the Release descriptor.
//!
//! One [`ChecksumBlock`] per algorithm, one entry per regular file under
//! `dists/<suite>/`. Traversal is sorted by file name so unchanged input
//! always yields byte-identical blocks. Paths are relative to the suite
//! directory, the directory the Release file lives in.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use md5::Md5;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use walkdir::WalkDir;

use debrepo_core::layout::{is_release_artifact, TMP_SUFFIX};
use debrepo_core::HashAlgorithm;

use crate::error::{io_err, SyncError};

/// `<digest> <size> <relative-path>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub digest: String,
    pub size: u64,
    pub path: String,
}

/// All entries for one algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumBlock {
    pub algorithm: HashAlgorithm,
    pub entries: Vec<ManifestEntry>,
}

impl ChecksumBlock {
    /// Release-file rendering: a `<Label>:` line, then entries indented by one space.
    pub fn render(&self) -> String {
        let mut out = format!("{}:\n", self.algorithm.release_label());
        for entry in &self.entries {
            out.push_str(&format!(" {} {} {}\n", entry.digest, entry.size, entry.path));
        }
        out
    }
}

/// Build one block per algorithm, in the order given.
pub fn build_blocks(
    suite_dir: &Path,
    algorithms: &[HashAlgorithm],
) -> Result<Vec<ChecksumBlock>, SyncError> {
    let files = indexed_files(suite_dir)?;
    algorithms
        .iter()
        .map(|algorithm| {
            manifest_for(&files, *algorithm, |path| digest_file(*algorithm, path))
        })
        .collect()
}

/// Build the block for `algorithm` using a caller-supplied digest function.
pub fn build_manifest<F>(
    suite_dir: &Path,
    algorithm: HashAlgorithm,
    digest: F,
) -> Result<ChecksumBlock, SyncError>
where
    F: Fn(&Path) -> Result<(String, u64), SyncError>,
{
    let files = indexed_files(suite_dir)?;
    manifest_for(&files, algorithm, digest)
}

fn manifest_for<F>(
    files: &[(PathBuf, String)],
    algorithm: HashAlgorithm,
    digest: F,
) -> Result<ChecksumBlock, SyncError>
where
    F: Fn(&Path) -> Result<(String, u64), SyncError>,
{
    let mut entries = Vec::with_capacity(files.len());
    for (path, relative) in files {
        let (digest, size) = digest(path)?;
        entries.push(ManifestEntry {
            digest,
            size,
            path: relative.clone(),
        });
    }
    Ok(ChecksumBlock { algorithm, entries })
}

/// Regular files under `suite_dir`, sorted, paired with their relative path.
///
/// The top-level Release descriptor and its signatures are skipped (they
/// cannot describe themselves), as are in-flight temp files anywhere.
pub fn indexed_files(suite_dir: &Path) -> Result<Vec<(PathBuf, String)>, SyncError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(suite_dir)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| SyncError::Walk {
            path: suite_dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(TMP_SUFFIX) || (entry.depth() == 1 && is_release_artifact(&name)) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(suite_dir) else {
            continue;
        };
        files.push((entry.path().to_path_buf(), relative_string(relative)));
    }
    Ok(files)
}

/// Hex digest and byte size of the file at `path`.
pub fn digest_file(algorithm: HashAlgorithm, path: &Path) -> Result<(String, u64), SyncError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let result = match algorithm {
        HashAlgorithm::Md5 => digest_reader::<Md5>(file),
        HashAlgorithm::Sha1 => digest_reader::<Sha1>(file),
        HashAlgorithm::Sha256 => digest_reader::<Sha256>(file),
        HashAlgorithm::Sha512 => digest_reader::<Sha512>(file),
    };
    result.map_err(|e| io_err(path, e))
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<(String, u64)> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), size))
}

fn relative_string(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn known_digests_of_empty_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let (md5, size) = digest_file(HashAlgorithm::Md5, &path).unwrap();
        assert_eq!(md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(size, 0);
        let (sha1, _) = digest_file(HashAlgorithm::Sha1, &path).unwrap();
        assert_eq!(sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        let (sha256, _) = digest_file(HashAlgorithm::Sha256, &path).unwrap();
        assert_eq!(
            sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn render_indents_entries_by_one_space() {
        let block = ChecksumBlock {
            algorithm: HashAlgorithm::Sha256,
            entries: vec![ManifestEntry {
                digest: "abc".to_string(),
                size: 12,
                path: "main/binary-amd64/Packages".to_string(),
            }],
        };
        assert_eq!(block.render(), "SHA256:\n abc 12 main/binary-amd64/Packages\n");
    }

    #[test]
    fn nested_release_files_are_kept_but_top_level_skipped() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("main").join("binary-amd64");
        fs::create_dir_all(&binary).unwrap();
        fs::write(binary.join("Release"), "Archive: stable\n").unwrap();
        fs::write(dir.path().join("Release"), "Suite: stable\n").unwrap();
        fs::write(dir.path().join("InRelease"), "signed\n").unwrap();

        let files = indexed_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(names, vec!["main/binary-amd64/Release"]);
    }

    #[test]
    fn custom_digest_function_is_used() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), "1").unwrap();
        let block = build_manifest(dir.path(), HashAlgorithm::Md5, |_| {
            Ok(("fixed".to_string(), 7))
        })
        .unwrap();
        assert_eq!(block.entries[0].digest, "fixed");
        assert_eq!(block.entries[0].size, 7);
    }
}
