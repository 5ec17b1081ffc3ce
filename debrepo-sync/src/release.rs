//! Release descriptor generation and signing.
//!
//! Order matters:
//!
//! 1. Delete the previous `Release.gpg` and `InRelease`, so a failed run can
//!    never leave a signature that does not match the new descriptor.
//! 2. Checksum every file under the suite directory.
//! 3. Atomically replace `Release`.
//! 4. Sign: detached `Release.gpg`, then clear-signed `InRelease`, each via a
//!    temp file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use debrepo_core::layout::{tmp_path_for, RepoLayout};
use debrepo_core::RepoConfig;

use crate::atomic::{commit_tmp, remove_if_exists, write_atomic};
use crate::checksum::{self, ChecksumBlock};
use crate::error::SyncError;
use crate::tools::Signer;

/// Fixed metadata fields written ahead of the checksum blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseFields {
    pub origin: String,
    pub label: String,
    pub suite: String,
    pub codename: String,
    pub version: String,
    pub architectures: Vec<String>,
    pub components: Vec<String>,
    pub description: String,
    pub maintainer: String,
    pub date: DateTime<Utc>,
}

impl ReleaseFields {
    pub fn from_config(config: &RepoConfig, date: DateTime<Utc>) -> Self {
        Self {
            origin: config.origin.clone(),
            label: config.label.clone(),
            suite: config.suite.clone(),
            codename: config.codename.clone(),
            version: config.version.clone(),
            architectures: config.architectures.clone(),
            components: vec![config.component.clone()],
            description: config.description.clone(),
            maintainer: config.maintainer.clone(),
            date,
        }
    }
}

/// Paths written by [`generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseArtifacts {
    pub release: PathBuf,
    pub detached_signature: PathBuf,
    pub inline_signed: PathBuf,
    /// Files covered by each checksum block.
    pub checksummed_files: usize,
}

/// `Mon, 19 Oct 2026 08:30:00 UTC`
pub fn format_release_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S UTC").to_string()
}

/// Render the complete descriptor text.
pub fn render_release(fields: &ReleaseFields, blocks: &[ChecksumBlock]) -> String {
    let mut out = String::new();
    let header = [
        ("Origin", fields.origin.clone()),
        ("Label", fields.label.clone()),
        ("Suite", fields.suite.clone()),
        ("Codename", fields.codename.clone()),
        ("Version", fields.version.clone()),
        ("Architectures", fields.architectures.join(" ")),
        ("Components", fields.components.join(" ")),
        ("Description", fields.description.clone()),
        ("Maintainer", fields.maintainer.clone()),
        ("Date", format_release_date(fields.date)),
    ];
    for (key, value) in header {
        out.push_str(key);
        out.push(':');
        let value = value.trim();
        if !value.is_empty() {
            out.push(' ');
            out.push_str(value);
        }
        out.push('\n');
    }
    for block in blocks {
        out.push_str(&block.render());
    }
    out
}

/// Remove signature artifacts left by a previous run.
pub fn remove_stale_signatures(layout: &RepoLayout) -> Result<(), SyncError> {
    for path in [layout.detached_signature_path(), layout.inline_signed_path()] {
        if remove_if_exists(&path)? {
            tracing::debug!("removed stale signature: {}", path.display());
        }
    }
    Ok(())
}

/// Write and sign `dists/<suite>/Release`.
pub fn generate(
    layout: &RepoLayout,
    config: &RepoConfig,
    signer: &dyn Signer,
    now: DateTime<Utc>,
) -> Result<ReleaseArtifacts, SyncError> {
    remove_stale_signatures(layout)?;

    let blocks = checksum::build_blocks(&layout.suite_dir(), &config.hash_algorithms)?;
    let checksummed_files = blocks.first().map(|b| b.entries.len()).unwrap_or(0);

    let release = layout.release_path();
    let text = render_release(&ReleaseFields::from_config(config, now), &blocks);
    write_atomic(&release, text.as_bytes())?;
    tracing::info!(
        "wrote {} covering {checksummed_files} file(s)",
        release.display()
    );

    let detached_signature = layout.detached_signature_path();
    sign_into(&release, &detached_signature, |input, output| {
        signer.detach_sign(input, output, &config.signing_key)
    })?;
    let inline_signed = layout.inline_signed_path();
    sign_into(&release, &inline_signed, |input, output| {
        signer.clearsign(input, output, &config.signing_key)
    })?;
    tracing::info!("signed release with key {}", config.signing_key);

    Ok(ReleaseArtifacts {
        release,
        detached_signature,
        inline_signed,
        checksummed_files,
    })
}

fn sign_into<F>(release: &Path, target: &Path, sign: F) -> Result<(), SyncError>
where
    F: FnOnce(&Path, &Path) -> Result<(), SyncError>,
{
    let tmp = tmp_path_for(target);
    if let Err(err) = sign(release, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        tracing::error!("signing {} failed", target.display());
        return Err(err);
    }
    commit_tmp(&tmp, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use debrepo_core::HashAlgorithm;

    use crate::checksum::ManifestEntry;

    fn fields() -> ReleaseFields {
        ReleaseFields {
            origin: "Example".to_string(),
            label: "Example".to_string(),
            suite: "stable".to_string(),
            codename: "stable".to_string(),
            version: "1.0".to_string(),
            architectures: vec!["amd64".to_string(), "arm64".to_string()],
            components: vec!["main".to_string()],
            description: "Example stable repository".to_string(),
            maintainer: "Ops <ops@example.org>".to_string(),
            date: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn date_uses_rfc2822_style_utc() {
        assert_eq!(
            format_release_date(fields().date),
            "Mon, 19 Oct 2026 08:30:00 UTC"
        );
    }

    #[test]
    fn header_fields_are_ordered() {
        let text = render_release(&fields(), &[]);
        let keys: Vec<_> = text
            .lines()
            .map(|l| l.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(
            keys,
            vec![
                "Origin",
                "Label",
                "Suite",
                "Codename",
                "Version",
                "Architectures",
                "Components",
                "Description",
                "Maintainer",
                "Date"
            ]
        );
        assert!(text.contains("Architectures: amd64 arm64\n"));
    }

    #[test]
    fn blocks_follow_header_in_order() {
        let entry = ManifestEntry {
            digest: "d".to_string(),
            size: 1,
            path: "main/binary-amd64/Packages".to_string(),
        };
        let blocks = vec![
            ChecksumBlock {
                algorithm: HashAlgorithm::Md5,
                entries: vec![entry.clone()],
            },
            ChecksumBlock {
                algorithm: HashAlgorithm::Sha256,
                entries: vec![entry],
            },
        ];
        let text = render_release(&fields(), &blocks);
        let md5 = text.find("MD5Sum:\n").expect("md5 block");
        let sha = text.find("SHA256:\n").expect("sha256 block");
        assert!(text.find("Date:").unwrap() < md5 && md5 < sha);
        assert!(text.ends_with(" d 1 main/binary-amd64/Packages\n"));
    }

    #[test]
    fn empty_value_leaves_no_trailing_whitespace() {
        let mut fields = fields();
        fields.description = String::new();
        let text = render_release(&fields, &[]);
        assert!(text.contains("\nDescription:\nMaintainer: "), "{text}");
        assert!(text.lines().all(|line| line == line.trim_end()));
    }
}
