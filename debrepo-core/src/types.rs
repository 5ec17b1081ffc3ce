//! Domain types shared across the debrepo crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hash algorithms
// ---------------------------------------------------------------------------

/// A checksum algorithm emitted as one block of the Release descriptor.
///
/// Ordered by digest strength; the derive order is the block order.
///
/// Config files may name an algorithm either way it is spelled elsewhere:
/// `md5`/`sha256` or the Release labels `MD5Sum`/`SHA256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// The block label used in `Release` files (`MD5Sum:`, `SHA256:` ...).
    pub fn release_label(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5Sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Algorithms written when the config does not name any.
    pub fn defaults() -> Vec<HashAlgorithm> {
        vec![HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256]
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.release_label())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" | "md5sum" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(format!(
                "unknown hash algorithm '{other}'; expected: md5, sha1, sha256, sha512"
            )),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Version-control status
// ---------------------------------------------------------------------------

/// Short-status codes that contribute a sentence to the commit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Renamed,
    Modified,
    Added,
    Copied,
}

impl StatusCode {
    /// Map the leading status letter; anything outside R/M/A/C is not reported.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'R' => Some(StatusCode::Renamed),
            'M' => Some(StatusCode::Modified),
            'A' => Some(StatusCode::Added),
            'C' => Some(StatusCode::Copied),
            _ => None,
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            StatusCode::Renamed => "Renamed",
            StatusCode::Modified => "Modified",
            StatusCode::Added => "Added",
            StatusCode::Copied => "Copied",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

// ---------------------------------------------------------------------------
// Pool change events
// ---------------------------------------------------------------------------

/// Kind of filesystem mutation observed under `pool/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Delete,
    Modify,
    Move,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Delete => write!(f, "delete"),
            ChangeKind::Modify => write!(f, "modify"),
            ChangeKind::Move => write!(f, "move"),
        }
    }
}
