//! External capabilities the pipeline drives.
//!
//! Each tool sits behind a narrow trait so tests can substitute fakes. The
//! process-backed implementations spawn the usual Debian tooling with an
//! explicit working directory; nothing here reads or changes the process
//! current directory.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use debrepo_core::HostDefaults;

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Builds package control stanzas from the pool tree.
pub trait Indexer: Send + Sync {
    /// Return the `Packages` text for `arch`, scanning `<repo_root>/pool`.
    fn scan(&self, repo_root: &Path, arch: &str) -> Result<String, SyncError>;
}

/// Compressed sibling formats written next to every `Packages` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
}

impl Compression {
    pub fn all() -> &'static [Compression] {
        &[Compression::Gzip, Compression::Xz]
    }

    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Xz => "xz",
        }
    }
}

pub trait Compressor: Send + Sync {
    /// Write a compressed copy of `input` to `output`, replacing it.
    fn compress(&self, format: Compression, input: &Path, output: &Path) -> Result<(), SyncError>;
}

/// Signing keyed by a named identity.
pub trait Signer: Send + Sync {
    /// Armored detached signature of `input` written to `output`.
    fn detach_sign(&self, input: &Path, output: &Path, key: &str) -> Result<(), SyncError>;
    /// Clear-signed copy of `input` written to `output`.
    fn clearsign(&self, input: &Path, output: &Path, key: &str) -> Result<(), SyncError>;
}

/// Version control over the repository working tree.
pub trait Vcs: Send + Sync {
    fn add_all(&self, repo: &Path) -> Result<(), SyncError>;
    /// Short status, one `XY path` line per changed path.
    fn status_short(&self, repo: &Path) -> Result<String, SyncError>;
    fn commit(&self, repo: &Path, message: &str) -> Result<(), SyncError>;
    fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), SyncError>;
    /// Local commits not yet on `<remote>/<branch>`.
    fn commits_ahead(&self, repo: &Path, remote: &str, branch: &str) -> Result<usize, SyncError>;
}

/// Background service management for the self-restart check.
pub trait ServiceControl: Send + Sync {
    fn restart(&self, unit: &str) -> Result<(), SyncError>;
}

/// Every capability one pipeline run needs.
pub struct Toolchain {
    pub indexer: Box<dyn Indexer>,
    pub compressor: Box<dyn Compressor>,
    pub signer: Box<dyn Signer>,
    pub vcs: Box<dyn Vcs>,
    pub services: Box<dyn ServiceControl>,
}

impl Toolchain {
    /// The real tools: dpkg-scanpackages, gzip/xz, gpg, git, systemctl.
    pub fn system() -> Self {
        Self {
            indexer: Box::new(DpkgScanPackages),
            compressor: Box::new(SystemCompressor),
            signer: Box::new(Gpg),
            vcs: Box::new(GitCli),
            services: Box::new(Systemctl),
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Process-backed implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct DpkgScanPackages;

impl Indexer for DpkgScanPackages {
    fn scan(&self, repo_root: &Path, arch: &str) -> Result<String, SyncError> {
        let mut cmd = Command::new("dpkg-scanpackages");
        cmd.current_dir(repo_root)
            .args(["--multiversion", "--arch", arch, debrepo_core::layout::POOL_DIR]);
        let output = run_tool(&mut cmd, "dpkg-scanpackages")?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!("dpkg-scanpackages: {line}");
        }
        String::from_utf8(output.stdout).map_err(|e| SyncError::Tool {
            tool: "dpkg-scanpackages".to_string(),
            status: "0".to_string(),
            stderr: format!("output is not UTF-8: {e}"),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCompressor;

impl Compressor for SystemCompressor {
    fn compress(&self, format: Compression, input: &Path, output: &Path) -> Result<(), SyncError> {
        let (program, args): (&str, &[&str]) = match format {
            // -n keeps the name and mtime out of the header so output is reproducible.
            Compression::Gzip => ("gzip", &["-9", "-n", "-c"]),
            Compression::Xz => ("xz", &["-9", "-c"]),
        };
        let sink = File::create(output).map_err(|e| io_err(output, e))?;
        let mut cmd = Command::new(program);
        cmd.args(args).arg(input).stdout(Stdio::from(sink));
        run_tool(&mut cmd, program).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Gpg;

impl Gpg {
    fn sign(&self, mode: &[&str], input: &Path, output: &Path, key: &str) -> Result<(), SyncError> {
        let mut cmd = Command::new("gpg");
        cmd.args(["--batch", "--yes", "--digest-algo", "SHA512", "--local-user", key])
            .args(mode)
            .arg("--output")
            .arg(output)
            .arg(input);
        run_tool(&mut cmd, "gpg").map(|_| ())
    }
}

impl Signer for Gpg {
    fn detach_sign(&self, input: &Path, output: &Path, key: &str) -> Result<(), SyncError> {
        self.sign(&["--armor", "--detach-sign"], input, output, key)
    }

    fn clearsign(&self, input: &Path, output: &Path, key: &str) -> Result<(), SyncError> {
        self.sign(&["--clearsign"], input, output, key)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    fn git(&self, repo: &Path, args: &[&str]) -> Result<Output, SyncError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(repo).args(args);
        run_tool(&mut cmd, "git")
    }

    fn ref_exists(&self, repo: &Path, reference: &str) -> Result<bool, SyncError> {
        let output = Command::new("git")
            .current_dir(repo)
            .args(["rev-parse", "--verify", "--quiet", reference])
            .output()
            .map_err(|source| SyncError::Spawn {
                tool: "git".to_string(),
                source,
            })?;
        Ok(output.status.success())
    }

    fn count(&self, repo: &Path, range: &str) -> Result<usize, SyncError> {
        let output = self.git(repo, &["rev-list", "--count", range])?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim().parse().map_err(|_| SyncError::Tool {
            tool: "git rev-list".to_string(),
            status: "0".to_string(),
            stderr: format!("unexpected count output '{}'", text.trim()),
        })
    }
}

impl Vcs for GitCli {
    fn add_all(&self, repo: &Path) -> Result<(), SyncError> {
        self.git(repo, &["add", "-A"]).map(|_| ())
    }

    fn status_short(&self, repo: &Path) -> Result<String, SyncError> {
        let output = self.git(repo, &["status", "--porcelain", "--untracked-files=all"])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<(), SyncError> {
        self.git(repo, &["commit", "--quiet", "-m", message]).map(|_| ())
    }

    fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), SyncError> {
        self.git(repo, &["push", "--quiet", remote, branch])
            .map(|_| ())
            .map_err(|err| SyncError::Push {
                remote: remote.to_string(),
                branch: branch.to_string(),
                reason: err.to_string(),
            })
    }

    fn commits_ahead(&self, repo: &Path, remote: &str, branch: &str) -> Result<usize, SyncError> {
        let tracking = format!("refs/remotes/{remote}/{branch}");
        if self.ref_exists(repo, &tracking)? {
            return self.count(repo, &format!("{tracking}..HEAD"));
        }
        // Never pushed: everything on HEAD is pending, if HEAD exists at all.
        if self.ref_exists(repo, "HEAD")? {
            return self.count(repo, "HEAD");
        }
        Ok(0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

impl ServiceControl for Systemctl {
    fn restart(&self, unit: &str) -> Result<(), SyncError> {
        let mut cmd = Command::new("systemctl");
        cmd.args(["restart", unit]);
        run_tool(&mut cmd, "systemctl").map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Host probing
// ---------------------------------------------------------------------------

/// Ask dpkg for the native architecture and git for the maintainer identity.
///
/// Probe failures leave the field unset; config resolution decides whether
/// that is fatal.
pub fn probe_host_defaults(repo_root: Option<&Path>) -> HostDefaults {
    let architecture = capture_line(Command::new("dpkg").arg("--print-architecture"));

    let git_config = |key: &str| {
        let mut cmd = Command::new("git");
        if let Some(root) = repo_root.filter(|r| r.is_dir()) {
            cmd.current_dir(root);
        }
        cmd.args(["config", "--get", key]);
        capture_line(&mut cmd)
    };
    let maintainer = match (git_config("user.name"), git_config("user.email")) {
        (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
        (Some(name), None) => Some(name),
        _ => None,
    };

    HostDefaults {
        architecture,
        maintainer,
    }
}

fn capture_line(cmd: &mut Command) -> Option<String> {
    let output = cmd.stderr(Stdio::null()).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!line.is_empty()).then_some(line)
}

/// Run `cmd` to completion; non-zero exit becomes [`SyncError::Tool`].
fn run_tool(cmd: &mut Command, tool: &str) -> Result<Output, SyncError> {
    tracing::debug!("running {cmd:?}");
    let output = cmd.output().map_err(|source| SyncError::Spawn {
        tool: tool.to_string(),
        source,
    })?;
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(SyncError::Tool {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr,
    })
}
