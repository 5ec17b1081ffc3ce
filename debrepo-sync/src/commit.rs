//! Publication: stage, derive a commit message from short status, commit, push.
//!
//! Only added, modified, renamed and copied paths produce a sentence; every
//! other status code, deletions included, is skipped. An empty message means
//! there is nothing to publish.

use std::path::Path;

use serde::Serialize;

use debrepo_core::{RepoConfig, StatusCode};

use crate::error::SyncError;
use crate::tools::Vcs;

/// One recognised line of short status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub code: StatusCode,
    /// Destination path for renames and copies.
    pub path: String,
}

/// What publication did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// A new commit was created and pushed.
    Committed { message: String },
    /// Nothing new to commit, but earlier unpushed commits were pushed.
    Pushed { pending: usize },
    /// Nothing to commit and nothing pending.
    NothingToCommit,
}

/// Parse short-status output into recognised entries, in status order.
pub fn parse_status(status: &str) -> Vec<StatusEntry> {
    status.lines().filter_map(parse_status_line).collect()
}

fn parse_status_line(line: &str) -> Option<StatusEntry> {
    // Leading whitespace covers worktree-only changes (` M path`).
    let (code_field, rest) = line.trim().split_once(char::is_whitespace)?;
    let code = StatusCode::from_code(code_field.chars().next()?)?;

    let rest = rest.trim();
    let path = match rest.rsplit_once(" -> ") {
        Some((_, dest)) => dest,
        None if matches!(code, StatusCode::Renamed | StatusCode::Copied) => {
            rest.rsplit(char::is_whitespace).next().unwrap_or(rest)
        }
        None => rest,
    };
    let path = unquote(path.trim());
    if path.is_empty() {
        return None;
    }
    Some(StatusEntry { code, path })
}

fn unquote(path: &str) -> String {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .map(|p| p.replace("\\\"", "\"").replace("\\\\", "\\"))
        .unwrap_or_else(|| path.to_string())
}

/// One `<Phrase> <path>.` sentence per entry, space-separated.
///
/// Returns `None` when there is nothing to report.
pub fn commit_message(entries: &[StatusEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let sentences: Vec<String> = entries
        .iter()
        .map(|e| format!("{} {}.", e.code.phrase(), e.path))
        .collect();
    Some(sentences.join(" "))
}

/// Message the next publication would use, without staging anything.
///
/// Publication stages with `add -A` first, so untracked (`??`) paths are
/// reported here as the additions they will become.
pub fn preview_message(repo: &Path, vcs: &dyn Vcs) -> Result<Option<String>, SyncError> {
    let status = vcs.status_short(repo)?;
    Ok(commit_message(&parse_preview_status(&status)))
}

fn parse_preview_status(status: &str) -> Vec<StatusEntry> {
    status
        .lines()
        .filter_map(|line| match line.strip_prefix("?? ") {
            Some(path) => {
                let path = unquote(path.trim());
                (!path.is_empty()).then_some(StatusEntry {
                    code: StatusCode::Added,
                    path,
                })
            }
            None => parse_status_line(line),
        })
        .collect()
}

/// Stage everything, then commit and push when there is something to say.
///
/// Returns [`SyncError::NothingToCommit`] without touching commit or push
/// when status has no recognised changes and no earlier commit is waiting to
/// be pushed. When an earlier run committed but failed to push, this pushes
/// the pending commits instead of creating an empty one.
pub fn publish(config: &RepoConfig, vcs: &dyn Vcs) -> Result<PublishOutcome, SyncError> {
    let repo = config.repo_root.as_path();
    vcs.add_all(repo)?;
    let status = vcs.status_short(repo)?;
    let entries = parse_status(&status);

    let Some(message) = commit_message(&entries) else {
        let pending = vcs.commits_ahead(repo, &config.remote, &config.branch)?;
        if pending == 0 {
            tracing::info!("nothing to commit");
            return Err(SyncError::NothingToCommit);
        }
        tracing::warn!(
            "no new changes, pushing {pending} pending commit(s) to {}/{}",
            config.remote,
            config.branch
        );
        vcs.push(repo, &config.remote, &config.branch)?;
        return Ok(PublishOutcome::Pushed { pending });
    };

    vcs.commit(repo, &message)?;
    tracing::info!("committed: {message}");
    if let Err(err) = vcs.push(repo, &config.remote, &config.branch) {
        tracing::error!("local commit created but push failed; rerun to retry the push");
        return Err(err);
    }
    tracing::info!("pushed to {}/{}", config.remote, config.branch);
    Ok(PublishOutcome::Committed { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("M  pool/a.deb", Some((StatusCode::Modified, "pool/a.deb")))]
    #[case("AM pool/b.deb", Some((StatusCode::Added, "pool/b.deb")))]
    #[case("R  old.deb -> new.deb", Some((StatusCode::Renamed, "new.deb")))]
    #[case("D  pool/gone.deb", None)]
    #[case("?? scratch.txt", None)]
    #[case("   ", None)]
    fn single_status_line(#[case] line: &str, #[case] expected: Option<(StatusCode, &str)>) {
        let parsed = parse_status_line(line).map(|e| (e.code, e.path));
        assert_eq!(parsed, expected.map(|(code, path)| (code, path.to_string())));
    }

    #[test]
    fn message_covers_modified_added_renamed_in_order() {
        let status = "M foo.deb\nA bar.deb\nR baz.deb qux.deb\n";
        let message = commit_message(&parse_status(status)).expect("message");
        assert_eq!(message, "Modified foo.deb. Added bar.deb. Renamed qux.deb.");
        assert_eq!(message, message.trim_end());
    }

    #[test]
    fn porcelain_rename_arrow_uses_destination() {
        let entries = parse_status("R  pool/old.deb -> pool/new.deb\n");
        assert_eq!(
            entries,
            vec![StatusEntry {
                code: StatusCode::Renamed,
                path: "pool/new.deb".to_string()
            }]
        );
    }

    #[test]
    fn unrecognised_codes_are_ignored() {
        let status = "D  pool/gone.deb\n?? scratch.txt\nC  a.deb -> b.deb\n";
        let message = commit_message(&parse_status(status)).expect("message");
        assert_eq!(message, "Copied b.deb.");
    }

    #[test]
    fn worktree_column_and_quoted_paths_are_handled() {
        let entries = parse_status(" M dists/stable/Release\nA  \"pool/with space.deb\"\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, StatusCode::Modified);
        assert_eq!(entries[1].path, "pool/with space.deb");
    }

    #[test]
    fn empty_status_yields_no_message() {
        assert_eq!(commit_message(&parse_status("")), None);
        assert_eq!(commit_message(&parse_status("D  x.deb\n")), None);
    }

    /// Working tree as `git status` reports it before anything is staged.
    struct UnstagedTree(&'static str);

    impl Vcs for UnstagedTree {
        fn add_all(&self, _repo: &Path) -> Result<(), SyncError> {
            panic!("preview must not stage");
        }

        fn status_short(&self, _repo: &Path) -> Result<String, SyncError> {
            Ok(self.0.to_string())
        }

        fn commit(&self, _repo: &Path, _message: &str) -> Result<(), SyncError> {
            panic!("preview must not commit");
        }

        fn push(&self, _repo: &Path, _remote: &str, _branch: &str) -> Result<(), SyncError> {
            panic!("preview must not push");
        }

        fn commits_ahead(&self, _repo: &Path, _remote: &str, _branch: &str) -> Result<usize, SyncError> {
            Ok(0)
        }
    }

    #[test]
    fn preview_reports_untracked_uploads_as_added() {
        let vcs = UnstagedTree("?? pool/hello_1.0_amd64.deb\n M dists/stable/Release\n");
        let message = preview_message(Path::new("/srv/apt"), &vcs).unwrap();
        assert_eq!(
            message.as_deref(),
            Some("Added pool/hello_1.0_amd64.deb. Modified dists/stable/Release.")
        );
    }

    #[test]
    fn preview_matches_message_after_staging() {
        let unstaged = "?? pool/world_2.1_amd64.deb\n";
        let staged = "A  pool/world_2.1_amd64.deb\n";
        assert_eq!(
            preview_message(Path::new("/srv/apt"), &UnstagedTree(unstaged)).unwrap(),
            commit_message(&parse_status(staged))
        );
    }

    #[test]
    fn preview_of_clean_tree_is_empty() {
        assert_eq!(preview_message(Path::new("/srv/apt"), &UnstagedTree("")).unwrap(), None);
    }

    #[test]
    fn outcome_serialises_with_kind_tag() {
        let pushed = serde_json::to_value(PublishOutcome::Pushed { pending: 2 }).unwrap();
        assert_eq!(pushed, serde_json::json!({"kind": "pushed", "pending": 2}));
        let noop = serde_json::to_value(PublishOutcome::NothingToCommit).unwrap();
        assert_eq!(noop, serde_json::json!({"kind": "nothing_to_commit"}));
    }
}
