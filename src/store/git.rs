//! Ref store backed by branches of a local git repository.
//!
//! Lock branches live under `refs/heads/`. Every mutation goes through
//! `git update-ref` with an explicit old value, so git itself rejects:
//! - creating a branch that already exists (old value empty)
//! - writing a lock file on top of a branch that moved since it was read
//! - deleting a branch that moved since it was read
//!
//! File writes never touch a worktree; they are built with plumbing commands
//! (`hash-object`, `mktree`, `commit-tree`) against the branch tip.

use super::{RefStore, StoreError, StoreResult};
use crate::config::Config;
use crate::error::{DeployLockError, Result};
use crate::git::{is_git_repository, run_git, run_git_raw, run_git_with_input};
use std::path::{Path, PathBuf};

/// A [`RefStore`] over a local git repository (bare or non-bare).
#[derive(Debug, Clone)]
pub struct GitRefStore {
    /// Path to the repository (any directory git accepts as `-C`).
    repo: PathBuf,
    /// Committer name for lock commits.
    committer_name: String,
    /// Committer email for lock commits.
    committer_email: String,
}

impl GitRefStore {
    /// Open the repository at `repo`.
    ///
    /// # Returns
    ///
    /// * `Ok(GitRefStore)` - `repo` is a git repository
    /// * `Err(DeployLockError::UserError)` - `repo` is not a git repository
    pub fn open<P: AsRef<Path>>(repo: P, config: &Config) -> Result<Self> {
        let repo = repo.as_ref();
        if !is_git_repository(repo) {
            return Err(DeployLockError::UserError(format!(
                "'{}' is not a git repository",
                repo.display()
            )));
        }

        Ok(Self {
            repo: repo.to_path_buf(),
            committer_name: config.committer_name.clone(),
            committer_email: config.committer_email.clone(),
        })
    }

    /// Path to the backing repository.
    pub fn path(&self) -> &Path {
        &self.repo
    }

    /// Resolve a branch to its commit id, `None` when the branch does not exist.
    fn resolve(&self, name: &str) -> StoreResult<Option<String>> {
        let full = full_ref(name);
        match run_git(&self.repo, &["rev-parse", "--verify", "--quiet", &full]) {
            Ok(output) => Ok(Some(output.stdout)),
            // --quiet reports a missing ref with exit code 1 and no output
            Err(StoreError::Unexpected { status: 1, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn resolve_existing(&self, name: &str) -> StoreResult<String> {
        self.resolve(name)?
            .ok_or_else(|| StoreError::NotFound(format!("branch '{}' does not exist", name)))
    }

    /// Classify a failed compare-and-swap of `reference` from `parent`.
    ///
    /// Only a tip that moved away from `parent` is a [`StoreError::Conflict`].
    /// Ref lock contention and other failures stay as they are so the caller
    /// may retry.
    fn classify_swap_failure(
        &self,
        reference: &str,
        parent: &str,
        error: StoreError,
    ) -> StoreResult<StoreError> {
        if !matches!(error, StoreError::Unexpected { .. }) {
            return Ok(error);
        }
        if self.resolve(reference)?.as_deref() == Some(parent) {
            return Ok(error);
        }
        Ok(StoreError::Conflict(format!(
            "branch '{}' moved during the write: {}",
            reference, error
        )))
    }

    /// Build a tree equal to `parent`'s tree with `path` set to `blob`.
    fn tree_with_file(&self, parent: &str, path: &str, blob: &str) -> StoreResult<String> {
        let listing = run_git(&self.repo, &["ls-tree", parent])?;

        let mut entries: Vec<String> = listing
            .lines()
            .into_iter()
            .filter(|line| line.split_once('\t').map(|(_, name)| name) != Some(path))
            .map(str::to_string)
            .collect();
        entries.push(format!("100644 blob {}\t{}", blob, path));

        let mut input = entries.join("\n");
        input.push('\n');

        Ok(run_git_with_input(&self.repo, &["mktree"], &input)?.stdout)
    }
}

fn full_ref(name: &str) -> String {
    format!("refs/heads/{}", name)
}

impl RefStore for GitRefStore {
    fn ref_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.resolve(name)?.is_some())
    }

    fn create_ref(&self, name: &str, from: &str) -> StoreResult<()> {
        let base = self.resolve(from)?.ok_or_else(|| {
            StoreError::NotFound(format!("base branch '{}' does not exist", from))
        })?;

        // An empty old value makes git refuse to overwrite an existing ref
        match run_git(&self.repo, &["update-ref", &full_ref(name), &base, ""]) {
            Ok(_) => Ok(()),
            Err(StoreError::Unexpected { message, .. })
                if message.contains("already exists") || self.resolve(name)?.is_some() =>
            {
                Err(StoreError::Conflict(format!(
                    "branch '{}' already exists",
                    name
                )))
            }
            Err(e) => Err(e),
        }
    }

    fn get_file(&self, reference: &str, path: &str) -> StoreResult<String> {
        let tip = self.resolve_existing(reference)?;

        // An empty listing is the only "no such file"; git failures propagate
        let listing = run_git(&self.repo, &["ls-tree", &tip, "--", path])?;
        let blob = listing
            .lines()
            .into_iter()
            .filter_map(|line| line.split_once('\t'))
            .filter(|(_, name)| *name == path)
            .find_map(|(meta, _)| match meta.split_whitespace().collect::<Vec<_>>()[..] {
                [_, "blob", id] => Some(id.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "'{}' does not exist on branch '{}'",
                    path, reference
                ))
            })?;

        run_git_raw(&self.repo, &["cat-file", "blob", &blob])
    }

    fn put_file(
        &self,
        reference: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> StoreResult<()> {
        let parent = self.resolve_existing(reference)?;

        let blob = run_git_with_input(&self.repo, &["hash-object", "-w", "--stdin"], content)?;
        let tree = self.tree_with_file(&parent, path, &blob.stdout)?;

        let name_cfg = format!("user.name={}", self.committer_name);
        let email_cfg = format!("user.email={}", self.committer_email);
        let commit = run_git(
            &self.repo,
            &[
                "-c",
                &name_cfg,
                "-c",
                &email_cfg,
                "commit-tree",
                "--no-gpg-sign",
                &tree,
                "-p",
                &parent,
                "-m",
                message,
            ],
        )?;

        // Compare-and-swap against the tip we built on
        match run_git(
            &self.repo,
            &["update-ref", &full_ref(reference), &commit.stdout, &parent],
        ) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.classify_swap_failure(reference, &parent, e)?),
        }
    }

    fn delete_ref(&self, name: &str) -> StoreResult<()> {
        let tip = self.resolve_existing(name)?;

        match run_git(&self.repo, &["update-ref", "-d", &full_ref(name), &tip]) {
            Ok(_) => Ok(()),
            Err(e) => {
                // Someone else deleted it between our read and our delete
                if self.resolve(name)?.is_none() {
                    Err(StoreError::NotFound(format!(
                        "branch '{}' does not exist",
                        name
                    )))
                } else {
                    Err(e)
                }
            }
        }
    }

    fn list_refs(&self) -> StoreResult<Vec<String>> {
        let output = run_git(
            &self.repo,
            &["for-each-ref", "--format=%(refname)", "refs/heads/"],
        )?;

        Ok(output
            .lines()
            .into_iter()
            .filter_map(|line| line.strip_prefix("refs/heads/"))
            .map(str::to_string)
            .collect())
    }
}
