// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! The external git operations the CLI surface asks for (§6 `-u`/`-g`/`-c`):
//! pulling the upstream on-disk index up to date, reporting `git status -s`
//! on the materialized output tree, and committing + pushing it. All three
//! shell out to `git` directly, the way the original mirror builder's
//! `make_git_index` ran
//! `subprocess.run(["git", "status", "-s"], cwd="top-crates-index")`.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::info;

use cratemirror::RegistryConfig;

const LOGNAME: &str = "cratemirror-cli::gitops";

/// `-u / --update`: fast-forward the upstream index checkout.
pub(crate) fn update(config: &RegistryConfig) -> Result<()> {
    info!(target: LOGNAME, "updating upstream index at {}", config.upstream_index.display());
    run_git(&config.upstream_index, &["pull", "--ff-only"])
}

/// `git status -s` on the materialized output tree, so the operator can see
/// what changed before deciding to `-c`/`--commit` (the original's
/// `subprocess.run(["git", "status", "-s"], cwd="top-crates-index")`). Run
/// unconditionally whenever `-g`/`--git-registry` is set, independent of
/// `--commit`.
pub(crate) fn status(config: &RegistryConfig, git_registry: bool) -> Result<()> {
    let root = config
        .output_root(git_registry)
        .context("--git-registry requires an output tree to report status for")?;

    info!(target: LOGNAME, "git status for {}", root.display());
    run_git(root, &["status", "-s"])
}

/// `-c / --commit`: stage, commit, and push the materialized output tree.
/// A no-op (not an error) when there is nothing staged to commit.
pub(crate) fn commit(config: &RegistryConfig, git_registry: bool) -> Result<()> {
    let root = config
        .output_root(git_registry)
        .context("--commit requires an output tree to commit")?;

    run_git(root, &["add", "-A"])?;

    let status = git_command(root, &["diff", "--cached", "--quiet"])
        .status()
        .with_context(|| format!("failed to run git in {}", root.display()))?;
    if status.success() {
        info!(target: LOGNAME, "nothing to commit in {}", root.display());
        return Ok(());
    }

    info!(target: LOGNAME, "committing updated index in {}", root.display());
    run_git(root, &["commit", "-m", "update crate index"])?;
    run_git(root, &["push"])
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<()> {
    let status = git_command(cwd, args)
        .status()
        .with_context(|| format!("failed to run `git {}` in {}", args.join(" "), cwd.display()))?;
    if !status.success() {
        bail!(
            "`git {}` in {} exited with {}",
            args.join(" "),
            cwd.display(),
            status
        );
    }
    Ok(())
}

fn git_command(cwd: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(cwd).args(args);
    cmd
}
