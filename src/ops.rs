use std::path::Path;

use tracing::info;

use crate::callbacks::RemoteCallback;
use crate::errors::GitError;

/// Distinguishes a push that moved references from one where negotiation
/// found every listed update already in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    NoChanges,
}

/// Fetch from a named remote (default `origin`) using the remote's own
/// configured refspecs.
pub fn fetch(
    repo: &git2::Repository,
    remote: Option<&str>,
    callback: &RemoteCallback,
) -> Result<(), GitError> {
    let name = remote.unwrap_or("origin");
    let mut remote = repo.find_remote(name)?;
    let mut opts = fetch_options(callback);
    remote.fetch(&[] as &[&str], Some(&mut opts), None)?;
    info!(target: "ops", remote = name, "fetch completed");
    Ok(())
}

/// Push the given refspecs (or the remote's configured ones when empty).
/// A negotiation that finds nothing to update is reported as
/// [`PushOutcome::NoChanges`], not as an error.
pub fn push(
    repo: &git2::Repository,
    remote: Option<&str>,
    refspecs: &[&str],
    callback: &RemoteCallback,
) -> Result<PushOutcome, GitError> {
    let name = remote.unwrap_or("origin");
    let mut remote = repo.find_remote(name)?;
    let mut opts = git2::PushOptions::new();
    opts.remote_callbacks(callback.git_callbacks());
    match remote.push(refspecs, Some(&mut opts)) {
        Ok(()) => {
            info!(target: "ops", remote = name, "push completed");
            Ok(PushOutcome::Pushed)
        }
        Err(e) => {
            if callback.negotiation_rejected() {
                info!(target: "ops", remote = name, "push negotiation found nothing to update");
                return Ok(PushOutcome::NoChanges);
            }
            Err(e.into())
        }
    }
}

/// Clone a remote repository into `dest`.
pub fn clone(
    url: &str,
    dest: &Path,
    callback: &RemoteCallback,
) -> Result<git2::Repository, GitError> {
    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_options(callback));
    let repo = builder.clone(url, dest)?;
    info!(target: "ops", url, dest = %dest.display(), "clone completed");
    Ok(repo)
}

/// List the advertised reference names of a remote without fetching.
pub fn ls_remote(url: &str, callback: &RemoteCallback) -> Result<Vec<String>, GitError> {
    let mut remote = git2::Remote::create_detached(url)?;
    let connection =
        remote.connect_auth(git2::Direction::Fetch, Some(callback.git_callbacks()), None)?;
    let names = connection
        .list()?
        .iter()
        .map(|head| head.name().to_string())
        .collect();
    Ok(names)
}

/// `ls_remote` filtered down to branch and/or tag short names. Peeled tag
/// entries (`…^{}`) are dropped.
pub fn ls_remote_filtered(
    url: &str,
    callback: &RemoteCallback,
    branches: bool,
    tags: bool,
) -> Result<Vec<String>, GitError> {
    const BRANCH_PREFIX: &str = "refs/heads/";
    const TAG_PREFIX: &str = "refs/tags/";
    let names = ls_remote(url, callback)?;
    Ok(names
        .into_iter()
        .filter_map(|name| {
            if branches {
                if let Some(short) = name.strip_prefix(BRANCH_PREFIX) {
                    return Some(short.to_string());
                }
            }
            if tags && !name.ends_with("^{}") {
                if let Some(short) = name.strip_prefix(TAG_PREFIX) {
                    return Some(short.to_string());
                }
            }
            None
        })
        .collect())
}

fn fetch_options(callback: &RemoteCallback) -> git2::FetchOptions<'static> {
    let mut opts = git2::FetchOptions::new();
    opts.remote_callbacks(callback.git_callbacks());
    opts.download_tags(git2::AutotagOption::Unspecified);
    opts.update_fetchhead(true);
    opts
}
