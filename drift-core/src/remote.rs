//! Remote repositories: local filesystem paths and `tcp://` endpoints.
//!
//! A remote designator is either a plain path to another repository on the
//! same filesystem or `tcp://host[:port]`. Local transfers copy missing
//! object files directly; TCP transfers run the wire sessions from
//! [`crate::protocol`]. Both enforce the same fast-forward rule on push.

use std::net::TcpStream;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::fsutil;
use crate::graph;
use crate::oid::ObjectId;
use crate::protocol::{self, RefAdvert, DEFAULT_PORT, DETACHED};
use crate::refs::heads_ref;
use crate::repo::{Repository, CONTROL_DIR, DEFAULT_BRANCH};
use crate::worktree;

/// Where a remote designator points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    Tcp { host: String, port: u16 },
    Path(PathBuf),
}

/// Parse a remote designator. `tcp://host[:port]` selects the wire
/// transport; anything else is a filesystem path.
pub fn parse_remote(spec: &str) -> RemoteTarget {
    if let Some(rest) = spec.strip_prefix("tcp://") {
        let (host, port) = match rest.rsplit_once(':') {
            Some((h, p)) => match p.parse() {
                Ok(port) => (h.to_string(), port),
                Err(_) => (rest.to_string(), DEFAULT_PORT),
            },
            None => (rest.to_string(), DEFAULT_PORT),
        };
        RemoteTarget::Tcp { host, port }
    } else {
        RemoteTarget::Path(PathBuf::from(spec))
    }
}

// ==================== Local path remotes ====================

/// Clone the repository at `src` into `dst`: copy the control directory,
/// then materialize the working tree at the destination head.
pub fn clone_local(src: &Path, dst: &Path) -> Result<()> {
    let src_repo = Repository::open(src);
    if !src_repo.is_initialized() {
        return Err(Error::NotInitialized(src.display().to_string()));
    }
    std::fs::create_dir_all(dst)?;
    copy_missing_files(&src_repo.control_dir(), &dst.join(CONTROL_DIR))?;

    let dst_repo = Repository::open(dst);
    if let Some(tip) = dst_repo.head_commit()? {
        materialize(&dst_repo, &tip)?;
    }
    info!(src = %src.display(), dst = %dst.display(), "cloned repository");
    Ok(())
}

/// Push `branch` from `local` into the repository at `remote`,
/// fast-forward only.
pub fn push_local(local: &Path, remote: &Path, branch: &str) -> Result<()> {
    let local_repo = Repository::open(local);
    let remote_repo = Repository::open(remote);
    if !local_repo.is_initialized() {
        return Err(Error::NotInitialized(local.display().to_string()));
    }
    if !remote_repo.is_initialized() {
        return Err(Error::NotInitialized(remote.display().to_string()));
    }
    if local_repo.current_branch_ref()?.is_none() {
        return Err(Error::SymbolicHeadRequired);
    }

    let refname = heads_ref(branch);
    let local_tip_hex = local_repo
        .refs()
        .read(&refname)?
        .ok_or_else(|| Error::UnknownBranch(branch.to_string()))?;
    let local_tip = ObjectId::from_hex(&local_tip_hex)?;

    if let Some(remote_tip_hex) = remote_repo.refs().read(&refname)? {
        let remote_tip = ObjectId::from_hex(&remote_tip_hex)?;
        if !graph::is_ancestor(&local_repo.store(), &remote_tip, &local_tip)? {
            return Err(Error::NonFastForward(refname));
        }
    }

    copy_missing_files(
        &local_repo.store().objects_dir(),
        &remote_repo.store().objects_dir(),
    )?;
    remote_repo.refs().write(&refname, &local_tip_hex)?;
    info!(branch, tip = %local_tip, "pushed to local remote");
    Ok(())
}

/// Fetch the head of the repository at `remote` into `local`, recording it
/// as `refs/remotes/<name>/<branch>` when the remote is on a born branch.
pub fn fetch_local(local: &Path, remote: &Path, name: &str) -> Result<RefAdvert> {
    let local_repo = Repository::open(local);
    let remote_repo = Repository::open(remote);
    if !local_repo.is_initialized() {
        return Err(Error::NotInitialized(local.display().to_string()));
    }
    if !remote_repo.is_initialized() {
        return Err(Error::NotInitialized(remote.display().to_string()));
    }

    let advert = protocol::head_advert(&remote_repo.control_dir())?;
    copy_missing_files(
        &remote_repo.store().objects_dir(),
        &local_repo.store().objects_dir(),
    )?;
    record_remote_ref(&local_repo, name, &advert)?;
    Ok(advert)
}

// ==================== TCP remotes ====================

/// Clone from a serving peer into `dst`.
pub fn clone_tcp(host: &str, port: u16, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    let dst_repo = Repository::open(dst);
    let mut stream = TcpStream::connect((host, port))?;
    let advert =
        protocol::client_fetch_stream(&mut stream, "OP CLONE", &dst_repo.store().objects_dir())?;
    finish_clone(&dst_repo, &advert)?;
    info!(host, port, dst = %dst.display(), "cloned over tcp");
    Ok(())
}

/// Fetch a serving peer's head into the repository at `local`.
pub fn fetch_tcp(host: &str, port: u16, local: &Path, name: &str) -> Result<RefAdvert> {
    let local_repo = Repository::open(local);
    if !local_repo.is_initialized() {
        return Err(Error::NotInitialized(local.display().to_string()));
    }
    let mut stream = TcpStream::connect((host, port))?;
    let advert =
        protocol::client_fetch_stream(&mut stream, "OP FETCH", &local_repo.store().objects_dir())?;
    record_remote_ref(&local_repo, name, &advert)?;
    Ok(advert)
}

/// Push `branch` from the repository at `local` to a serving peer.
pub fn push_tcp(host: &str, port: u16, local: &Path, branch: &str) -> Result<()> {
    let local_repo = Repository::open(local);
    if !local_repo.is_initialized() {
        return Err(Error::NotInitialized(local.display().to_string()));
    }
    if local_repo.current_branch_ref()?.is_none() {
        return Err(Error::SymbolicHeadRequired);
    }
    let tip_hex = local_repo
        .refs()
        .read(&heads_ref(branch))?
        .ok_or_else(|| Error::UnknownBranch(branch.to_string()))?;
    let tip = ObjectId::from_hex(&tip_hex)?;

    let mut stream = TcpStream::connect((host, port))?;
    protocol::client_push_stream(
        &mut stream,
        &local_repo.store().objects_dir(),
        branch,
        &tip,
    )?;
    info!(host, port, branch, tip = %tip, "pushed over tcp");
    Ok(())
}

// ==================== Shared plumbing ====================

/// Set up HEAD and refs in a freshly cloned repository and materialize the
/// working tree when the remote advertised a tip.
fn finish_clone(dst: &Repository, advert: &RefAdvert) -> Result<()> {
    std::fs::create_dir_all(dst.control_dir().join("refs/heads"))?;
    std::fs::create_dir_all(dst.control_dir().join("refs/tags"))?;

    let refs = dst.refs();
    match (&advert.tip, advert.branch.as_str()) {
        (Some(tip), DETACHED) => refs.set_head_detached(tip)?,
        (Some(tip), branch) => {
            let refname = heads_ref(branch);
            refs.set_head_symbolic(&refname)?;
            refs.write(&refname, &tip.to_hex())?;
        }
        // Empty remote: start from the conventional unborn default branch.
        (None, DETACHED) => refs.set_head_symbolic(&heads_ref(DEFAULT_BRANCH))?,
        (None, branch) => refs.set_head_symbolic(&heads_ref(branch))?,
    }

    if let Some(tip) = &advert.tip {
        materialize(dst, tip)?;
    }
    Ok(())
}

fn record_remote_ref(local: &Repository, name: &str, advert: &RefAdvert) -> Result<()> {
    if advert.branch != DETACHED {
        if let Some(tip) = &advert.tip {
            local
                .refs()
                .write(&format!("refs/remotes/{name}/{}", advert.branch), &tip.to_hex())?;
        }
    }
    Ok(())
}

/// Write the commit's tree into the working directory and reset the index
/// to match.
pub(crate) fn materialize(repo: &Repository, commit: &ObjectId) -> Result<()> {
    let store = repo.store();
    let info = graph::read_commit(&store, commit)?;
    let snapshot = worktree::tree_snapshot(&store, &info.tree)?;
    worktree::apply_snapshot(repo.root(), &store, &snapshot)?;
    worktree::rewrite_index(repo.root(), &store, &snapshot)
}

/// Copy every regular file under `src` that is missing under `dst`,
/// preserving relative paths.
fn copy_missing_files(src: &Path, dst: &Path) -> Result<()> {
    for file in fsutil::walk_files(src)? {
        let rel = file.strip_prefix(src).unwrap_or(&file);
        let out = dst.join(rel);
        if !out.exists() {
            fsutil::ensure_parent(&out)?;
            std::fs::copy(&file, &out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_path() {
        assert_eq!(
            parse_remote("/srv/repo"),
            RemoteTarget::Path(PathBuf::from("/srv/repo"))
        );
        assert_eq!(
            parse_remote("relative/repo"),
            RemoteTarget::Path(PathBuf::from("relative/repo"))
        );
    }

    #[test]
    fn test_parse_remote_tcp() {
        assert_eq!(
            parse_remote("tcp://example.com:7000"),
            RemoteTarget::Tcp {
                host: "example.com".into(),
                port: 7000
            }
        );
        assert_eq!(
            parse_remote("tcp://example.com"),
            RemoteTarget::Tcp {
                host: "example.com".into(),
                port: DEFAULT_PORT
            }
        );
    }
}
