//! Sync scenarios over local paths and a real TCP session: clone, fetch,
//! push fast-forward enforcement, and pull integration.

use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::thread::JoinHandle;

use drift_core::config::FixedClock;
use drift_core::refs::heads_ref;
use drift_core::{protocol, remote, Error, Identity, MergeOutcome, ObjectId, Repository};
use tempfile::TempDir;

fn new_repo(root: &Path) -> Repository {
    let repo = Repository::with_clock(root, Box::new(FixedClock(1_700_000_000, 0)));
    repo.init(&Identity {
        name: "User".into(),
        email: "u@example.com".into(),
    })
    .unwrap();
    repo
}

fn write_and_commit(repo: &Repository, path: &str, content: &str, message: &str) -> ObjectId {
    std::fs::write(repo.root().join(path), content).unwrap();
    repo.stage(&[path.to_string()]).unwrap();
    repo.commit(message).unwrap()
}

/// Serve `sessions` protocol sessions for the repository at `root` on an
/// ephemeral localhost port, one client at a time.
fn serve(root: &Path, sessions: usize) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let control = root.join(drift_core::repo::CONTROL_DIR);
    let handle = std::thread::spawn(move || {
        for _ in 0..sessions {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = protocol::serve_session(&mut stream, &control);
        }
    });
    (addr, handle)
}

#[test]
fn tcp_clone_materializes_working_tree() {
    let remote_dir = TempDir::new().unwrap();
    let origin = new_repo(remote_dir.path());
    let tip = write_and_commit(&origin, "base.txt", "base\n", "t0\n");

    let local_dir = TempDir::new().unwrap();
    let dest = local_dir.path().join("clone");

    let (addr, handle) = serve(remote_dir.path(), 1);
    remote::clone_tcp(&addr.ip().to_string(), addr.port(), &dest).unwrap();
    handle.join().unwrap();

    let local = Repository::open(&dest);
    assert_eq!(local.head_commit().unwrap(), Some(tip));
    assert_eq!(
        std::fs::read_to_string(dest.join("base.txt")).unwrap(),
        "base\n"
    );
    assert!(local.status().unwrap().is_clean());
}

#[test]
fn tcp_push_fast_forward_rule() {
    // R at t0.
    let remote_dir = TempDir::new().unwrap();
    let origin = new_repo(remote_dir.path());
    write_and_commit(&origin, "base.txt", "base\n", "t0\n");

    // Clone R to L.
    let local_dir = TempDir::new().unwrap();
    let dest = local_dir.path().join("clone");
    let (addr, handle) = serve(remote_dir.path(), 1);
    remote::clone_tcp(&addr.ip().to_string(), addr.port(), &dest).unwrap();
    handle.join().unwrap();

    // L commits t1 and pushes: the remote ref advances.
    let local = Repository::open(&dest);
    let t1 = write_and_commit(&local, "added.txt", "from L\n", "t1\n");

    let (addr, handle) = serve(remote_dir.path(), 1);
    local
        .push(&format!("tcp://{}:{}", addr.ip(), addr.port()), "master")
        .unwrap();
    handle.join().unwrap();
    assert_eq!(
        origin.refs().read(&heads_ref("master")).unwrap(),
        Some(t1.to_hex())
    );

    // R advances on its own to t2 (not an ancestor of anything L will make).
    write_and_commit(&origin, "remote.txt", "from R\n", "t2\n");

    // L commits t3 on top of t1; pushing now violates fast-forward.
    write_and_commit(&local, "added.txt", "more from L\n", "t3\n");
    let (addr, handle) = serve(remote_dir.path(), 1);
    let err = local
        .push(&format!("tcp://{}:{}", addr.ip(), addr.port()), "master")
        .unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, Error::NonFastForward(_)), "{err:?}");
}

#[test]
fn tcp_fetch_records_remote_tracking_ref() {
    let remote_dir = TempDir::new().unwrap();
    let origin = new_repo(remote_dir.path());
    let tip = write_and_commit(&origin, "base.txt", "base\n", "t0\n");

    let local_dir = TempDir::new().unwrap();
    let local = new_repo(local_dir.path());

    let (addr, handle) = serve(remote_dir.path(), 1);
    let advert = local
        .fetch(&format!("tcp://{}:{}", addr.ip(), addr.port()), "origin")
        .unwrap();
    handle.join().unwrap();

    assert_eq!(advert.branch, "master");
    assert_eq!(advert.tip, Some(tip));
    assert_eq!(
        local.refs().read("refs/remotes/origin/master").unwrap(),
        Some(tip.to_hex())
    );
    // fetched objects are readable locally
    assert!(local.store().contains(&tip));
}

#[test]
fn local_clone_push_fetch() {
    let src_dir = TempDir::new().unwrap();
    let origin = new_repo(src_dir.path());
    let t0 = write_and_commit(&origin, "f.txt", "base\n", "t0\n");

    // Clone by path.
    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    Repository::clone_from(&src_dir.path().display().to_string(), &dest).unwrap();
    let local = Repository::open(&dest);
    assert_eq!(local.head_commit().unwrap(), Some(t0));
    assert_eq!(std::fs::read_to_string(dest.join("f.txt")).unwrap(), "base\n");

    // Fast-forward push by path.
    let t1 = write_and_commit(&local, "f.txt", "changed\n", "t1\n");
    local
        .push(&src_dir.path().display().to_string(), "master")
        .unwrap();
    assert_eq!(
        origin.refs().read(&heads_ref("master")).unwrap(),
        Some(t1.to_hex())
    );

    // Diverge the origin; a further push from the stale local must fail.
    origin.checkout(&t0.to_hex()).unwrap();
    origin.checkout("master").unwrap();
    write_and_commit(&origin, "g.txt", "diverged\n", "t2\n");
    write_and_commit(&local, "f.txt", "stale line\n", "t3\n");
    assert!(matches!(
        local.push(&src_dir.path().display().to_string(), "master"),
        Err(Error::NonFastForward(_))
    ));

    // Fetch records the tracking ref.
    let advert = local
        .fetch(&src_dir.path().display().to_string(), "origin")
        .unwrap();
    assert_eq!(advert.branch, "master");
    assert_eq!(
        local.refs().read("refs/remotes/origin/master").unwrap(),
        advert.tip.map(|t| t.to_hex())
    );
}

#[test]
fn pull_fast_forwards_when_behind() {
    let src_dir = TempDir::new().unwrap();
    let origin = new_repo(src_dir.path());
    write_and_commit(&origin, "f.txt", "base\n", "t0\n");

    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    Repository::clone_from(&src_dir.path().display().to_string(), &dest).unwrap();
    let local = Repository::open(&dest);

    // Origin moves ahead; pull fast-forwards the local branch.
    let t1 = write_and_commit(&origin, "f.txt", "ahead\n", "t1\n");
    let outcome = local
        .pull(&src_dir.path().display().to_string(), "origin")
        .unwrap();
    assert_eq!(outcome, MergeOutcome::FastForward(t1));
    assert_eq!(
        std::fs::read_to_string(dest.join("f.txt")).unwrap(),
        "ahead\n"
    );
    assert_eq!(local.head_commit().unwrap(), Some(t1));
}

#[test]
fn pull_merges_diverged_histories() {
    let src_dir = TempDir::new().unwrap();
    let origin = new_repo(src_dir.path());
    write_and_commit(&origin, "base.txt", "base\n", "t0\n");

    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    Repository::clone_from(&src_dir.path().display().to_string(), &dest).unwrap();
    let local = Repository::open(&dest);

    // Both sides advance with non-overlapping files.
    write_and_commit(&origin, "remote.txt", "remote\n", "t1\n");
    write_and_commit(&local, "local.txt", "local\n", "t2\n");

    let outcome = local
        .pull(&src_dir.path().display().to_string(), "origin")
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged(_)), "{outcome:?}");
    assert!(dest.join("remote.txt").exists());
    assert!(dest.join("local.txt").exists());

    // The temporary merge ref is cleaned up.
    assert_eq!(
        local.refs().read(&heads_ref(".pull_merge_tmp")).unwrap(),
        None
    );
}

#[test]
fn push_requires_symbolic_head() {
    let src_dir = TempDir::new().unwrap();
    let origin = new_repo(src_dir.path());
    let t0 = write_and_commit(&origin, "f.txt", "base\n", "t0\n");

    let work = TempDir::new().unwrap();
    let dest = work.path().join("clone");
    Repository::clone_from(&src_dir.path().display().to_string(), &dest).unwrap();
    let local = Repository::open(&dest);

    local.checkout(&t0.to_hex()).unwrap(); // detach
    assert!(matches!(
        local.push(&src_dir.path().display().to_string(), "master"),
        Err(Error::SymbolicHeadRequired)
    ));
}

#[test]
fn unknown_op_gets_err_line() {
    use std::io::{Read, Write};

    let remote_dir = TempDir::new().unwrap();
    new_repo(remote_dir.path());

    let (addr, handle) = serve(remote_dir.path(), 1);
    let mut stream = std::net::TcpStream::connect(addr).unwrap();
    stream.write_all(b"HELLO 1\nOP DESTROY\n").unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    handle.join().unwrap();
    assert_eq!(response, "ERR unknown op\n");
}
