//! End-to-end lifecycle: init, stage, commit, status transitions.

use drift_core::config::FixedClock;
use drift_core::refs::heads_ref;
use drift_core::repo::DEFAULT_BRANCH;
use drift_core::{graph, tree, ChangeKind, HeadState, Identity, ObjectId, Repository};
use tempfile::TempDir;

fn identity() -> Identity {
    Identity {
        name: "User".into(),
        email: "u@example.com".into(),
    }
}

fn new_repo(tmp: &TempDir) -> Repository {
    let repo = Repository::with_clock(tmp.path(), Box::new(FixedClock(1_700_000_000, 0)));
    repo.init(&identity()).unwrap();
    repo
}

fn has(changes: &[drift_core::Change], kind: ChangeKind, path: &str) -> bool {
    changes.iter().any(|c| c.kind == kind && c.path == path)
}

#[test]
fn blob_tree_commit_trip() {
    let tmp = TempDir::new().unwrap();
    let repo = new_repo(&tmp);

    std::fs::write(tmp.path().join("a.txt"), b"hello\n").unwrap();
    repo.stage(&["a.txt".into()]).unwrap();
    let commit = repo.commit("first\n").unwrap();

    // The staged blob is addressed by the digest of its framed bytes.
    let expected_blob = ObjectId::from_data(b"blob 6\0hello\n");
    let idx = drift_core::Index::open(tmp.path().to_path_buf()).unwrap();
    assert_eq!(idx.snapshot().get("a.txt"), Some(&expected_blob.to_hex()));

    // The root tree holds exactly one file entry for a.txt.
    let store = repo.store();
    let info = graph::read_commit(&store, &commit).unwrap();
    let entries = tree::read_tree(&store, &info.tree).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mode, tree::MODE_FILE);
    assert_eq!(entries[0].name, "a.txt");
    assert_eq!(entries[0].id, expected_blob);

    // HEAD resolves to a parentless commit on the default branch.
    assert!(info.parents.is_empty());
    assert_eq!(info.message, "first\n");
    assert_eq!(repo.head_commit().unwrap(), Some(commit));
    assert_eq!(
        repo.refs().head().unwrap(),
        Some(HeadState::Symbolic(heads_ref(DEFAULT_BRANCH)))
    );
}

#[test]
fn status_transitions() {
    let tmp = TempDir::new().unwrap();
    let repo = new_repo(&tmp);

    // Stage a new file against an unborn HEAD: staged Added.
    std::fs::write(tmp.path().join("a.txt"), b"hello\n").unwrap();
    repo.stage(&["a.txt".into()]).unwrap();
    let st = repo.status().unwrap();
    assert!(has(&st.staged, ChangeKind::Added, "a.txt"));
    assert!(st.unstaged.is_empty());
    assert!(st.untracked.is_empty());

    // Commit: everything clean.
    repo.commit("first\n").unwrap();
    assert!(repo.status().unwrap().is_clean());

    // Modify the working file: unstaged Modified.
    std::fs::write(tmp.path().join("a.txt"), b"hello world\n").unwrap();
    let st = repo.status().unwrap();
    assert!(has(&st.unstaged, ChangeKind::Modified, "a.txt"));
    assert!(st.staged.is_empty());

    // Stage the change: staged Modified, unstaged empty.
    repo.stage(&["a.txt".into()]).unwrap();
    let st = repo.status().unwrap();
    assert!(has(&st.staged, ChangeKind::Modified, "a.txt"));
    assert!(st.unstaged.is_empty());

    // A loose file is untracked.
    std::fs::write(tmp.path().join("b.txt"), b"loose\n").unwrap();
    let st = repo.status().unwrap();
    assert_eq!(st.untracked, ["b.txt"]);

    // Delete the tracked working file without unstaging: unstaged Deleted.
    std::fs::remove_file(tmp.path().join("a.txt")).unwrap();
    let st = repo.status().unwrap();
    assert!(has(&st.unstaged, ChangeKind::Deleted, "a.txt"));
}

#[test]
fn unstage_returns_path_to_untracked() {
    let tmp = TempDir::new().unwrap();
    let repo = new_repo(&tmp);

    std::fs::write(tmp.path().join("a.txt"), b"data\n").unwrap();
    repo.stage(&["a.txt".into()]).unwrap();
    repo.unstage(&["a.txt".into()]).unwrap();

    let st = repo.status().unwrap();
    assert!(st.staged.is_empty());
    assert_eq!(st.untracked, ["a.txt"]);
}

#[test]
fn commit_in_detached_head_advances_head() {
    let tmp = TempDir::new().unwrap();
    let repo = new_repo(&tmp);

    std::fs::write(tmp.path().join("f"), b"v1").unwrap();
    repo.stage(&["f".into()]).unwrap();
    let c0 = repo.commit("c0\n").unwrap();

    repo.checkout(&c0.to_hex()).unwrap();
    std::fs::write(tmp.path().join("f"), b"v2").unwrap();
    repo.stage(&["f".into()]).unwrap();
    let c1 = repo.commit("c1\n").unwrap();

    assert_eq!(repo.refs().head().unwrap(), Some(HeadState::Detached(c1)));
    let info = graph::read_commit(&repo.store(), &c1).unwrap();
    assert_eq!(info.parents, vec![c0]);
    // the branch ref did not move
    assert_eq!(
        repo.refs().read(&heads_ref(DEFAULT_BRANCH)).unwrap(),
        Some(c0.to_hex())
    );
}
