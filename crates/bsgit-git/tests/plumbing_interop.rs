//! Plumbing round trips against a real C git binary.

use bsgit_git::{refs, GitRepo, Signature};

fn scratch_repo() -> (tempfile::TempDir, GitRepo) {
    let dir = tempfile::tempdir().unwrap();
    let status = std::process::Command::new("git")
        .args(["init", "-q"])
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());
    let repo = GitRepo::discover("git", dir.path()).unwrap();
    (dir, repo)
}

#[test]
fn discover_finds_git_dir() {
    let (dir, repo) = scratch_repo();
    assert!(repo.git_dir().ends_with(".git"));
    assert!(repo.git_dir().starts_with(dir.path()));
}

#[test]
fn discover_fails_outside_repository() {
    let dir = tempfile::tempdir().unwrap();
    assert!(GitRepo::discover("git", dir.path()).is_err());
}

#[test]
fn blob_round_trip() {
    let (_dir, repo) = scratch_repo();
    let oid = repo.hash_object(b"some content\n").unwrap();
    assert_eq!(repo.read_blob(&oid).unwrap(), b"some content\n");
    assert_eq!(repo.object_type(&oid).unwrap(), "blob");
}

#[test]
fn streamed_blob_matches_buffered_read() {
    let (_dir, repo) = scratch_repo();
    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let oid = repo.hash_object(&content).unwrap();

    let mut streamed = Vec::new();
    repo.stream_blob(&oid, |chunk| streamed.extend_from_slice(chunk))
        .unwrap();
    assert_eq!(streamed, content);
}

#[test]
fn aborted_hash_object_writer_is_harmless() {
    let (_dir, repo) = scratch_repo();
    let mut writer = repo.hash_object_writer().unwrap();
    writer.write(b"partial").unwrap();
    writer.abort();
}

#[test]
fn mktree_and_ls_tree() {
    let (_dir, repo) = scratch_repo();
    let blob_a = repo.hash_object(b"a").unwrap();
    let blob_b = repo.hash_object(b"b").unwrap();
    // deliberately unsorted input
    let tree = repo
        .mktree(&[("zzz".to_string(), blob_b), ("aaa".to_string(), blob_a)])
        .unwrap();

    let entries = repo.ls_tree(&tree.to_hex()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "aaa");
    assert_eq!(entries[0].mode, "100644");
    assert_eq!(entries[0].kind, "blob");
    assert_eq!(entries[0].oid, blob_a);
    assert_eq!(entries[1].name, "zzz");
}

#[test]
fn commit_tree_and_read_back() {
    let (_dir, repo) = scratch_repo();
    let blob = repo.hash_object(b"v1").unwrap();
    let tree = repo.mktree(&[("file".to_string(), blob)]).unwrap();

    let author = Signature::utc("Jane", "jane@example.com", 1_234_567_890);
    let root = repo
        .commit_tree(&tree, &[], &author, &author, "initial import")
        .unwrap();

    let blob2 = repo.hash_object(b"v2").unwrap();
    let tree2 = repo.mktree(&[("file".to_string(), blob2)]).unwrap();
    let child = repo
        .commit_tree(&tree2, &[root], &author, &author, "second rev")
        .unwrap();

    let info = repo.read_commit(&child).unwrap();
    assert_eq!(info.tree, tree2);
    assert_eq!(info.parents, vec![root]);
    assert_eq!(info.author.ident.name, "Jane");
    assert_eq!(info.author.time, 1_234_567_890);
    assert_eq!(info.message, "second rev");

    assert!(repo.is_ancestor(&root, &child).unwrap());
    assert!(!repo.is_ancestor(&child, &root).unwrap());
}

#[test]
fn tracking_ref_write_and_resolve() {
    let (_dir, repo) = scratch_repo();
    let blob = repo.hash_object(b"x").unwrap();
    let tree = repo.mktree(&[("f".to_string(), blob)]).unwrap();
    let author = Signature::utc("A", "a@x", 100);
    let commit = repo.commit_tree(&tree, &[], &author, &author, "c").unwrap();

    let name = refs::tracking_ref("api.example.com", "devel:tools", "pkg");
    refs::write_ref(&repo, &name, &commit).unwrap();
    assert_eq!(refs::read_ref(&repo, &name).unwrap(), Some(commit));

    // untouched refs resolve to nothing
    assert_eq!(
        refs::read_ref(&repo, "refs/remotes/api.example.com/devel/tools/other").unwrap(),
        None
    );
}

#[test]
fn branch_and_config_round_trip() {
    let (_dir, repo) = scratch_repo();
    let blob = repo.hash_object(b"x").unwrap();
    let tree = repo.mktree(&[("f".to_string(), blob)]).unwrap();
    let author = Signature::utc("A", "a@x", 100);
    let commit = repo.commit_tree(&tree, &[], &author, &author, "c").unwrap();

    assert!(repo.head_is_unborn().unwrap());
    repo.create_branch("work", &commit.to_hex()).unwrap();
    assert_eq!(repo.branch_tip("work").unwrap(), Some(commit));
    assert_eq!(repo.branch_tip("missing").unwrap(), None);

    repo.config_set("branch.work.remote", "https://api.example.com")
        .unwrap();
    assert_eq!(
        repo.config_get("branch.work.remote").unwrap().as_deref(),
        Some("https://api.example.com")
    );
    assert_eq!(repo.config_get("branch.work.merge").unwrap(), None);
}
