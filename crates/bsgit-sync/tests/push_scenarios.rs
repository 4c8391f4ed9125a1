//! End-to-end push scenarios against the in-memory build service.

mod common;

use bsgit_git::{refs, Signature};
use bsgit_hash::GitOid;
use bsgit_sync::{push_package, Fetcher, Options, SyncError};

use common::{scratch, FakeService, Scratch};

const HOST: &str = "api.fake.example";

fn seeded_service() -> FakeService {
    let mut service = FakeService::new();
    service.add_user("jane", "jane@example.com", "Jane Doe");
    service.add_user("joe", "joe@example.com", "Joe Bloggs");
    service.add_revision(
        "prj",
        "pkg",
        100,
        "jane",
        "initial import",
        &[("f", b"one"), ("g", b"static")],
        None,
    );
    service
}

/// Fetch the package and park the branch at the remote tip.
fn fetch_and_branch(s: &Scratch, service: &mut FakeService, branch: &str) -> GitOid {
    let options = Options::default();
    let tip = Fetcher::new(service, &s.repo, &s.cache, &options)
        .fetch_package("prj", "pkg")
        .unwrap()
        .unwrap();
    s.repo.create_branch(branch, &tip.to_hex()).unwrap();
    tip
}

/// One local commit on top of `parent`, changing file `f`.
fn local_commit(s: &Scratch, parent: GitOid, content: &[u8], message: &str) -> GitOid {
    let parent_tree = s.repo.read_commit(&parent).unwrap().tree;
    let mut entries: Vec<(String, GitOid)> = s
        .repo
        .ls_tree(&parent_tree.to_hex())
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.oid))
        .collect();
    let new_blob = s.repo.hash_object(content).unwrap();
    for entry in &mut entries {
        if entry.0 == "f" {
            entry.1 = new_blob;
        }
    }
    let tree = s.repo.mktree(&entries).unwrap();
    let sig = Signature::utc("Jane Doe", "jane@example.com", 5000);
    s.repo
        .commit_tree(&tree, &[parent], &sig, &sig, message)
        .unwrap()
}

#[test]
fn push_single_commit() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");
    let local = local_commit(&s, remote_tip, b"two", "fix the thing");
    s.repo
        .command(&["branch", "-f", "work"])
        .arg(local.to_hex())
        .run_checked()
        .unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let outcome = push_package(&mut fetcher, "prj", "pkg", "work").unwrap();
    drop(fetcher);

    assert_eq!(outcome.pushed, 1);
    // only the changed file went over the wire
    assert_eq!(service.uploads, vec!["f".to_string()]);
    assert_eq!(service.commit_calls.len(), 1);
    let (user, comment, linkrev, keeplink) = &service.commit_calls[0];
    assert_eq!(user, "jane");
    assert_eq!(comment, "fix the thing");
    assert_eq!(*linkrev, None);
    assert!(!keeplink);

    // the server now has rev 2 with the new content
    let revisions = &service.packages[&("prj".to_string(), "pkg".to_string())];
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[1].rev, "2");
    assert_eq!(
        revisions[1].files.iter().find(|(n, _)| n == "f").unwrap().1,
        b"two"
    );

    // the local branch was conformed to the refreshed remote state
    assert_eq!(s.repo.branch_tip("work").unwrap(), Some(outcome.new_tip));
    assert_eq!(
        refs::read_ref(&s.repo, &refs::tracking_ref(HOST, "prj", "pkg")).unwrap(),
        Some(outcome.new_tip)
    );
    // the pushed chain was rewritten by the server round trip
    assert_ne!(outcome.new_tip, local);
    let new_info = s.repo.read_commit(&outcome.new_tip).unwrap();
    assert_eq!(new_info.parents, vec![remote_tip]);
    assert_eq!(new_info.message, "fix the thing");
}

#[test]
fn push_then_fetch_round_trips_content() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");
    let local = local_commit(&s, remote_tip, b"two", "change");
    s.repo
        .command(&["branch", "-f", "work"])
        .arg(local.to_hex())
        .run_checked()
        .unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let outcome = push_package(&mut fetcher, "prj", "pkg", "work").unwrap();
    let refetched = fetcher.fetch_package("prj", "pkg").unwrap().unwrap();
    drop(fetcher);

    assert_eq!(refetched, outcome.new_tip);
    // the pushed tree content survived the ping-pong byte for byte
    let local_tree = s.repo.read_commit(&local).unwrap().tree;
    let remote_tree = s.repo.read_commit(&refetched).unwrap().tree;
    assert_eq!(local_tree, remote_tree);
}

#[test]
fn push_refuses_diverged_branch() {
    let s = scratch();
    let mut service = seeded_service();
    fetch_and_branch(&s, &mut service, "work");

    // an unrelated root commit does not descend from the remote tip
    let blob = s.repo.hash_object(b"rogue").unwrap();
    let tree = s.repo.mktree(&[("f".to_string(), blob)]).unwrap();
    let sig = Signature::utc("Jane Doe", "jane@example.com", 5000);
    let rogue = s.repo.commit_tree(&tree, &[], &sig, &sig, "rogue").unwrap();
    s.repo
        .command(&["branch", "-f", "work"])
        .arg(rogue.to_hex())
        .run_checked()
        .unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let err = push_package(&mut fetcher, "prj", "pkg", "work").unwrap_err();
    drop(fetcher);

    assert!(matches!(err, SyncError::NotAChild { .. }));
    // no upload was attempted
    assert!(service.uploads.is_empty());
    assert!(service.commit_calls.is_empty());
}

#[test]
fn push_with_nothing_new_is_refused() {
    let s = scratch();
    let mut service = seeded_service();
    fetch_and_branch(&s, &mut service, "work");

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let err = push_package(&mut fetcher, "prj", "pkg", "work").unwrap_err();
    assert!(matches!(err, SyncError::NothingToPush { .. }));
}

#[test]
fn push_rejects_unmapped_committer() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");

    let parent_tree = s.repo.read_commit(&remote_tip).unwrap().tree;
    let sig = Signature::utc("Stranger", "stranger@nowhere.example", 5000);
    let local = s
        .repo
        .commit_tree(&parent_tree, &[remote_tip], &sig, &sig, "who dis")
        .unwrap();
    s.repo
        .command(&["branch", "-f", "work"])
        .arg(local.to_hex())
        .run_checked()
        .unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let err = push_package(&mut fetcher, "prj", "pkg", "work").unwrap_err();
    drop(fetcher);

    assert!(matches!(err, SyncError::UnmappedEmail { .. }));
    assert!(service.commit_calls.is_empty());
}

#[test]
fn push_rejects_n_way_merges() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");

    let sig = Signature::utc("Jane Doe", "jane@example.com", 5000);
    let tree = s.repo.read_commit(&remote_tip).unwrap().tree;
    let side_a = s
        .repo
        .commit_tree(&tree, &[remote_tip], &sig, &sig, "a")
        .unwrap();
    let side_b = s
        .repo
        .commit_tree(&tree, &[remote_tip], &sig, &sig, "b")
        .unwrap();
    let octopus = s
        .repo
        .commit_tree(&tree, &[remote_tip, side_a, side_b], &sig, &sig, "octopus")
        .unwrap();
    s.repo
        .command(&["branch", "-f", "work"])
        .arg(octopus.to_hex())
        .run_checked()
        .unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let err = push_package(&mut fetcher, "prj", "pkg", "work").unwrap_err();
    assert!(matches!(err, SyncError::NWayMerge { .. }));
}

#[test]
fn push_rejects_plain_merge_in_unlinked_package() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");

    let sig = Signature::utc("Jane Doe", "jane@example.com", 5000);
    let tree = s.repo.read_commit(&remote_tip).unwrap().tree;
    let side = s
        .repo
        .commit_tree(&tree, &[remote_tip], &sig, &sig, "side")
        .unwrap();
    let merge = s
        .repo
        .commit_tree(&tree, &[remote_tip, side], &sig, &sig, "merge")
        .unwrap();
    s.repo
        .command(&["branch", "-f", "work"])
        .arg(merge.to_hex())
        .run_checked()
        .unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let err = push_package(&mut fetcher, "prj", "pkg", "work").unwrap_err();
    assert!(matches!(err, SyncError::BadMerge { .. }));
}

#[test]
fn push_rejects_dirty_worktree() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");
    s.repo.checkout("work").unwrap();

    let local = local_commit(&s, remote_tip, b"two", "change");
    s.repo.reset_hard(&local).unwrap();
    // dirty the checked-out file
    std::fs::write(s.dir.path().join("f"), b"edited but not committed").unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let err = push_package(&mut fetcher, "prj", "pkg", "work").unwrap_err();
    assert!(matches!(err, SyncError::DirtyIndex));
}

#[test]
fn push_from_checked_out_branch_hard_resets() {
    let s = scratch();
    let mut service = seeded_service();
    let remote_tip = fetch_and_branch(&s, &mut service, "work");
    s.repo.checkout("work").unwrap();

    let local = local_commit(&s, remote_tip, b"two", "change");
    s.repo.reset_hard(&local).unwrap();

    let options = Options::default();
    let mut fetcher = Fetcher::new(&mut service, &s.repo, &s.cache, &options);
    let outcome = push_package(&mut fetcher, "prj", "pkg", "work").unwrap();
    drop(fetcher);

    assert_eq!(s.repo.branch_tip("work").unwrap(), Some(outcome.new_tip));
    // the worktree followed the reset
    assert_eq!(
        std::fs::read(s.dir.path().join("f")).unwrap(),
        b"two".to_vec()
    );
}
