use std::path::{Path, PathBuf};

use keel_core::{Error, PushEvent, RepoLayout};

const SHA: &str = "4f2a9c1d7e3b5a60918273645f0e1d2c3b4a5968";

#[test]
fn derives_short_commit_and_app_name() {
    let push = PushEvent::new("alice", "myapp.git", SHA).unwrap();

    assert_eq!(push.user(), "alice");
    assert_eq!(push.commit(), SHA);
    assert_eq!(push.short_commit(), "4f2a9c1d");
    assert_eq!(push.app_name(), "myapp");
    assert_eq!(push.image_name(), "myapp:git-4f2a9c1d");
}

#[test]
fn repository_without_suffix_is_its_own_app_name() {
    let push = PushEvent::new("alice", "myapp", SHA).unwrap();

    assert_eq!(push.app_name(), "myapp");
}

#[test]
fn short_commit_keeps_short_ids_whole() {
    let push = PushEvent::new("alice", "myapp.git", "abc12").unwrap();

    assert_eq!(push.short_commit(), "abc12");
}

#[test]
fn rejects_empty_fields() {
    assert!(matches!(
        PushEvent::new("", "myapp.git", SHA),
        Err(Error::EmptyPushField { field: "user" })
    ));
    assert!(matches!(
        PushEvent::new("alice", " ", SHA),
        Err(Error::EmptyPushField {
            field: "repository"
        })
    ));
    assert!(matches!(
        PushEvent::new("alice", "myapp.git", ""),
        Err(Error::EmptyPushField { field: "commit" })
    ));
}

#[test]
fn rejects_repository_paths() {
    for bad in ["../etc", "a/b.git", ".git", "..", "dir\\app.git"] {
        assert!(
            matches!(
                PushEvent::new("alice", bad, SHA),
                Err(Error::InvalidRepository(_))
            ),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn layout_places_build_and_cache_under_repository() {
    let push = PushEvent::new("alice", "myapp.git", SHA).unwrap();
    let layout = RepoLayout::new(Path::new("/home/git"), &push);

    assert_eq!(layout.repo_dir, PathBuf::from("/home/git/myapp.git"));
    assert_eq!(layout.build_root, PathBuf::from("/home/git/myapp.git/build"));
    assert_eq!(layout.cache_dir, PathBuf::from("/home/git/myapp.git/cache"));
    assert_eq!(
        layout.lock_path(),
        PathBuf::from("/home/git/myapp.git/build.lock")
    );
}
