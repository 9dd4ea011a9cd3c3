use std::fs;
use std::sync::Arc;

use padsync_common::attributes::{Attribute, AttributeSpan};
use padsync_common::changeset::ReplayReport;
use padsync_common::identity::{DocumentIdentity, StreamMode};
use padsync_common::protocol::session::{SessionEvent, SYNTAX_COLOR_AUTHOR};
use padsync_common::types::RunState;
use padsync_daemon::bridge::{Bridge, BridgeOptions};
use padsync_daemon::host::FsWorkspace;
use tempfile::TempDir;

fn workspace(files: &[(&str, &str)]) -> (TempDir, Arc<Bridge>) {
    let root = tempfile::tempdir().expect("workspace tempdir should be created");
    for (path, text) in files {
        let local = root.path().join(path);
        fs::create_dir_all(local.parent().expect("file has a parent")).expect("dirs should be created");
        fs::write(local, text).expect("file should be written");
    }
    let bridge = Arc::new(Bridge::new(Arc::new(FsWorkspace::new(root.path())), BridgeOptions::default()));
    (root, bridge)
}

fn session_events(bridge: &Bridge) -> Vec<SessionEvent> {
    bridge.outbox().poll(0, 1_000).events.into_iter().map(|event| event.event).collect()
}

#[tokio::test]
async fn session_edits_reach_the_file_on_disk() {
    let (root, bridge) = workspace(&[("demo/src/Main.java", "class Main {}\n")]);
    let pad_id = bridge.access_document_pad("pool.everyone", "/demo/src/Main.java").await.unwrap();

    // Insert "public " at the start, then replace "Main" with "App".
    bridge.submit_changeset(&pad_id, "Z:e>7+7$public ").await.unwrap();
    let report = bridge.submit_changeset(&pad_id, "Z:l<1=d-4+3$App").await.unwrap();

    assert_eq!(report, ReplayReport { edits: 1, old_len: 21, new_len: 20 });
    let on_disk = fs::read_to_string(root.path().join("demo/src/Main.java")).unwrap();
    assert_eq!(on_disk, "public class App {}\n");
    assert_eq!(bridge.read_pad(&pad_id).await.unwrap().text, on_disk);
}

#[tokio::test]
async fn multibyte_documents_are_addressed_by_character() {
    let (root, bridge) = workspace(&[("demo/notes.txt", "naïve 🙂 text")]);
    let pad_id = bridge.access_document_pad("bob", "/demo/notes.txt").await.unwrap();

    // Keep "naïve ", replace the emoji with "ok".
    bridge.submit_changeset(&pad_id, "Z:c>1=6-1+2$ok").await.unwrap();

    let on_disk = fs::read_to_string(root.path().join("demo/notes.txt")).unwrap();
    assert_eq!(on_disk, "naïve ok text");
}

#[tokio::test]
async fn rejected_changesets_leave_disk_untouched() {
    let (root, bridge) = workspace(&[("demo/a.txt", "hello")]);
    let pad_id = bridge.access_document_pad("bob", "/demo/a.txt").await.unwrap();

    let short_bank = bridge.submit_changeset(&pad_id, "Z:5>3=5+3$ab").await.unwrap_err();
    assert_eq!(short_bank.kind(), "MALFORMED_CHANGESET");
    let mismatch = bridge.submit_changeset(&pad_id, "Z:6>0=6$").await.unwrap_err();
    assert_eq!(mismatch.kind(), "DOCUMENT_LENGTH_MISMATCH");

    assert_eq!(fs::read_to_string(root.path().join("demo/a.txt")).unwrap(), "hello");
    assert_eq!(bridge.read_pad(&pad_id).await.unwrap().revision, 0);
}

#[tokio::test]
async fn reasserted_colors_share_pool_ids_and_keep_text() {
    let (root, bridge) = workspace(&[("demo/A.java", "int x;\nint y;\n")]);
    let pad_id = bridge.access_document_pad("bob", "/demo/A.java").await.unwrap();
    let keyword = || vec![Attribute::new("foreground", "127,0,85")];
    let spans = [
        AttributeSpan::new(3, 0, keyword()),
        AttributeSpan::new(4, 1, vec![]),
        AttributeSpan::new(3, 0, keyword()),
        AttributeSpan::new(4, 1, vec![]),
    ];

    let encoded = bridge.reassert_attributes(&pad_id, &spans).await.unwrap();

    assert_eq!(encoded, "Z:e>0*0=3|1=4*0=3|1=4$");
    let view = bridge.read_pad(&pad_id).await.unwrap();
    assert_eq!(view.text, "int x;\nint y;\n");
    assert_eq!(view.pool.num_to_attrib.len(), 1);
    // Attribute-only changesets never touch the host document.
    assert_eq!(fs::read_to_string(root.path().join("demo/A.java")).unwrap(), "int x;\nint y;\n");

    match session_events(&bridge).as_slice() {
        [SessionEvent::Changeset { author, changeset, .. }] => {
            assert_eq!(author, SYNTAX_COLOR_AUTHOR);
            assert_eq!(changeset, &encoded);
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn run_pad_collects_output_between_banners() {
    let (_root, bridge) = workspace(&[("demo/Main.java", "")]);
    let run_id = bridge.access_run_pad("bob", "/demo/Main.java").await.unwrap();
    assert_eq!(run_id.mode(), StreamMode::Run);

    bridge.run_state_change(&run_id, RunState::Launching).await.unwrap();
    bridge.run_state_change(&run_id, RunState::Running).await.unwrap();
    let red = [Attribute::new("foreground", "255,0,0")];
    bridge.run_output(&run_id, "line 1\n", &[]).await.unwrap();
    bridge.run_output(&run_id, "oops\n", &red).await.unwrap();
    bridge.run_state_change(&run_id, RunState::Terminated).await.unwrap();

    // A second launch starts from a clean pad.
    bridge.run_state_change(&run_id, RunState::Launching).await.unwrap();
    let view = bridge.read_pad(&run_id).await.unwrap();
    assert_eq!(view.text.lines().count(), 1);
    assert!(view.text.starts_with(" [ Started "));
    assert_eq!(view.run_state, Some(RunState::Launching));
}

#[tokio::test]
async fn identities_are_independent() {
    let (_root, bridge) = workspace(&[("demo/a.txt", "aaaa"), ("demo/b.txt", "bb")]);
    let alice = bridge.access_document_pad("alice", "/demo/a.txt").await.unwrap();
    let bob = bridge.access_document_pad("bob", "/demo/a.txt").await.unwrap();
    let other = bridge.access_document_pad("alice", "/demo/b.txt").await.unwrap();
    assert_ne!(alice, bob);

    let tasks = [
        (alice.clone(), "Z:4<4-4$"),
        (other.clone(), "Z:2>1=2+1$c"),
    ]
    .map(|(pad_id, changeset)| {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.submit_changeset(&pad_id, changeset).await })
    });
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(bridge.read_pad(&alice).await.unwrap().text, "");
    assert_eq!(bridge.read_pad(&other).await.unwrap().text, "bbc");
    // Bob's pad is a separate mirror seeded before Alice's edit.
    assert_eq!(bridge.read_pad(&bob).await.unwrap().text, "aaaa");
}

#[tokio::test]
async fn concurrent_operations_on_one_identity_serialize() {
    let (_root, bridge) = workspace(&[("demo/a.txt", "0123456789")]);
    let pad_id = bridge.access_document_pad("bob", "/demo/a.txt").await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let bridge = Arc::clone(&bridge);
            let pad_id = pad_id.clone();
            tokio::spawn(async move {
                let color = format!("{n},0,0");
                let spans = [AttributeSpan::new(10, 0, vec![Attribute::new("foreground", color)])];
                bridge.reassert_attributes(&pad_id, &spans).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut revisions: Vec<u64> = session_events(&bridge)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Changeset { revision, .. } => Some(revision),
            _ => None,
        })
        .collect();
    // Queued in the order they were applied.
    let in_queue_order = revisions.clone();
    revisions.sort_unstable();
    assert_eq!(in_queue_order, revisions);
    assert_eq!(revisions, (1..=16).collect::<Vec<_>>());

    let view = bridge.read_pad(&pad_id).await.unwrap();
    assert_eq!(view.revision, 16);
    assert_eq!(view.pool.num_to_attrib.len(), 16);
}

#[tokio::test]
async fn unknown_identity_keys_are_rejected() {
    let (_root, bridge) = workspace(&[]);
    assert!("bob".parse::<DocumentIdentity>().is_err());
    let error = bridge.access_document_pad("bob", "/demo/../../etc/passwd").await.unwrap_err();
    assert_eq!(error.kind(), "INVALID_IDENTITY");
}
