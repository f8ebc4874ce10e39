mod common;

use common::{ScriptedModel, StubFactory, local_provider};
use futures::StreamExt;
use futures::future::join_all;
use mcp_conductor::config::ProviderStore;
use mcp_conductor::conversation::{ConversationOptions, TurnEvent};
use mcp_conductor::session::{AddProviderOutcome, ProviderStatus, SessionError, SessionRegistry};
use mcp_conductor::tooling::ProviderConnection;
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn registry_with(factory: Arc<StubFactory>, providers: &[&str], model: ScriptedModel) -> SessionRegistry {
    SessionRegistry::new(
        providers.iter().map(|name| local_provider(name)).collect(),
        factory,
        Arc::new(model),
        ConversationOptions::default(),
    )
}

#[tokio::test]
async fn concurrent_lookups_share_one_session() {
    let factory = Arc::new(StubFactory::new().with("files", vec!["read_file"]));
    let registry = Arc::new(registry_with(factory.clone(), &["files"], ScriptedModel::new(&[])));

    let lookups = (0..8).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.get_or_create("shared").await })
    });
    let sessions: Vec<_> = join_all(lookups)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("session"))
        .collect();

    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0], session));
    }
    assert_eq!(factory.built().len(), 1);
    assert_eq!(registry.sessions().await.len(), 1);
}

#[tokio::test]
async fn create_assigns_unique_ids() {
    let factory = Arc::new(StubFactory::new());
    let registry = registry_with(factory, &[], ScriptedModel::new(&[]));

    let first = registry.create().await.expect("first session");
    let second = registry.create().await.expect("second session");

    assert_ne!(first.id(), second.id());
    let listed: Vec<String> = registry.sessions().await.into_iter().map(|s| s.id).collect();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&first.id().to_string()));
}

#[tokio::test]
async fn teardown_releases_connections() {
    let factory = Arc::new(
        StubFactory::new()
            .with("files", vec!["read_file"])
            .with("search", vec!["web_search"]),
    );
    let registry = registry_with(factory.clone(), &["files", "search"], ScriptedModel::new(&[]));
    let session = registry.get_or_create("abc").await.expect("session");

    assert!(registry.teardown("abc").await);

    assert!(session.is_closed());
    assert!(registry.get("abc").await.is_none());
    for stub in factory.built() {
        assert_eq!(stub.release_count(), 1);
    }
    assert!(!registry.teardown("abc").await);
    assert!(!registry.teardown("never-existed").await);
}

#[tokio::test]
async fn shutdown_tears_down_every_session() {
    let factory = Arc::new(StubFactory::new().with("files", vec!["read_file"]));
    let registry = registry_with(factory.clone(), &["files"], ScriptedModel::new(&[]));
    let one = registry.get_or_create("one").await.expect("session one");
    let two = registry.get_or_create("two").await.expect("session two");

    registry.shutdown().await;

    assert!(one.is_closed());
    assert!(two.is_closed());
    assert!(registry.sessions().await.is_empty());
    assert!(factory.built().iter().all(|stub| stub.release_count() == 1));
}

#[tokio::test]
async fn failed_construction_leaves_no_entry() {
    let factory = Arc::new(
        StubFactory::new()
            .with("files", vec!["read_file"])
            .with_failing("broken"),
    );
    let registry = registry_with(factory.clone(), &["files", "broken"], ScriptedModel::new(&[]));

    let err = registry.get_or_create("doomed").await.err().expect("construction fails");

    assert!(matches!(err, SessionError::Provider { ref session_id, .. } if session_id == "doomed"));
    assert!(registry.get("doomed").await.is_none());
    assert!(registry.sessions().await.is_empty());
    assert!(factory.built().iter().all(|stub| stub.release_count() == 1));
}

#[tokio::test]
async fn added_provider_is_persisted_and_used_by_new_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("servers_config.json");
    fs::write(&path, r#"{"mcpServers": {}, "theme": "dark"}"#).expect("seed config");

    let factory = Arc::new(StubFactory::new().with("notes", vec!["add_note"]));
    let registry = registry_with(factory.clone(), &[], ScriptedModel::new(&[]))
        .with_store(ProviderStore::new(&path));
    let before = registry.get_or_create("before").await.expect("session before");

    let outcome = registry.add_provider(local_provider("notes")).await.expect("add");
    assert_eq!(outcome, AddProviderOutcome::Added);

    let probe = &factory.built()[0];
    assert_eq!(probe.connect_count(), 1);
    assert_eq!(probe.release_count(), 1);

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).expect("read config")).expect("json");
    assert_eq!(saved["mcpServers"]["notes"]["command"], "/usr/local/bin/notes");
    assert_eq!(saved["theme"], "dark");

    let again = registry.add_provider(local_provider("notes")).await.expect("add again");
    assert_eq!(again, AddProviderOutcome::AlreadyExists);
    assert_eq!(registry.providers().await.len(), 1);

    registry.get_or_create("after").await.expect("session after");
    assert_eq!(factory.built().len(), 2);
    assert_eq!(before.message_count().await, 1);
}

#[tokio::test]
async fn unreachable_provider_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("servers_config.json");
    let factory = Arc::new(StubFactory::new().with_failing("flaky"));
    let registry = registry_with(factory, &[], ScriptedModel::new(&[]))
        .with_store(ProviderStore::new(&path));

    let err = registry.add_provider(local_provider("flaky")).await.err().expect("probe fails");

    assert!(matches!(err, SessionError::Probe { ref name, .. } if name == "flaky"));
    assert!(registry.providers().await.is_empty());
    assert!(!path.exists());
}

#[tokio::test]
async fn session_streams_turn_events() {
    let factory = Arc::new(StubFactory::new());
    let registry = registry_with(factory, &[], ScriptedModel::new(&["Hello there! [TASK_COMPLETE]"]));
    let session = registry.get_or_create("chat").await.expect("session");

    let events: Vec<TurnEvent> = session.process_message("hi").collect().await;

    let text: String = events
        .iter()
        .filter(|event| event.is_fragment())
        .map(ToString::to_string)
        .collect();
    assert!(text.contains("Hello there!"));
    assert!(!text.contains("[TASK_COMPLETE]"));
    assert_eq!(session.message_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn reaper_removes_idle_sessions_but_not_busy_ones() {
    let factory = Arc::new(StubFactory::new().with("files", vec!["read_file"]));
    let registry = Arc::new(registry_with(factory.clone(), &["files"], ScriptedModel::hanging()));
    let idle = registry.get_or_create("idle").await.expect("idle session");
    let busy = registry.get_or_create("busy").await.expect("busy session");
    let _events = busy.process_message("keep working");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(busy.is_busy());

    let reaper = registry.spawn_reaper(Duration::from_secs(600), Duration::from_secs(1800));

    tokio::time::sleep(Duration::from_secs(1250)).await;
    assert!(registry.get("idle").await.is_some());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(registry.get("idle").await.is_none());
    assert!(idle.is_closed());
    assert!(registry.get("busy").await.is_some());
    assert!(!busy.is_closed());

    registry.shutdown().await;
    assert!(busy.is_closed());
    reaper.await.expect("reaper joins");
}

#[tokio::test(start_paused = true)]
async fn a_recent_turn_keeps_a_session_alive() {
    let factory = Arc::new(StubFactory::new());
    let registry = registry_with(factory, &[], ScriptedModel::repeating("Done. [TASK_COMPLETE]"));
    let session = registry.get_or_create("chatty").await.expect("session");
    let created = session.created_at();

    tokio::time::sleep(Duration::from_secs(1700)).await;
    let _: Vec<TurnEvent> = session.process_message("still here").collect().await;
    assert!(session.last_activity() > created);

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(registry.reap_idle(Duration::from_secs(1800)).await.is_empty());

    tokio::time::sleep(Duration::from_secs(1700)).await;
    assert_eq!(registry.reap_idle(Duration::from_secs(1800)).await, vec!["chatty".to_string()]);
    assert!(session.is_closed());
}

#[tokio::test]
async fn removed_provider_leaves_the_store_and_new_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("servers_config.json");
    fs::write(
        &path,
        r#"{"mcpServers": {"files": {"command": "/usr/local/bin/files"}, "notes": {"command": "/usr/local/bin/notes"}}}"#,
    )
    .expect("seed config");

    let factory = Arc::new(
        StubFactory::new()
            .with("files", vec!["read_file"])
            .with("notes", vec!["add_note"]),
    );
    let registry = registry_with(factory.clone(), &["files", "notes"], ScriptedModel::new(&[]))
        .with_store(ProviderStore::new(&path));
    let before = registry.get_or_create("before").await.expect("session before");

    assert!(registry.remove_provider("notes").await.expect("remove"));
    assert!(!registry.remove_provider("notes").await.expect("remove again"));

    let names: Vec<String> = registry.providers().await.into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["files"]);
    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).expect("read config")).expect("json");
    assert!(saved["mcpServers"].get("notes").is_none());
    assert!(before.is_connected_to("notes").await);

    registry.get_or_create("after").await.expect("session after");
    let built: Vec<String> = factory.built().iter().map(|stub| stub.name().to_string()).collect();
    assert_eq!(built, vec!["files", "notes", "files"]);
}

#[tokio::test]
async fn provider_status_follows_live_sessions() {
    let factory = Arc::new(
        StubFactory::new()
            .with("files", vec!["read_file"])
            .with("notes", vec!["add_note"]),
    );
    let registry = registry_with(factory, &["files"], ScriptedModel::new(&[]));
    let disconnected = |statuses: Vec<ProviderStatus>| {
        statuses.into_iter().all(|status| !status.connected)
    };
    assert!(disconnected(registry.provider_statuses().await));

    registry.get_or_create("live").await.expect("session");
    registry.add_provider(local_provider("notes")).await.expect("add");

    let statuses: Vec<(String, bool)> = registry
        .provider_statuses()
        .await
        .into_iter()
        .map(|status| (status.config.name, status.connected))
        .collect();
    assert_eq!(
        statuses,
        vec![("files".to_string(), true), ("notes".to_string(), false)]
    );

    assert!(registry.teardown("live").await);
    assert!(disconnected(registry.provider_statuses().await));
}
