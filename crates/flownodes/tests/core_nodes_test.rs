// crates/flownodes/tests/core_nodes_test.rs

use flowcore::{Flow, NodeHandle, NodeRef, NodeSettings, SharedState};
use flownodes::{register_core, CorePlugin, DynamicRunnerNode};
use flowruntime::{NodeFactory, Plugin, RegistrationError, RegistrationManager, SharedRegistry};
use serde_json::{json, Value};
use std::time::Duration;

async fn core_registry() -> SharedRegistry {
    let registry = RegistrationManager::new().into_shared();
    register_core(&registry).await.unwrap();
    registry
}

async fn node(registry: &SharedRegistry, kind: &str, config: Value) -> NodeHandle {
    registry
        .read()
        .await
        .create_node(kind, NodeSettings::new().with_config(config))
        .unwrap()
}

fn chain(nodes: Vec<NodeHandle>) -> Flow {
    let mut flow = Flow::new(NodeSettings::new()).unwrap();
    let mut prev: Option<NodeRef> = None;
    for handle in nodes {
        let current = flow.add_handle(handle);
        match prev {
            None => flow.set_start(current).unwrap(),
            Some(p) => {
                flow.next(p, current).unwrap();
            }
        }
        prev = Some(current);
    }
    flow
}

fn runner_flow(registry: &SharedRegistry, config: Option<Value>) -> Flow {
    let settings = match config {
        Some(config) => NodeSettings::new().with_config(config),
        None => NodeSettings::new(),
    };
    let runner = DynamicRunnerNode::new(settings, registry).unwrap();
    let mut flow = Flow::new(NodeSettings::new()).unwrap();
    flow.start(runner);
    flow
}

#[tokio::test]
async fn test_dynamic_runner_runs_spliced_node_next() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, None);

    let mut shared = SharedState::new();
    shared.insert("cfg", json!({ "kind": "core:debug", "config": {} }));

    let action = flow.run(&mut shared).await.unwrap();
    assert_eq!(action.as_deref(), Some("default"));
    assert_eq!(shared.get("debug_keys"), Some(&json!(["cfg"])));
}

#[tokio::test]
async fn test_dynamic_runner_unknown_kind() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, None);

    let mut shared = SharedState::new();
    shared.insert("cfg", json!({ "kind": "nope:missing" }));

    let err = flow.run(&mut shared).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("core:run-dynamic"), "{}", message);
    assert!(message.contains("No class registered for kind: nope:missing"), "{}", message);
}

#[tokio::test]
async fn test_dynamic_runner_rejects_invalid_definition_config() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, None);

    let mut shared = SharedState::new();
    shared.insert("cfg", json!({ "kind": "core:delay", "config": { "ms": -1 } }));

    let err = flow.run(&mut shared).await.unwrap_err();
    assert!(err.to_string().contains("ms must be at least 0"), "{}", err);
}

#[tokio::test]
async fn test_dynamic_runner_missing_definition() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, None);

    let err = flow.run(&mut SharedState::new()).await.unwrap_err();
    assert!(err.to_string().contains("Missing required input: cfg"), "{}", err);
}

#[tokio::test]
async fn test_dynamic_runner_reads_configured_key() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, Some(json!({ "key": "next" })));

    let mut shared = SharedState::new();
    shared.insert(
        "next",
        json!({ "kind": "core:set", "config": { "values": { "done": true } } }),
    );

    flow.run(&mut shared).await.unwrap();
    assert_eq!(shared.get("done"), Some(&json!(true)));
}

#[tokio::test]
async fn test_dynamic_splice_is_per_run() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, None);

    let mut first = SharedState::new();
    first.insert("cfg", json!({ "kind": "core:set", "config": { "values": { "a": 1 } } }));
    flow.run(&mut first).await.unwrap();
    assert_eq!(first.get("a"), Some(&json!(1)));

    let mut second = SharedState::new();
    second.insert("cfg", json!({ "kind": "core:debug" }));
    flow.run(&mut second).await.unwrap();
    assert!(second.get("a").is_none());
    assert_eq!(second.get("debug_keys"), Some(&json!(["cfg"])));
    assert_eq!(flow.len(), 1);
}

#[tokio::test]
async fn test_runner_fails_once_registry_is_dropped() {
    let registry = core_registry().await;
    let flow = runner_flow(&registry, None);
    drop(registry);

    let mut shared = SharedState::new();
    shared.insert("cfg", json!({ "kind": "core:debug" }));
    let err = flow.run(&mut shared).await.unwrap_err();
    assert!(err.to_string().contains("Registry is gone"), "{}", err);
}

#[tokio::test]
async fn test_core_plugin_registers_every_kind() {
    let registry = core_registry().await;
    let registry = registry.read().await;

    assert_eq!(
        registry.kinds(),
        vec![
            "core:debug",
            "core:delay",
            "core:json-parse",
            "core:json-stringify",
            "core:log-result",
            "core:run-dynamic",
            "core:set",
        ]
    );
    assert_eq!(registry.get_node_classes_by_category("core").len(), 7);
    assert_eq!(registry.owner_of("core:set"), Some(CorePlugin::NAME));

    let plugins = registry.plugins();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].name, "core");
    assert_eq!(plugins[0].version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_core_plugin_without_registry_skips_runner() {
    let classes = CorePlugin::new().node_classes().await.unwrap();
    let kinds: Vec<&str> = classes.iter().map(|f| f.kind()).collect();
    assert_eq!(classes.len(), 6);
    assert!(!kinds.contains(&"core:run-dynamic"));
}

#[tokio::test]
async fn test_second_core_registration_is_rejected() {
    let registry = core_registry().await;
    let err = register_core(&registry).await.unwrap_err();
    assert!(matches!(err, RegistrationError::PluginAlreadyRegistered(ref n) if n == "core"));
}

#[tokio::test]
async fn test_set_stringify_parse_chain() {
    let registry = core_registry().await;
    let flow = chain(vec![
        node(&registry, "core:set", json!({ "values": { "obj": { "a": [1, 2] } } })).await,
        node(&registry, "core:json-stringify", json!({ "from": "obj", "to": "text" })).await,
        node(&registry, "core:json-parse", json!({ "from": "text", "to": "back" })).await,
    ]);

    let mut shared = SharedState::new();
    flow.run(&mut shared).await.unwrap();

    assert_eq!(shared.get_str("text"), Some(r#"{"a":[1,2]}"#));
    assert_eq!(shared.get("back"), Some(&json!({ "a": [1, 2] })));
}

#[tokio::test]
async fn test_pretty_stringify() {
    let registry = core_registry().await;
    let flow = chain(vec![
        node(
            &registry,
            "core:json-stringify",
            json!({ "from": "obj", "to": "text", "pretty": true }),
        )
        .await,
    ]);

    let mut shared = SharedState::new();
    shared.insert("obj", json!({ "a": 1 }));
    flow.run(&mut shared).await.unwrap();
    assert_eq!(shared.get_str("text"), Some("{\n  \"a\": 1\n}"));
}

#[tokio::test]
async fn test_bad_json_takes_error_action() {
    let registry = core_registry().await;
    let flow = chain(vec![
        node(&registry, "core:json-parse", json!({ "from": "text", "to": "out" })).await,
    ]);

    let mut shared = SharedState::new();
    shared.insert("text", "{ nope");
    let action = flow.run(&mut shared).await.unwrap();

    assert_eq!(action.as_deref(), Some("error"));
    assert!(shared.get("out").is_none());
    assert!(shared
        .get_str("error")
        .unwrap()
        .starts_with("JSON parse error"));
}

#[tokio::test]
async fn test_log_result_routes_on_presence() {
    let registry = core_registry().await;
    let flow = chain(vec![node(&registry, "core:log-result", json!({})).await]);

    let mut missing = SharedState::new();
    assert_eq!(flow.run(&mut missing).await.unwrap().as_deref(), Some("error"));

    let mut present = SharedState::new();
    present.insert("result", 42);
    assert_eq!(flow.run(&mut present).await.unwrap().as_deref(), Some("default"));

    let flow = chain(vec![node(&registry, "core:log-result", json!({ "key": "answer" })).await]);
    let mut custom = SharedState::new();
    custom.insert("answer", "yes");
    assert_eq!(flow.run(&mut custom).await.unwrap().as_deref(), Some("default"));
}

#[tokio::test(start_paused = true)]
async fn test_delay_sleeps_for_configured_ms() {
    let registry = core_registry().await;
    let flow = chain(vec![node(&registry, "core:delay", json!({ "ms": 150 })).await]);

    let started = tokio::time::Instant::now();
    flow.run(&mut SharedState::new()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_invalid_configs_are_rejected_at_creation() {
    let registry = core_registry().await;
    let registry = registry.read().await;

    let err = registry
        .create_node("core:set", NodeSettings::new().with_config(json!({})))
        .err()
        .expect("set without values must fail");
    assert!(err.to_string().contains("values is required"), "{}", err);

    let err = registry
        .create_node(
            "core:json-parse",
            NodeSettings::new().with_config(json!({ "from": "", "to": "x" })),
        )
        .err()
        .expect("empty key must fail");
    assert!(
        err.to_string().contains("from must be at least 1 characters long"),
        "{}",
        err
    );
}

#[tokio::test]
async fn test_set_without_config_fails_at_run_time() {
    let registry = core_registry().await;
    let flow = chain(vec![
        registry
            .read()
            .await
            .create_node("core:set", NodeSettings::new())
            .unwrap(),
    ]);

    let err = flow.run(&mut SharedState::new()).await.unwrap_err();
    assert!(err.to_string().contains("Missing config: values"), "{}", err);
}
