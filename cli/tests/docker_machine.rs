//! # Dockyard Docker Machine Integration Tests
//!
//! File: cli/tests/docker_machine.rs
//!
//! ## Overview
//!
//! Runs the container-backed machine variant against `FakeDaemon` (see
//! `common.rs`): provisioning from `image` and `dockerfile` recipes,
//! cleanup of half-started containers, exec-backed processes, runtime info
//! and snapshots.
//!
mod common;
use common::{FakeDaemon, Reply};

use dockyard::common::output::{CollectingLineConsumer, DevNullLineConsumer, LineConsumer};
use dockyard::core::config::SnapshotConfig;
use dockyard::core::error::DockyardError;
use dockyard::machine::docker::{
    DockerInstance, DockerInstanceProvider, DOCKERFILE_RECIPE, IMAGE_RECIPE,
};
use dockyard::machine::{
    Command, Instance, InstanceProcess, InstanceProvider, Machine, MachineConfig, PidSequence,
    Recipe, ServerConf,
};
use std::sync::Arc;
use std::time::Duration;

const CREATED: &str = r#"{"Id":"c0ffee","Warnings":[]}"#;

/// One multiplexed attach frame.
fn frame(stream: u8, payload: &str) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload.as_bytes());
    out
}

fn raw_stream(body: Vec<u8>) -> Reply {
    Reply::raw(200, "application/vnd.docker.raw-stream", body)
}

fn machine(id: &str) -> Machine {
    Machine::new(
        id,
        MachineConfig::new("dev-machine", "docker")
            .with_env("LANG", "C")
            .with_server(
                ServerConf::new("4401")
                    .with_reference("wsagent")
                    .with_protocol("http")
                    .with_path("api"),
            ),
    )
    .with_workspace("ws1")
}

fn provider(daemon: &FakeDaemon) -> DockerInstanceProvider {
    DockerInstanceProvider::new(daemon.connector(), SnapshotConfig::default())
        .with_pid_sequence(Arc::new(PidSequence::new()))
}

fn instance(daemon: &FakeDaemon, snapshot: SnapshotConfig) -> DockerInstance {
    DockerInstance::new(
        "c1",
        machine("M1"),
        Arc::new(DevNullLineConsumer),
        daemon.connector(),
        snapshot,
        Arc::new(PidSequence::new()),
    )
}

async fn wait_for_line(logs: &CollectingLineConsumer, line: &str) {
    for _ in 0..100 {
        if logs.lines().iter().any(|l| l == line) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("'{}' never reached the logs: {:?}", line, logs.lines());
}

fn json_body(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_image_recipe_pulls_creates_and_attaches() {
    let daemon = FakeDaemon::start(vec![
        Reply::json(200, r#"{"status":"Pulling from library/busybox","id":"1.36"}"#),
        Reply::json(201, CREATED),
        Reply::empty(204),
        raw_stream(frame(1, "booted\n")),
        Reply::empty(204),
    ])
    .await;
    let logs = Arc::new(CollectingLineConsumer::new());
    let sink: Arc<dyn LineConsumer> = logs.clone();

    let instance = provider(&daemon)
        .create_instance(&Recipe::new(IMAGE_RECIPE, " busybox:1.36\n"), machine("m1"), sink)
        .await
        .unwrap();
    assert_eq!(instance.id(), "c0ffee");
    wait_for_line(&logs, "1.36: Pulling from library/busybox").await;
    wait_for_line(&logs, "booted").await;

    instance.destroy().await.unwrap();

    let requests = daemon.requests();
    assert_eq!(requests[0].path(), "/images/create");
    assert_eq!(requests[0].query("fromImage"), Some("busybox"));
    assert_eq!(requests[0].query("tag"), Some("1.36"));

    assert_eq!(requests[1].path(), "/containers/create");
    let config = json_body(&requests[1].body);
    assert_eq!(config["Image"], "busybox:1.36");
    assert_eq!(config["Env"], serde_json::json!(["LANG=C"]));
    assert_eq!(config["Labels"]["dockyard.machine.id"], "m1");
    assert!(config["ExposedPorts"].get("4401/tcp").is_some());
    assert_eq!(config["HostConfig"]["PublishAllPorts"], true);

    assert_eq!(requests[2].path(), "/containers/c0ffee/start");
    assert_eq!(requests[3].path(), "/containers/c0ffee/attach");
    assert_eq!(requests[3].query("stream"), Some("1"));

    assert_eq!(requests[4].method, "DELETE");
    assert_eq!(requests[4].path(), "/containers/c0ffee");
    assert_eq!(requests[4].query("force"), Some("1"));
    assert_eq!(requests[4].query("v"), Some("1"));
}

#[tokio::test]
async fn test_dockerfile_recipe_builds_image() {
    let daemon = FakeDaemon::start(vec![
        Reply::json(
            200,
            r#"{"stream":"Step 1/1 : FROM busybox\n"}
{"stream":"Successfully built 3f2a1b9c\n"}"#,
        ),
        Reply::json(201, CREATED),
        Reply::empty(204),
        raw_stream(Vec::new()),
    ])
    .await;
    let logs = Arc::new(CollectingLineConsumer::new());
    let sink: Arc<dyn LineConsumer> = logs.clone();

    let instance = provider(&daemon)
        .create_instance(&Recipe::new(DOCKERFILE_RECIPE, "FROM busybox\n"), machine("M2"), sink)
        .await
        .unwrap();
    assert_eq!(instance.id(), "c0ffee");
    assert!(logs
        .lines()
        .contains(&"Successfully built 3f2a1b9c".to_string()));

    let requests = daemon.requests();
    assert_eq!(requests[0].path(), "/build");
    assert_eq!(requests[0].query("t"), Some("dockyard-machine%2Fm2"));
    // gzip magic
    assert_eq!(&requests[0].body[..2], &[0x1f, 0x8b]);
    assert_eq!(json_body(&requests[1].body)["Image"], "3f2a1b9c");
}

#[tokio::test]
async fn test_container_removed_when_start_fails() {
    let daemon = FakeDaemon::start(vec![
        Reply::json(200, r#"{"status":"Image is up to date for busybox:latest"}"#),
        Reply::json(201, CREATED),
        Reply::text(500, "port is already allocated"),
        Reply::empty(204),
    ])
    .await;

    let err = provider(&daemon)
        .create_instance(
            &Recipe::new(IMAGE_RECIPE, "busybox"),
            machine("m3"),
            Arc::new(DevNullLineConsumer),
        )
        .await
        .err()
        .unwrap();
    assert_eq!(err.status(), Some(500));

    let requests = daemon.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[3].method, "DELETE");
    assert_eq!(requests[3].path(), "/containers/c0ffee");
    assert_eq!(requests[3].query("force"), Some("1"));
}

#[tokio::test]
async fn test_container_removed_when_attach_fails() {
    let daemon = FakeDaemon::start(vec![
        Reply::json(200, r#"{"status":"Image is up to date for busybox:latest"}"#),
        Reply::json(201, CREATED),
        Reply::empty(204),
        Reply::text(500, "attach failed"),
        Reply::empty(204),
    ])
    .await;

    let err = provider(&daemon)
        .create_instance(
            &Recipe::new(IMAGE_RECIPE, "busybox"),
            machine("m4"),
            Arc::new(DevNullLineConsumer),
        )
        .await
        .err()
        .unwrap();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("attach failed"));

    let requests = daemon.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[4].method, "DELETE");
    assert_eq!(requests[4].path(), "/containers/c0ffee");
    assert_eq!(requests[4].query("force"), Some("1"));
    assert_eq!(requests[4].query("v"), Some("1"));
}

#[tokio::test]
async fn test_exec_process_lifecycle() {
    let daemon = FakeDaemon::start(vec![
        // start
        Reply::json(201, r#"{"Id":"e1"}"#),
        raw_stream(frame(1, "one\n")),
        // check_alive x3
        Reply::json(200, r#"{"ID":"e1","Running":true}"#),
        Reply::json(200, r#"{"ID":"e1","Running":false,"ExitCode":0}"#),
        Reply::json(404, r#"{"message":"No such exec instance: e1"}"#),
        // kill
        Reply::json(201, r#"{"Id":"k1"}"#),
        Reply::empty(200),
    ])
    .await;
    let instance = instance(&daemon, SnapshotConfig::default());
    let process = instance
        .create_process(Command::new("echo", "echo one"), None)
        .await
        .unwrap();
    assert_eq!(process.pid(), 1);

    let collector = Arc::new(CollectingLineConsumer::new());
    let output: Arc<dyn LineConsumer> = collector.clone();
    process.start(Some(output)).await.unwrap();
    assert_eq!(collector.lines(), vec!["one"]);

    let err = process.start(None).await.unwrap_err();
    assert!(matches!(err, DockyardError::Conflict(_)), "got {:?}", err);
    assert_eq!(daemon.requests().len(), 2);

    process.check_alive().await.unwrap();
    assert!(process.check_alive().await.unwrap_err().is_not_found());
    assert!(process.check_alive().await.unwrap_err().is_not_found());

    process.kill().await.unwrap();

    let requests = daemon.requests();
    assert_eq!(requests[0].path(), "/containers/c1/exec");
    let create = json_body(&requests[0].body);
    assert_eq!(create["AttachStdout"], true);
    assert_eq!(create["Cmd"][0], "/bin/sh");
    assert!(create["Cmd"][2]
        .as_str()
        .unwrap()
        .starts_with("mkdir -p /tmp/dockyard/pids && echo $$ > /tmp/dockyard/pids/1.pid"));
    assert_eq!(requests[1].path(), "/exec/e1/start");
    assert_eq!(requests[2].path(), "/exec/e1/json");

    let kill = json_body(&requests[5].body);
    assert_eq!(requests[5].path(), "/containers/c1/exec");
    assert_eq!(kill["Cmd"][2], "kill -9 $(cat /tmp/dockyard/pids/1.pid)");
    assert_eq!(kill["AttachStdout"], false);
    assert_eq!(requests[6].path(), "/exec/k1/start");
    assert_eq!(json_body(&requests[6].body)["Detach"], true);
}

#[tokio::test]
async fn test_runtime_comes_from_inspect() {
    let daemon = FakeDaemon::start(vec![Reply::json(
        200,
        r#"{
            "Id": "c1",
            "Name": "/dev-machine",
            "Config": {"Image": "busybox", "Env": ["LANG=C"]},
            "NetworkSettings": {"Ports": {
                "4401/tcp": [{"HostIp": "0.0.0.0", "HostPort": "32768"}]
            }}
        }"#,
    )])
    .await;
    let instance = instance(&daemon, SnapshotConfig::default());

    let runtime = instance.runtime().await.unwrap();
    assert_eq!(runtime.env_variables["LANG"], "C");
    assert_eq!(runtime.properties["name"], "dev-machine");
    let agent = &runtime.servers["4401/tcp"];
    assert_eq!(agent.reference.as_deref(), Some("wsagent"));
    assert_eq!(agent.url.as_deref(), Some("http://127.0.0.1:32768/api"));

    // Computed once per instance.
    instance.runtime().await.unwrap();
    let requests = daemon.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path(), "/containers/c1/json");
}

#[tokio::test]
async fn test_snapshot_commits_and_pushes() {
    let daemon = FakeDaemon::start(vec![
        Reply::json(201, r#"{"Id":"sha256:abc"}"#),
        Reply::json(
            200,
            r#"{"status":"Pushed","progressDetail":{},"id":"5f70bf18a086"}
{"status":"latest: digest: sha256:feed size: 1364"}"#,
        ),
    ])
    .await;
    let snapshot = SnapshotConfig {
        registry: Some("registry.local:5000".into()),
        ..Default::default()
    };
    let instance = instance(&daemon, snapshot);

    let key = instance.save_to_snapshot("alice").await.unwrap();
    assert_eq!(key.repository, "machine_snapshot/m1");
    assert_eq!(key.tag.as_deref(), Some("latest"));
    assert_eq!(key.registry.as_deref(), Some("registry.local:5000"));
    assert_eq!(key.digest.as_deref(), Some("sha256:feed"));
    assert_eq!(
        key.image_reference(),
        "registry.local:5000/machine_snapshot/m1@sha256:feed"
    );

    let requests = daemon.requests();
    assert_eq!(requests[0].path(), "/commit");
    assert_eq!(requests[0].query("container"), Some("c1"));
    assert_eq!(
        requests[0].query("repo"),
        Some("registry.local%3A5000%2Fmachine_snapshot%2Fm1")
    );
    assert_eq!(requests[0].query("tag"), Some("latest"));
    assert_eq!(requests[0].query("author"), Some("alice"));
    assert_eq!(
        requests[1].path(),
        "/images/registry.local:5000/machine_snapshot/m1/push"
    );
    assert_eq!(requests[1].query("tag"), Some("latest"));
}

#[tokio::test]
async fn test_snapshot_without_registry_only_commits() {
    let daemon = FakeDaemon::start(vec![Reply::json(201, r#"{"Id":"sha256:abc"}"#)]).await;
    let instance = instance(&daemon, SnapshotConfig::default());

    let key = instance.save_to_snapshot("alice").await.unwrap();
    assert_eq!(key.image_reference(), "machine_snapshot/m1:latest");
    assert_eq!(key.digest, None);
    assert_eq!(daemon.requests().len(), 1);
}

#[tokio::test]
async fn test_snapshot_commit_failure() {
    let daemon = FakeDaemon::start(vec![Reply::text(500, "disk full")]).await;
    let instance = instance(&daemon, SnapshotConfig::default());

    let err = instance.save_to_snapshot("alice").await.unwrap_err();
    assert!(matches!(err, DockyardError::Snapshot(_)), "got {:?}", err);
    assert!(err.to_string().contains("disk full"));
}
