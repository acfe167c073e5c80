//! # Dockyard Localhost Machine Integration Tests
//!
//! File: cli/tests/localhost.rs
//!
//! ## Overview
//!
//! Runs real processes through `LocalhostInstanceProvider` with `/bin/sh`:
//! pid assignment, single start, liveness, kill and destroy.
//!
use dockyard::common::output::{CollectingLineConsumer, DevNullLineConsumer, LineConsumer};
use dockyard::core::config::LocalhostConfig;
use dockyard::core::error::DockyardError;
use dockyard::machine::localhost::{LocalhostInstanceProvider, RECIPE_TYPE};
use dockyard::machine::{
    Command, Instance, InstanceProcess, InstanceProvider, Machine, MachineConfig, PidSequence,
    Recipe,
};
use std::sync::Arc;
use std::time::Duration;

async fn instance(sequence: Arc<PidSequence>) -> Arc<dyn Instance> {
    let provider = LocalhostInstanceProvider::with_pid_sequence(LocalhostConfig::default(), sequence);
    let machine = Machine::new("machine1", MachineConfig::new("dev", "localhost"));
    provider
        .create_instance(
            &Recipe::new(RECIPE_TYPE, ""),
            machine,
            Arc::new(DevNullLineConsumer),
        )
        .await
        .unwrap()
}

async fn wait_until_alive(process: &Arc<dyn InstanceProcess>) {
    for _ in 0..100 {
        if process.is_alive().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("process {} never became alive", process.pid());
}

#[tokio::test]
async fn test_pids_are_sequential() {
    let instance = instance(Arc::new(PidSequence::new())).await;
    let mut pids = Vec::new();
    for name in ["a", "b", "c"] {
        let process = instance
            .create_process(Command::new(name, "true"), None)
            .await
            .unwrap();
        pids.push(process.pid());
    }
    assert_eq!(pids, vec![1, 2, 3]);
    // Processes that were never started are not listed.
    assert!(instance.get_processes().await.unwrap().is_empty());

    let sleeper = instance
        .create_process(Command::new("sleeper", "exec sleep 30"), None)
        .await
        .unwrap();
    assert_eq!(sleeper.pid(), 4);
    let running = sleeper.clone();
    let started = tokio::spawn(async move { running.start(None).await });
    wait_until_alive(&sleeper).await;
    let listed: Vec<u32> = instance
        .get_processes()
        .await
        .unwrap()
        .iter()
        .map(|p| p.pid())
        .collect();
    assert_eq!(listed, vec![4]);

    sleeper.kill().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), started)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_second_start_conflicts_while_running() {
    let instance = instance(Arc::new(PidSequence::new())).await;
    let process = instance
        .create_process(Command::new("sleeper", "exec sleep 30"), Some("out".into()))
        .await
        .unwrap();
    assert_eq!(process.output_channel(), Some("out"));

    let running = process.clone();
    let first = tokio::spawn(async move { running.start(None).await });
    wait_until_alive(&process).await;

    let err = process.start(None).await.unwrap_err();
    assert!(matches!(err, DockyardError::Conflict(_)), "got {:?}", err);
    assert_eq!(err.to_string(), "Process already started.");
    // The first run is untouched.
    assert!(process.is_alive().await);
    let found = instance.get_process(process.pid()).await.unwrap();
    assert_eq!(found.command().name, "sleeper");

    process.kill().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), first)
        .await
        .expect("start returns once the process is killed")
        .unwrap()
        .unwrap();
    assert!(!process.is_alive().await);
}

#[tokio::test]
async fn test_output_reaches_consumer() {
    let instance = instance(Arc::new(PidSequence::new())).await;
    let process = instance
        .create_process(Command::new("echo", "echo one; echo two >&2"), None)
        .await
        .unwrap();
    let collector = Arc::new(CollectingLineConsumer::new());
    let output: Arc<dyn LineConsumer> = collector.clone();
    process.start(Some(output)).await.unwrap();
    assert_eq!(collector.lines(), vec!["one", "two"]);
}

#[tokio::test]
async fn test_finished_process_is_not_found() {
    let instance = instance(Arc::new(PidSequence::new())).await;
    let process = instance
        .create_process(Command::new("quick", "exit 0"), None)
        .await
        .unwrap();
    process.start(None).await.unwrap();

    for _ in 0..2 {
        let err = process.check_alive().await.unwrap_err();
        assert!(err.is_not_found());
    }
    let err = instance.get_process(process.pid()).await.err().unwrap();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_destroy_kills_running_processes() {
    let instance = instance(Arc::new(PidSequence::new())).await;
    let process = instance
        .create_process(Command::new("sleeper", "exec sleep 30"), None)
        .await
        .unwrap();
    let running = process.clone();
    let started = tokio::spawn(async move { running.start(None).await });
    wait_until_alive(&process).await;

    instance.destroy().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), started)
        .await
        .expect("destroy ends the process")
        .unwrap()
        .unwrap();
    assert!(!process.is_alive().await);
}

#[tokio::test]
async fn test_runtime_exposes_configured_servers() {
    let instance = instance(Arc::new(PidSequence::new())).await;
    let runtime = instance.runtime().await.unwrap();
    // A non-dev machine with no configured servers exposes none.
    assert!(runtime.servers.is_empty());
    assert_eq!(instance.machine().id, "machine1");
}
