use std::sync::Arc;
use std::time::Duration;
use nodelet_cgroup::*;
use nodelet_core::*;

/// A fake cgroup v2 root the current user can write to
fn fake_cgroup_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("cgroup.controllers"), "cpu io memory pids").unwrap();
    root
}

fn node_limits(group: &str) -> CgroupConfig {
    CgroupConfig::new(group)
        .with_cpu(Some(200_000), Some(100_000))
        .with_memory_limit(Some(MemorySize::from_mb(512)))
}

#[tokio::test]
async fn test_process_runtime_group_is_created() {
    let root = fake_cgroup_root();
    let backend = Arc::new(FsCgroupBackend::new(root.path()));

    let state = CgroupInitializer::new(backend, node_limits(LOCAL_APPS_GROUP), CgroupOperation::Create)
        .run()
        .await;

    assert_eq!(state, InitState::Applied { attempts: 1 });
    let group = root.path().join(LOCAL_APPS_GROUP);
    assert_eq!(std::fs::read_to_string(group.join("cpu.max")).unwrap(), "200000 100000");
    assert_eq!(std::fs::read_to_string(group.join("memory.max")).unwrap(), "536870912");
}

#[tokio::test(start_paused = true)]
async fn test_container_runtime_group_created_late() {
    let root = fake_cgroup_root();
    let backend = Arc::new(FsCgroupBackend::new(root.path()));
    let group = root.path().join(CONTAINER_RUNTIME_GROUP);

    // the container runtime shows up seven seconds after the agent
    let late_group = group.clone();
    let runtime = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        std::fs::create_dir(&late_group).unwrap();
    });

    let progress = CgroupInitializer::new(
        backend,
        node_limits(CONTAINER_RUNTIME_GROUP),
        CgroupOperation::Update,
    )
    .start(false)
    .await;

    let InitProgress::Detached(handle) = progress else {
        panic!("container runtime initialization must run in the background");
    };

    runtime.await.unwrap();
    let state = handle.await.unwrap();

    assert_eq!(state, InitState::Applied { attempts: 3 });
    assert_eq!(std::fs::read_to_string(group.join("cpu.max")).unwrap(), "200000 100000");
}

#[tokio::test]
async fn test_without_cgroup2_initialization_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    let backend = Arc::new(FsCgroupBackend::new(root.path()));

    let state = CgroupInitializer::new(backend, node_limits(LOCAL_APPS_GROUP), CgroupOperation::Create)
        .run()
        .await;

    assert_eq!(state, InitState::Skipped);
    assert!(!root.path().join(LOCAL_APPS_GROUP).exists());
}

#[tokio::test]
async fn test_invalid_config_aborts() {
    let root = fake_cgroup_root();
    let backend = Arc::new(FsCgroupBackend::new(root.path()));
    let config = CgroupConfig::new(LOCAL_APPS_GROUP).with_cpu(Some(-5), None);

    let state = CgroupInitializer::new(backend, config, CgroupOperation::Create)
        .run()
        .await;

    assert!(matches!(state, InitState::Aborted { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_mock_backend_records_configuration() {
    let backend = MockBackend::new().with_script([MockOutcome::NotFound]);
    let config = node_limits(CONTAINER_RUNTIME_GROUP);

    let state = CgroupInitializer::new(Arc::new(backend.clone()), config.clone(), CgroupOperation::Update)
        .run()
        .await;

    assert_eq!(state, InitState::Applied { attempts: 2 });
    let calls = backend.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(op, c)| *op == CgroupOperation::Update && *c == config));
}
