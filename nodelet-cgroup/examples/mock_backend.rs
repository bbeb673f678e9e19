//! Mock backend example: a group that appears after a few attempts

use std::sync::Arc;
use std::time::Duration;

use nodelet_cgroup::{
    CONTAINER_RUNTIME_GROUP, CgroupConfig, CgroupInitializer, CgroupOperation, InitProgress,
    MockBackend, MockOutcome,
};
use nodelet_core::{CpuCores, MemorySize};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .init();

    println!("Testing the cgroup initializer with MockBackend (no filesystem required)\n");

    // the first two attempts find no group
    let backend = MockBackend::new().with_script([MockOutcome::NotFound, MockOutcome::NotFound]);

    let (quota, period) = CpuCores::new(2).to_quota();
    let config = CgroupConfig::new(CONTAINER_RUNTIME_GROUP)
        .with_cpu(Some(quota), Some(period))
        .with_memory_limit(Some(MemorySize::from_gb(4)));

    let initializer = CgroupInitializer::new(Arc::new(backend.clone()), config, CgroupOperation::Update)
        .with_retry_delay(Duration::from_millis(200));

    let InitProgress::Detached(handle) = initializer.start(false).await else {
        return Err("expected a background initializer".into());
    };
    println!("Initializer running in background");

    let state = handle.await?;
    println!("Final state: {state:?}");
    println!("Backend calls: {}", backend.call_count().await);

    Ok(())
}
