use autoscale_pool::{BoxError, PoolConfig, PoolInner};
use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex},
    time::Instant,
};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


/// Каждая поддиректория — кандидат в плагин: исполняемый файл с тем же именем,
/// который на `--describe` печатает свои метаданные.
fn describe_plugin(dir: &Path) -> Result<String, BoxError> {
    let name = dir
        .file_name()
        .ok_or_else(|| format!("bad plugin path {}", dir.display()))?;
    let output = Command::new(dir.join(name)).arg("--describe").output()?;
    if !output.status.success() {
        return Err(format!("{} exited with {}", dir.display(), output.status).into());
    }
    let meta = String::from_utf8(output.stdout)?.trim().to_string();
    if meta.is_empty() {
        return Err(format!("{} printed no metadata", dir.display()).into());
    }
    Ok(meta)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoscale_pool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("plugins"));

    let now = Instant::now();
    let pool = PoolInner::new(
        PoolConfig::default()
            .with_workers(2, 8)
            .with_queue_capacity(64)
            .with_scale_interval(Duration::from_millis(50))
            .with_idle_timeout(Duration::from_secs(1)),
    )?;
    pool.start();

    // Ленту ошибок читаем всё время работы, иначе воркеры встанут на полной ленте
    let results = pool.results();
    let collector = tokio::spawn(async move { results.collect().await });

    let registry = Arc::new(Mutex::new(Vec::new()));
    let mut candidates = 0usize;
    for entry in std::fs::read_dir(&root)? {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        candidates += 1;
        let registry = registry.clone();
        pool.submit_blocking(move |_| {
            let meta = describe_plugin(&dir)?;
            registry
                .lock()
                .map_err(|_| "plugin registry poisoned")?
                .push(meta);
            Ok(())
        })
        .await?;
    }

    pool.stop_draining().await;
    let failures = collector.await?;

    for err in &failures {
        warn!(error = %err, "plugin failed to load");
    }
    let loaded = registry.lock().map(|r| r.len()).unwrap_or(0);
    let metrics = pool.metrics();
    info!(
        candidates,
        loaded,
        failed = failures.len(),
        avg = ?metrics.avg_process_time,
        elapsed = ?now.elapsed(),
        "plugin discovery finished"
    );

    if !failures.is_empty() {
        return Err(format!("{} of {} plugins failed to load", failures.len(), candidates).into());
    }
    Ok(())
}
