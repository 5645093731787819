#[cfg(test)]
mod tests {
    use autoscale_pool::{
        errors::BoxError,
        Pool,
        PoolConfig,
        PoolInner,
    };
    use std::{
        future::Future,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };
    use tokio_util::sync::CancellationToken;

    async fn measure<F, Fut, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    /// Фоновая выборка числа воркеров: (min, max) за время наблюдения
    struct WorkerSampler {
        running: Arc<AtomicBool>,
        min: Arc<AtomicUsize>,
        max: Arc<AtomicUsize>,
    }

    impl WorkerSampler {
        fn spawn(pool: &Pool) -> Self {
            let running = Arc::new(AtomicBool::new(true));
            let min = Arc::new(AtomicUsize::new(usize::MAX));
            let max = Arc::new(AtomicUsize::new(0));
            let (pool, r, lo, hi) = (pool.clone(), running.clone(), min.clone(), max.clone());
            tokio::spawn(async move {
                while r.load(Ordering::SeqCst) {
                    let count = pool.worker_count();
                    lo.fetch_min(count, Ordering::SeqCst);
                    hi.fetch_max(count, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            });
            Self { running, min, max }
        }

        fn finish(self) -> (usize, usize) {
            self.running.store(false, Ordering::SeqCst);
            (self.min.load(Ordering::SeqCst), self.max.load(Ordering::SeqCst))
        }
    }

    fn scaling_config() -> PoolConfig {
        PoolConfig::default()
            .with_workers(2, 4)
            .with_queue_capacity(10)
            .with_scale_interval(Duration::from_millis(50))
            .with_idle_timeout(Duration::from_millis(200))
    }

    async fn submit_sleepers(pool: &Pool, count: usize, each: Duration, done: &Arc<AtomicUsize>) {
        for _ in 0..count {
            let done = done.clone();
            pool.submit(move |_| async move {
                tokio::time::sleep(each).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_1_scale_up_and_down() {
        println!("\n=== LOAD TEST 1: Масштабирование вверх и вниз ===");
        let pool = PoolInner::new(scaling_config()).unwrap();
        pool.start();
        let sampler = WorkerSampler::spawn(&pool);

        let done = Arc::new(AtomicUsize::new(0));
        measure("20 jobs @ 10ms", || async {
            submit_sleepers(&pool, 20, Duration::from_millis(10), &done).await;
            assert!(pool.join_all_timeout(Duration::from_secs(10)).await);
        })
        .await;
        let drained_at = Instant::now();

        let (lowest, highest) = sampler.finish();
        println!("  Воркеров под нагрузкой: min {}, max {}", lowest, highest);
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert!(highest > 2, "Пул должен вырасти под нагрузкой");
        assert!(highest <= 4, "Не больше max_workers");
        assert!(lowest >= 2, "Не меньше min_workers");

        // Возврат к min_workers: idle_timeout, затем по одному воркеру за интервал
        let config = scaling_config();
        let surplus = (config.max_workers - config.min_workers) as u32;
        let deadline = config.idle_timeout
            + config.scale_interval * surplus
            + Duration::from_millis(100);
        while pool.worker_count() > 2 {
            assert!(drained_at.elapsed() < deadline, "Пул не сжался до min_workers");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        println!("  Сжатие до min_workers за {:?}", drained_at.elapsed());
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(pool.metrics().active_workers, 2);

        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_2_bounds_hold_under_pressure() {
        println!("\n=== LOAD TEST 2: Границы числа воркеров ===");
        let config = PoolConfig::default()
            .with_workers(1, 3)
            .with_queue_capacity(8)
            .with_scale_interval(Duration::from_millis(10))
            .with_idle_timeout(Duration::from_millis(20));
        let pool = PoolInner::new(config).unwrap();
        pool.start();
        let sampler = WorkerSampler::spawn(&pool);

        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            measure("100 jobs @ 2ms", || async {
                submit_sleepers(&pool, 100, Duration::from_millis(2), &done).await;
                assert!(pool.join_all_timeout(Duration::from_secs(10)).await);
            })
            .await;
            // Простой между волнами, чтобы пул успел сжаться
            tokio::time::sleep(Duration::from_millis(80)).await;
        }

        let (lowest, highest) = sampler.finish();
        println!("  Воркеров: min {}, max {}", lowest, highest);
        assert_eq!(done.load(Ordering::SeqCst), 300);
        assert!(lowest >= 1);
        assert!(highest <= 3);
        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_3_concurrent_submitters() {
        println!("\n=== LOAD TEST 3: Конкурентные отправители ===");
        let config = PoolConfig::default()
            .with_workers(2, 8)
            .with_queue_capacity(32)
            .with_scale_interval(Duration::from_millis(20));
        let pool = PoolInner::new(config).unwrap();
        pool.start();

        let counter = Arc::new(AtomicUsize::new(0));
        let results = pool.results();
        let collector = tokio::spawn(async move { results.collect().await });

        measure("8 x 250 mixed submissions", || async {
            let submitters: Vec<_> = (0..8)
                .map(|s| {
                    let pool = pool.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        for i in 0..250 {
                            let counter = counter.clone();
                            let job = move |_: CancellationToken| async move {
                                counter.fetch_add(1, Ordering::SeqCst);
                                let result: Result<(), BoxError> = if i % 50 == 0 {
                                    Err("scheduled failure".into())
                                } else {
                                    Ok(())
                                };
                                result
                            };
                            if s % 2 == 0 {
                                pool.submit(job).await.unwrap();
                            } else {
                                pool.submit_priority(job, i % 7).await.unwrap();
                            }
                        }
                    })
                })
                .collect();
            for s in submitters {
                s.await.unwrap();
            }
            pool.stop_draining().await;
        })
        .await;

        let failures = collector.await.unwrap();
        let metrics = pool.metrics();
        assert_eq!(counter.load(Ordering::SeqCst), 2_000);
        assert_eq!(metrics.completed_jobs + metrics.failed_jobs, 2_000);
        assert_eq!(failures.len(), 8 * 5);
        assert_eq!(metrics.failed_jobs, failures.len());
        println!("  Success rate: {:.1}%", metrics.success_rate() * 100.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_4_long_jobs_never_exceed_max_workers() {
        println!("\n=== LOAD TEST 4: Долгие задачи и сжатие пула ===");
        // idle_timeout намного короче задачи: занятый воркер не должен считаться простаивающим
        let config = PoolConfig::default()
            .with_workers(1, 2)
            .with_queue_capacity(8)
            .with_scale_interval(Duration::from_millis(10))
            .with_idle_timeout(Duration::from_millis(20));
        let pool = PoolInner::new(config).unwrap();
        pool.start();
        let sampler = WorkerSampler::spawn(&pool);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            measure("3 jobs @ 150ms", || async {
                for _ in 0..3 {
                    let (running, peak) = (running.clone(), peak.clone());
                    pool.submit(move |_| async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<(), BoxError>(())
                    })
                    .await
                    .unwrap();
                }
                assert!(pool.join_all_timeout(Duration::from_secs(10)).await);
            })
            .await;
        }

        let (_, highest) = sampler.finish();
        let peak = peak.load(Ordering::SeqCst);
        println!("  Пик одновременных задач: {}, воркеров: {}", peak, highest);
        assert!(peak <= 2, "Одновременно выполнялось {peak} задач при max_workers = 2");
        assert!(highest <= 2);
        assert_eq!(pool.metrics().completed_jobs, 9);
        pool.stop().await;
    }
}
