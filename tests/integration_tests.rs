//! Scrape Load Generator Integration Tests
//!
//! Starts real targets on loopback ports and scrapes them over HTTP.

use std::net::IpAddr;
use std::time::Duration;

use scrape_loadgen::target::VALUE_RANGE;
use scrape_loadgen::{GeneratorConfig, LoadGenerator, TargetHandle, ValueSampler};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helpers
// =============================================================================

fn loopback_config(start_port: u16, num_targets: usize, seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        start_port,
        num_targets,
        seed,
        bind_host: IpAddr::from([127, 0, 0, 1]),
        update_interval: Duration::from_millis(50),
        strict_bind: true,
    }
}

/// Port the OS considers free right now.
fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Start a generator on some free contiguous port range.
async fn start_generator(
    num_targets: usize,
    seed: u64,
    update_interval: Duration,
) -> (LoadGenerator, Vec<TargetHandle>, CancellationToken) {
    for _ in 0..20 {
        let start_port = free_port();
        let mut config = loopback_config(start_port, num_targets, seed);
        config.update_interval = update_interval;
        let Ok(generator) = LoadGenerator::new(config) else {
            continue;
        };

        let cancel = CancellationToken::new();
        if let Ok(handles) = generator.start(&cancel).await {
            return (generator, handles, cancel);
        }
    }
    panic!("could not find {} free contiguous ports", num_targets);
}

async fn scrape(url: &str) -> (u16, Option<String>, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.text().await.unwrap();
    (status, content_type, body)
}

/// The single sample line of an exposition body, as (name, value).
fn sample_line(body: &str) -> (String, f64) {
    let mut samples = body.lines().filter(|line| !line.starts_with('#'));
    let line = samples.next().expect("no sample line");
    assert!(samples.next().is_none(), "more than one sample line");

    let (name, value) = line.split_once(' ').expect("malformed sample line");
    (name.to_string(), value.parse().expect("value is not a float"))
}

async fn stop(handles: Vec<TargetHandle>) {
    for handle in handles {
        handle.shutdown().await.unwrap();
    }
}

// =============================================================================
// Exposition
// =============================================================================

mod exposition_tests {
    use super::*;

    #[tokio::test]
    async fn test_each_target_serves_its_own_metric() {
        let (generator, handles, _cancel) = start_generator(4, 42, Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(
                handle.local_addr().port(),
                generator.config().start_port + i as u16
            );

            let (status, content_type, body) = scrape(&handle.metrics_url()).await;
            assert_eq!(status, 200);
            assert_eq!(
                content_type.as_deref(),
                Some("text/plain; version=0.0.4; charset=utf-8")
            );
            assert!(body.contains(&format!("# HELP metric_{} Metric for metric_{}", i, i)));
            assert!(body.contains(&format!("# TYPE metric_{} gauge", i)));

            let (name, value) = sample_line(&body);
            assert_eq!(name, format!("metric_{}", i));
            assert!(VALUE_RANGE.contains(&value), "value {} out of range", value);
        }

        stop(handles).await;
    }

    #[tokio::test]
    async fn test_targets_never_expose_each_other() {
        let (_generator, handles, _cancel) = start_generator(12, 7, Duration::from_millis(50)).await;

        for (i, handle) in handles.iter().enumerate() {
            let (_, _, body) = scrape(&handle.metrics_url()).await;
            let (name, _) = sample_line(&body);
            assert_eq!(name, format!("metric_{}", i));

            for j in (0..handles.len()).filter(|j| *j != i) {
                let other = format!("metric_{} ", j);
                assert!(
                    !body.lines().any(|line| line.starts_with(&other)
                        || line.contains(&format!(" {}", other))),
                    "target {} exposes metric_{}",
                    i,
                    j
                );
            }
        }

        stop(handles).await;
    }

    #[tokio::test]
    async fn test_consecutive_scrapes_keep_format() {
        let (_generator, handles, _cancel) = start_generator(1, 3, Duration::from_millis(20)).await;
        let url = handles[0].metrics_url();

        let (_, _, first) = scrape(&url).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        let (_, _, second) = scrape(&url).await;

        let comments = |body: &str| -> Vec<String> {
            body.lines()
                .filter(|line| line.starts_with('#'))
                .map(str::to_string)
                .collect()
        };
        assert_eq!(comments(&first), comments(&second));
        assert_eq!(sample_line(&first).0, sample_line(&second).0);

        stop(handles).await;
    }

    #[tokio::test]
    async fn test_unknown_paths_are_not_found() {
        let (_generator, handles, _cancel) = start_generator(2, 1, Duration::from_millis(50)).await;

        for handle in &handles {
            for path in ["/", "/metric", "/metrics/extra", "/healthz"] {
                let url = format!("http://{}{}", handle.local_addr(), path);
                let (status, _, body) = scrape(&url).await;
                assert_eq!(status, 404, "path {}", path);
                assert!(body.is_empty());
            }
        }

        stop(handles).await;
    }
}

// =============================================================================
// Values
// =============================================================================

mod value_tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_seed_reproduces_first_value_across_runs() {
        let interval = Duration::from_secs(3600);
        let expected = ValueSampler::new(11, 0).sample();

        for _ in 0..2 {
            let (_generator, handles, _cancel) = start_generator(1, 11, interval).await;
            tokio::time::sleep(Duration::from_millis(100)).await;

            let (_, _, body) = scrape(&handles[0].metrics_url()).await;
            assert_eq!(sample_line(&body).1, expected);

            stop(handles).await;
        }
    }

    #[tokio::test]
    async fn test_two_target_scenario() {
        let (generator, handles, _cancel) = start_generator(2, 1, Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let base = generator.config().start_port;

        let (_, _, first) = scrape(&format!("http://127.0.0.1:{}/metrics", base)).await;
        let (_, _, second) = scrape(&format!("http://127.0.0.1:{}/metrics", base + 1)).await;

        let (first_name, first_value) = sample_line(&first);
        let (second_name, second_value) = sample_line(&second);
        assert_eq!(first_name, "metric_0");
        assert_eq!(second_name, "metric_1");
        assert_ne!(first_value, second_value);

        stop(handles).await;
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_targets_runs_until_shutdown() {
        let generator = LoadGenerator::new(loopback_config(free_port(), 0, 42)).unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            generator
                .run(async {
                    let _ = rx.await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_releases_ports_on_shutdown() {
        let (generator, handles, _cancel) = start_generator(2, 5, Duration::from_millis(50)).await;
        let config = generator.config().clone();
        stop(handles).await;

        let generator = LoadGenerator::new(config.clone()).unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            generator
                .run(async {
                    let _ = rx.await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let (status, _, _) =
            scrape(&format!("http://127.0.0.1:{}/metrics", config.start_port)).await;
        assert_eq!(status, 200);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Both ports can be bound again once the generator has stopped.
        for offset in 0..2 {
            std::net::TcpListener::bind(("127.0.0.1", config.start_port + offset)).unwrap();
        }
    }

    #[tokio::test]
    async fn test_partial_bind_failure_keeps_other_targets() {
        let (generator, handles, _cancel) = start_generator(3, 9, Duration::from_millis(50)).await;
        let mut config = generator.config().clone();
        stop(handles).await;

        let blocker = std::net::TcpListener::bind(("127.0.0.1", config.start_port + 1)).unwrap();
        config.strict_bind = false;
        let generator = LoadGenerator::new(config).unwrap();

        let handles = generator.start(&CancellationToken::new()).await.unwrap();
        let names: Vec<&str> = handles.iter().map(|h| h.metric_name()).collect();
        assert_eq!(names, vec!["metric_0", "metric_2"]);

        stop(handles).await;
        drop(blocker);
    }
}
