//! End-to-end fan-out benchmark for Vox.
//!
//! Runs one publisher against many subscribers, each draining its mailbox
//! on its own task, and reports sustained delivery throughput.
//!
//! ```bash
//! # 64 subscribers, settings from vox.toml or VOX_* variables
//! e2e_fanout 64
//!
//! # Also expose Prometheus metrics
//! VOX_METRICS_PORT=9090 e2e_fanout 64
//! ```

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vox_core::{Config, Message, Publisher, Subscriber};

const TOPIC: &str = "benchmark";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vox_core=info,e2e_fanout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    init_metrics()?;

    let num_subscribers = std::env::args()
        .nth(1)
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("Subscriber count must be a number")?
        .unwrap_or(16);

    info!(num_subscribers, ?config, "Starting fan-out benchmark");
    run_fanout_benchmark(config, num_subscribers).await;

    Ok(())
}

fn init_metrics() -> Result<()> {
    let Ok(port) = std::env::var("VOX_METRICS_PORT") else {
        return Ok(());
    };

    let addr: SocketAddr = format!("0.0.0.0:{}", port)
        .parse()
        .context("Invalid VOX_METRICS_PORT")?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    vox_core::metrics::describe_metrics();

    info!("Metrics server listening on {}", addr);
    Ok(())
}

async fn run_fanout_benchmark(config: Config, num_subscribers: usize) {
    let publisher = Arc::new(Publisher::with_config(config.publisher.clone()));
    let received = Arc::new(AtomicU64::new(0));

    let mut subscribers = Vec::with_capacity(num_subscribers);
    let mut consumers = Vec::with_capacity(num_subscribers);
    for _ in 0..num_subscribers {
        let sub = Subscriber::with_config(config.subscriber.clone());
        sub.subscribe(TOPIC);
        publisher.add_subscriber(&sub);

        let counter = Arc::clone(&received);
        let consumer = sub.clone();
        consumers.push(tokio::spawn(async move {
            consumer
                .receive_loop(|_| {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .await;
        }));
        subscribers.push(sub);
    }

    let producer = {
        let publisher = Arc::clone(&publisher);
        tokio::spawn(async move {
            let mut seq = 0u64;
            loop {
                let message = Message::new(TOPIC, [("seq", json!(seq))]);
                publisher.publish(message).wait().await;
                seq += 1;
            }
        })
    };

    info!("Warming up for {}s", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    received.store(0, Ordering::SeqCst);
    let start = Instant::now();

    info!("Measuring for {}s", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = received.load(Ordering::SeqCst);

    producer.abort();
    publisher.shutdown();
    for sub in &subscribers {
        sub.close();
    }
    for consumer in consumers {
        let _ = consumer.await;
    }

    let per_sec = total as f64 / elapsed.as_secs_f64();
    let stats = publisher.stats();

    println!();
    println!("Subscribers:      {:>12}", num_subscribers);
    println!("Duration:         {:>12.2}s", elapsed.as_secs_f64());
    println!("Deliveries:       {:>12}", total);
    println!("Throughput:       {:>12.0} msg/s", per_sec);
    println!("Publishes:        {:>12}", stats.published);
    println!("Failed:           {:>12}", stats.failed);
}
