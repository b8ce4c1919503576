//! Throughput benchmarks for Vox.
//!
//! These benchmarks measure topic bookkeeping and publish fan-out.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use tokio::runtime::Runtime;
use vox_core::{Message, Publisher, Subscriber, SubscriberConfig};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Benchmark subscriber topic operations.
fn bench_topics(c: &mut Criterion) {
    let mut group = c.benchmark_group("topics");

    group.bench_function("subscribe", |b| {
        let sub = Subscriber::new();
        let mut i = 0u64;
        b.iter(|| {
            sub.subscribe(format!("topic:{}", i));
            i += 1;
        });
    });

    group.bench_function("is_subscribed_hit", |b| {
        let sub = Subscriber::new();
        for i in 0..100 {
            sub.subscribe(format!("topic:{}", i));
        }
        b.iter(|| sub.is_subscribed(black_box("topic:50")));
    });

    group.bench_function("is_subscribed_miss", |b| {
        let sub = Subscriber::new();
        for i in 0..100 {
            sub.subscribe(format!("topic:{}", i));
        }
        b.iter(|| sub.is_subscribed(black_box("elsewhere")));
    });

    group.finish();
}

/// Benchmark registry maintenance.
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("add_remove", |b| {
        let publisher = Publisher::new();
        let sub = Subscriber::new();
        b.iter(|| {
            publisher.add_subscriber(black_box(&sub));
            publisher.remove_subscriber(black_box(&sub));
        });
    });

    group.finish();
}

/// Benchmark fan-out to many subscribers, waiting for every delivery.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    let rt = runtime();

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let publisher = Publisher::new();
            let subs: Vec<_> = (0..size)
                .map(|_| {
                    let sub = Subscriber::with_config(SubscriberConfig::with_capacity(1));
                    sub.subscribe("broadcast");
                    publisher.add_subscriber(&sub);
                    sub
                })
                .collect();
            let message = Message::new("broadcast", [("seq", json!(0))]);

            b.iter(|| {
                rt.block_on(async {
                    publisher.publish(black_box(message.clone())).wait().await;
                });
                for sub in &subs {
                    if let Some(mut inbox) = sub.try_inbox() {
                        inbox.drain();
                    }
                }
            });
        });
    }

    group.finish();
}

/// Benchmark publishing where most subscribers do not match.
fn bench_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtering");
    let rt = runtime();

    group.bench_function("1_of_1000_match", |b| {
        let publisher = Publisher::new();
        let subs: Vec<_> = (0..1000)
            .map(|i| {
                let sub = Subscriber::new();
                sub.subscribe(format!("topic:{}", i));
                publisher.add_subscriber(&sub);
                sub
            })
            .collect();
        let message = Message::empty("topic:500");

        b.iter(|| {
            rt.block_on(async {
                publisher.publish(black_box(message.clone())).wait().await;
            });
            if let Some(mut inbox) = subs[500].try_inbox() {
                inbox.drain();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_topics,
    bench_registry,
    bench_fanout,
    bench_filtering,
);
criterion_main!(benches);
