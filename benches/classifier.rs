//! 分类器基准测试
//!
//! 测试200响应内容扫描在不同页面大小下的开销

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::time::Duration;
use url_vitals::health::{Classifier, RawResponse, TransportError};

const URL: &str = "https://events.example.org/calendar";

fn page(len: usize) -> String {
    let mut body = String::from("<html><body>");
    while body.len() < len {
        body.push_str("<p>Upcoming festivals, council meetings and library story hours.</p>");
    }
    body
}

/// 内容扫描基准测试
fn content_scan_benchmark(c: &mut Criterion) {
    let classifier = Classifier::default();
    let mut group = c.benchmark_group("classify_response");

    for size in [1_000, 50_000, 500_000] {
        let response = RawResponse::new(200, URL, page(size)).with_content_type("text/html");
        group.bench_with_input(BenchmarkId::from_parameter(size), &response, |b, response| {
            b.iter(|| {
                black_box(classifier.classify_response(
                    URL,
                    black_box(response),
                    Duration::from_millis(120),
                ))
            });
        });
    }

    group.finish();
}

/// 传输错误分类基准测试
fn failure_benchmark(c: &mut Criterion) {
    let classifier = Classifier::default();
    let error = TransportError::Connect("dns error: failed to lookup address".to_string());

    c.bench_function("classify_failure", |b| {
        b.iter(|| {
            black_box(classifier.classify_failure(
                URL,
                black_box(&error),
                Duration::from_secs(15),
            ))
        });
    });
}

criterion_group!(benches, content_scan_benchmark, failure_benchmark);
criterion_main!(benches);
