//! Benchmarks for the courier response pipeline

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use courier::{
    BackoffStrategy, HeaderMap, HeaderValue, ResponseNormalizer, Response, StatusCode,
    StatusMessages, Url, classify, header, raise_http_error,
};
use serde_json::json;

fn json_response(body: serde_json::Value) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::new(
        StatusCode::OK,
        headers,
        body.to_string(),
        Url::parse("http://localhost/api/users").unwrap(),
    )
}

fn envelope_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    let enveloped = json!({
        "code": 10000,
        "message": "ok",
        "data": {"rows": [{"id": 1, "name": "ada"}, {"id": 2, "name": "grace"}], "pageIndex": 1}
    });
    let raw = json!({"rows": [{"id": 1, "name": "ada"}], "pageIndex": 1});

    group.bench_function("classify_enveloped", |b| {
        b.iter(|| black_box(classify(black_box(enveloped.clone()))));
    });

    group.bench_function("classify_raw", |b| {
        b.iter(|| black_box(classify(black_box(raw.clone()))));
    });

    let normalizer = ResponseNormalizer::default();
    let success = json_response(enveloped.clone());
    let failure = json_response(json!({"code": 9999, "message": "bad input", "data": null}));

    group.bench_function("parse_success", |b| {
        b.iter(|| black_box(normalizer.parse(black_box(&success))))
    });

    group.bench_function("parse_logical_failure", |b| {
        b.iter(|| black_box(normalizer.parse(black_box(&failure))))
    });

    group.finish();
}

fn error_message_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("error_message");
    let messages = StatusMessages::default();

    group.bench_function("payload_message", |b| {
        b.iter(|| {
            black_box(raise_http_error(
                400,
                Some(json!({"message": "username taken"})),
                &messages,
            ))
        });
    });

    group.bench_function("status_table", |b| {
        b.iter(|| black_box(raise_http_error(black_box(404), None, &messages)));
    });

    group.finish();
}

fn backoff_calculation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff_calculation");

    let exponential = BackoffStrategy::Exponential {
        initial: Duration::from_millis(100),
        max: Duration::from_secs(30),
        multiplier: 2.0,
    };
    let linear = BackoffStrategy::Linear {
        delay: Duration::from_millis(100),
        max: Duration::from_secs(30),
    };

    group.bench_function("exponential_attempt_5", |b| {
        b.iter(|| black_box(exponential.delay_for_attempt(black_box(5))));
    });

    group.bench_function("linear_attempt_5", |b| {
        b.iter(|| black_box(linear.delay_for_attempt(black_box(5))));
    });

    group.finish();
}

criterion_group!(
    benches,
    envelope_benchmark,
    error_message_benchmark,
    backoff_calculation_benchmark,
);
criterion_main!(benches);
