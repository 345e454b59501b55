// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netsnare::network::{
    AdmissionRequest, ChannelHandler, FrameScope, HandlerRef, InterceptedPage, ModificationSet,
    NetworkState, RequestInfo, RequestKey, RequestScope, RequestType, SessionId,
};

fn admission(key: RequestKey, scope: RequestScope) -> AdmissionRequest {
    AdmissionRequest {
        key,
        scope,
        request: RequestInfo {
            url: "https://example.com/app.js".into(),
            method: "GET".into(),
            headers: HashMap::new(),
            post_data: None,
        },
        resource_type: RequestType::Script,
        is_navigation: false,
    }
}

fn admission_benchmark(c: &mut Criterion) {
    let (handler, _rx) = ChannelHandler::new();
    let frame = FrameScope::new(1, 1, 1);
    let mut state = NetworkState::default();
    state.bind(
        &frame.keys(),
        &InterceptedPage::new(SessionId::new("bench"), HandlerRef::new(&handler)),
    );

    c.bench_function("admit_and_finish", |b| {
        b.iter(|| {
            if let Ok(admitted) = state.admit(admission(RequestKey::next(), RequestScope::of(&frame))) {
                black_box(state.job_finished(&admitted.id));
            }
        })
    });

    c.bench_function("bypass_unbound", |b| {
        b.iter(|| black_box(state.admit(admission(RequestKey::next(), RequestScope::frame(9, 9))).is_err()))
    });
}

fn validation_benchmark(c: &mut Criterion) {
    let set = ModificationSet::unchanged()
        .url("https://example.com/rewritten")
        .method("POST")
        .header("authorization", "Bearer token")
        .header("content-type", "application/json");

    c.bench_function("validate_overrides", |b| {
        b.iter(|| black_box(set.clone().validate().is_ok()))
    });
}

criterion_group!(benches, admission_benchmark, validation_benchmark);
criterion_main!(benches);
