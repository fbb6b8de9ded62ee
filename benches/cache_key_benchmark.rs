use avatarlib::{strategy, Avatar, Config};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

fn derive_and_select(c: &mut Criterion) {
    let config = Config::from_json_str(
        r#"{"size": "req.query.size", "order": ["url", "gravatar", "location"]}"#,
    )
    .expect("benchmark config is valid");
    let context = json!({"req": {"query": {"size": "96"}}});
    let entities = [
        ("url", json!({"id": 1, "avatar": "https://cdn.example.com/1.png"})),
        ("gravatar", json!({"id": 2, "email": "someone@example.com"})),
        (
            "location",
            json!({"id": 3, "location": {"latitude": 48.85, "longitude": 2.35}}),
        ),
    ];

    let mut group = c.benchmark_group("derive_and_select");
    group.measurement_time(std::time::Duration::from_secs(5));

    for (name, entity) in entities.iter() {
        group.bench_function(*name, |b| {
            b.iter(|| {
                let avatar =
                    Avatar::derive(black_box(entity), black_box(&context), &config)
                        .expect("derive returned an error");
                strategy::select(entity, &avatar, &config)
                    .expect("select returned an error")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, derive_and_select);
criterion_main!(benches);
