use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine_core::{EngineCore, EngineState, EventBus, EventName, GameEvent};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn counting_bus(subscribers: usize) -> (Arc<EventBus<GameEvent>>, Arc<AtomicU64>) {
    let bus = Arc::new(EventBus::new("bench"));
    let seen = Arc::new(AtomicU64::new(0));
    for _ in 0..subscribers {
        let seen = Arc::clone(&seen);
        bus.subscribe(move |_: &GameEvent| {
            seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }
    (bus, seen)
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_publish");
    let event = GameEvent {
        game_id: "bench".to_string(),
        name: EventName::custom("objectPlaced"),
        timestamp: 0,
        current_state: EngineState::Playing,
        payload: json!({ "id": 1, "position": [0.0, 0.0, -1.0] }),
    };

    for subscribers in [1usize, 8] {
        let (bus, _seen) = counting_bus(subscribers);
        group.bench_function(format!("subscribers_{subscribers}"), |b| {
            b.iter(|| bus.publish(&event));
        });
    }
    group.finish();
}

fn bench_engine_core(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_core");

    group.bench_function("set_state", |b| {
        let mut core = EngineCore::new("bench");
        let _recorder = core.bus().subscribe(|_: &GameEvent| Ok(()));
        b.iter(|| core.set_state(EngineState::Playing));
    });

    group.bench_function("roster_churn", |b| {
        b.iter_batched(
            || EngineCore::new("bench"),
            |mut core| {
                for id in ["a", "b", "c", "d"] {
                    core.add_player(id, serde_json::Value::Null);
                }
                core.remove_player("b");
                core
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_publish, bench_engine_core);
criterion_main!(benches);
