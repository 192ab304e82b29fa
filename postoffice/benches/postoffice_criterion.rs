use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use postoffice::{
    Address, Binding, DuplicateIdCache, MessageReference, PostOffice, PostOfficeConfig, Queue,
    QueueError, ServerMessage, StageOutcome, StageOwner,
};
use std::sync::Arc;
use tokio::runtime::Builder;

const BINDING_ROWS: usize = 256;
const DUPLICATE_CACHE_SIZE: usize = 2000;

struct NullQueue(String);

#[async_trait]
impl Queue for NullQueue {
    fn name(&self) -> &str {
        &self.0
    }

    async fn enqueue(&self, _reference: MessageReference) -> Result<(), QueueError> {
        Ok(())
    }

    async fn withdraw(&self, _reference: &MessageReference) -> Result<(), QueueError> {
        Ok(())
    }
}

fn post_office_with_bindings(pattern: impl Fn(usize) -> String) -> PostOffice {
    let post_office = PostOffice::new(PostOfficeConfig::default());
    for row in 0..BINDING_ROWS {
        let queue = Arc::new(NullQueue(format!("queue-{row}")));
        post_office
            .add_binding(Binding::new(pattern(row), queue))
            .expect("benchmark binding should register");
    }
    post_office
}

fn postoffice_criterion(c: &mut Criterion) {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("benchmark runtime should build");

    let exact = post_office_with_bindings(|row| format!("orders.{row}.created"));
    let wildcard = post_office_with_bindings(|row| format!("orders.{}.#", row % 16));
    let exact_address = Address::new("orders.7.created");
    let wildcard_address = Address::new("orders.7.eu.created");

    let mut resolution_group = c.benchmark_group("binding_resolution");
    resolution_group.bench_function("exact_cached", |b| {
        b.iter(|| {
            let bindings = exact.get_bindings_for_address(&exact_address, true);
            black_box(bindings.map(|bindings| bindings.len()));
        });
    });
    resolution_group.bench_function("wildcard_cached", |b| {
        b.iter(|| {
            let bindings = wildcard.get_bindings_for_address(&wildcard_address, true);
            black_box(bindings.map(|bindings| bindings.len()));
        });
    });
    resolution_group.bench_function("wildcard_uncached", |b| {
        b.iter(|| {
            let bindings = wildcard.get_matching_bindings(&wildcard_address);
            black_box(bindings.len());
        });
    });
    resolution_group.finish();

    let cache = DuplicateIdCache::new(Address::new("orders"), DUPLICATE_CACHE_SIZE);
    runtime.block_on(async {
        for index in 0..DUPLICATE_CACHE_SIZE as u64 {
            let id = format!("id-{index}");
            if let StageOutcome::Staged(staged) = cache
                .stage_add_if_absent(id.as_bytes(), StageOwner::Direct(index))
                .await
            {
                cache.commit(&staged);
            }
        }
    });

    let mut duplicate_group = c.benchmark_group("duplicate_detection");
    duplicate_group.bench_function("check_hit", |b| {
        b.iter(|| black_box(cache.check_duplicate(b"id-1500")));
    });
    duplicate_group.bench_function("check_miss", |b| {
        b.iter(|| black_box(cache.check_duplicate(b"absent")));
    });
    duplicate_group.bench_function("stage_commit_evict", |b| {
        let mut next = DUPLICATE_CACHE_SIZE as u64;
        b.iter_batched(
            || {
                next += 1;
                (format!("id-{next}"), StageOwner::Direct(next))
            },
            |(id, owner)| {
                runtime.block_on(async {
                    if let StageOutcome::Staged(staged) =
                        cache.stage_add_if_absent(id.as_bytes(), owner).await
                    {
                        cache.commit(&staged);
                    }
                });
            },
            BatchSize::SmallInput,
        );
    });
    duplicate_group.finish();

    let routing = post_office_with_bindings(|row| format!("orders.{}.*", row % 8));
    let mut routing_group = c.benchmark_group("routing");
    routing_group.bench_function("route_direct_with_duplicate_id", |b| {
        let mut message_id = 0u64;
        b.iter(|| {
            message_id += 1;
            let message = ServerMessage::new(message_id, "orders.3.created")
                .with_duplicate_id(message_id.to_be_bytes().to_vec());
            let outcome = runtime.block_on(routing.route_direct(message));
            black_box(outcome.map(|outcome| outcome.queues.len()).ok());
        });
    });
    routing_group.finish();
}

criterion_group!(benches, postoffice_criterion);
criterion_main!(benches);
