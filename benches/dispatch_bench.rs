//! Benchmarks for fleet-dispatch
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_queue_operations(c: &mut Criterion) {
    use fleet_dispatch::dispatch::{JobQueue, ResultChannel};
    use fleet_dispatch::mq::{CompletionReport, Job, Namespace, Position, WorkerId};

    c.bench_function("job_queue_send_recv", |b| {
        let ns = Namespace::new();
        let queue = JobQueue::create(&ns, 10).unwrap();
        let job = Job::new(Position::new(-12, 40), Position::new(300, -7));

        b.iter(|| {
            queue.try_send(black_box(&job)).unwrap();
            let received = queue.receive().unwrap();
            black_box(received);
        })
    });

    c.bench_function("result_channel_post_take", |b| {
        let ns = Namespace::new();
        let channel = ResultChannel::open_or_create(&ns, WorkerId(1), 10).unwrap();
        let report = CompletionReport::new(WorkerId(1), 359);

        b.iter(|| {
            channel.post(black_box(&report)).unwrap();
            let taken = channel.try_take().unwrap();
            black_box(taken);
        })
    });
}

fn benchmark_record_codec(c: &mut Criterion) {
    use fleet_dispatch::mq::{CompletionReport, Job, Position, WorkerId};

    c.bench_function("job_encode_decode", |b| {
        let job = Job::new(Position::new(-1000, 512), Position::new(999, -3));

        b.iter(|| {
            let record = black_box(&job).encode();
            black_box(Job::decode(&record).unwrap());
        })
    });

    c.bench_function("report_encode_decode", |b| {
        let report = CompletionReport::new(WorkerId(7), 4000);

        b.iter(|| {
            let record = black_box(&report).encode();
            black_box(CompletionReport::decode(&record).unwrap());
        })
    });
}

criterion_group!(benches, benchmark_queue_operations, benchmark_record_codec);
criterion_main!(benches);
