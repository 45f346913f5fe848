//! # Epoch Key Benchmarks
//!
//! Every trigger costs each keyper one share computation, one verification
//! per peer share and one aggregation at the threshold.
//!
//! | Operation | Work |
//! |-----------|------|
//! | share | one hash-to-curve and one G1 multiplication |
//! | verify share | two pairings |
//! | assemble key | Lagrange interpolation over `threshold` shares |

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kp_05_dkg::testkeygen::EonKeys;
use kp_05_dkg::{EpochKg, EpochSecretKeyShareMsg};
use shared_types::EpochId;

const EON: u64 = 1;

fn bench_share(c: &mut Criterion) {
    let mut group = c.benchmark_group("epoch-key-share");
    group.measurement_time(Duration::from_secs(10));

    let keys = EonKeys::generate_seeded(5, 3, 1);
    let result = keys.dkg_result(0, EON);
    let peer = keys.dkg_result(1, EON);
    let epoch = EpochId::from_u64(17);
    let share = peer.epoch_secret_key_share(&epoch);

    group.bench_function("compute", |b| {
        b.iter(|| black_box(result.epoch_secret_key_share(black_box(&epoch))))
    });
    group.bench_function("verify", |b| {
        b.iter(|| black_box(result.verify_share(1, &share, &epoch).unwrap()))
    });
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("epoch-key-assemble");

    for (keypers, threshold) in [(3, 2), (7, 5), (13, 9)] {
        let keys = EonKeys::generate_seeded(keypers, threshold, 2);
        let epoch = EpochId::from_u64(3);
        let shares: Vec<_> = (0..threshold)
            .map(|sender| EpochSecretKeyShareMsg {
                eon: EON,
                epoch_id: epoch,
                sender,
                share: keys.dkg_result(sender, EON).epoch_secret_key_share(&epoch),
            })
            .collect();

        group.throughput(Throughput::Elements(threshold));
        group.bench_with_input(
            BenchmarkId::new("threshold", threshold),
            &shares,
            |b, shares| {
                b.iter(|| {
                    let mut kg = EpochKg::new(keys.dkg_result(0, EON));
                    for share in shares {
                        kg.handle_epoch_secret_key_share(share.clone()).unwrap();
                    }
                    black_box(kg.secret_key(&epoch).is_some())
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_share, bench_assemble);
criterion_main!(benches);
