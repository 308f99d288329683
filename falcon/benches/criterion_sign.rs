use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ivrf_falcon::rng::Prng;
use ivrf_falcon::{verify, SecretKey};

fn sign_verify_benchmark(c: &mut Criterion) {
    let (sk, pk) = SecretKey::keygen_from_seed(9, &[0x42; 48]).unwrap();
    let expanded = sk.expand();
    let message = [0u8; 32];

    c.bench_function("sign_dyn_512", |b| {
        b.iter(|| {
            black_box(sk.sign_with(
                black_box(&message),
                [0x11; 40],
                Prng::from_seed(b"bench dyn"),
            ))
        })
    });

    c.bench_function("sign_tree_512", |b| {
        b.iter(|| {
            black_box(expanded.sign_with(
                black_box(&message),
                [0x11; 40],
                Prng::from_seed(b"bench tree"),
            ))
        })
    });

    let sig = sk.sign_with(&message, [0x11; 40], Prng::from_seed(b"bench dyn"));
    c.bench_function("verify_512", |b| {
        b.iter(|| black_box(verify(&pk, black_box(&message), &sig)))
    });
}

criterion_group!(benches, sign_verify_benchmark);
criterion_main!(benches);
