//! # Token Factory Benchmarks
//!
//! | Operation              | Algorithm        |
//! |------------------------|------------------|
//! | issue / verify         | HmacSHA256/512   |
//! | sign / verify          | Ed25519          |
//! | sign / verify          | SHA256withECDSA  |
//! | route resolution       | -                |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shared_crypto::{Algorithm, Keystore, KeystoreSet, SecuritySettings, TokenFactory};
use shared_types::{Access, Protocol, Token};
use std::sync::Arc;
use std::time::Duration;

fn factory(hmac: Algorithm, signature: Algorithm) -> TokenFactory {
    let settings = SecuritySettings {
        hmac_algorithm: hmac.id().to_string(),
        signature_algorithm: signature.id().to_string(),
        ..SecuritySettings::default()
    };
    let keystores = KeystoreSet::new().with(
        Keystore::generate("bench", signature).unwrap_or_else(|e| panic!("keystore: {e}")),
    );
    TokenFactory::new(b"benchmark-secret", &settings)
        .unwrap_or_else(|e| panic!("factory: {e}"))
        .with_keystores(Arc::new(keystores))
}

fn token(factory: &TokenFactory) -> Token {
    Token::new("bench", factory.now() + 3600)
        .with_property("user", "alice")
        .with_property("realm", "north")
}

fn bench_hmac_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("token-hmac");
    group.measurement_time(Duration::from_secs(5));

    for algorithm in [Algorithm::HmacSha256, Algorithm::HmacSha512] {
        let factory = factory(algorithm, Algorithm::Ed25519);
        let signed = factory
            .hmac(token(&factory))
            .unwrap_or_else(|e| panic!("hmac: {e}"));

        group.bench_with_input(BenchmarkId::new("sign", algorithm), &factory, |b, f| {
            b.iter(|| black_box(f.hmac(token(f))))
        });
        group.bench_with_input(BenchmarkId::new("verify", algorithm), &signed, |b, t| {
            b.iter(|| black_box(factory.verify(t)))
        });
    }
    group.finish();
}

fn bench_signature_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("token-signature");
    group.measurement_time(Duration::from_secs(5));

    for algorithm in [Algorithm::Ed25519, Algorithm::EcdsaSecp256k1] {
        let factory = factory(Algorithm::HmacSha512, algorithm);
        let signed = factory
            .sign(token(&factory), "bench")
            .unwrap_or_else(|e| panic!("sign: {e}"));

        group.bench_with_input(BenchmarkId::new("sign", algorithm), &factory, |b, f| {
            b.iter(|| black_box(f.sign(token(f), "bench")))
        });
        group.bench_with_input(BenchmarkId::new("verify", algorithm), &signed, |b, t| {
            b.iter(|| black_box(factory.verify(t)))
        });
    }
    group.finish();
}

fn bench_route_resolution(c: &mut Criterion) {
    let mut protocol = Protocol::new();
    for i in 0..64 {
        protocol.use_route(format!("action-{i}"), i, Access::Authorized);
    }

    c.bench_function("protocol-get", |b| {
        b.iter(|| black_box(protocol.get(Access::Admin, black_box("action-42"))))
    });
}

criterion_group!(
    benches,
    bench_hmac_tokens,
    bench_signature_tokens,
    bench_route_resolution
);
criterion_main!(benches);
