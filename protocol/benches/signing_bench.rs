// Key derivation, signing and verification benchmarks.
//
// Covers seed-to-account derivation, child derivation, single-hash signing
// and verification, full transaction signing, and verification of
// signature batches at various sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rivet_protocol::codec::{AccountId, Amount, StObject};
use rivet_protocol::crypto::{sha512_half, sign, verify, KeyPair, Seed};
use rivet_protocol::transaction::sign_fields;

fn payment(key: &KeyPair) -> StObject {
    StObject::new()
        .with("TransactionType", 0u16)
        .with("Account", key.account_id())
        .with("Destination", AccountId::from([7u8; 20]))
        .with("Amount", Amount::Native(1_000_000))
        .with("Fee", Amount::Native(12))
        .with("Sequence", 42u32)
}

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("secp256k1/keypair_random", |b| {
        b.iter(KeyPair::random);
    });
}

fn bench_seed_derivation(c: &mut Criterion) {
    let seed = Seed::from_passphrase("masterpassphrase");

    c.bench_function("derive/seed_to_account", |b| {
        b.iter(|| seed.key().unwrap());
    });
}

fn bench_child_derivation(c: &mut Criterion) {
    let key = Seed::from_passphrase("masterpassphrase").key().unwrap();

    c.bench_function("derive/hardened_child", |b| {
        b.iter(|| key.child(0, true).unwrap());
    });
}

fn bench_sign_hash(c: &mut Criterion) {
    let key = KeyPair::random();
    let hash = sha512_half(b"transfer 1 XRP; sequence=42");

    c.bench_function("secp256k1/sign_hash", |b| {
        b.iter(|| sign(&key, &hash).unwrap());
    });
}

fn bench_verify_signature(c: &mut Criterion) {
    let key = KeyPair::random();
    let hash = sha512_half(b"transfer 1 XRP; sequence=42");
    let signature = sign(&key, &hash).unwrap();

    c.bench_function("secp256k1/verify_signature", |b| {
        b.iter(|| verify(key.public_key(), &hash, &signature));
    });
}

fn bench_sign_transaction(c: &mut Criterion) {
    let key = KeyPair::random();

    c.bench_function("secp256k1/sign_transaction", |b| {
        b.iter(|| {
            let mut tx = payment(&key);
            sign_fields(&key, &mut tx).unwrap()
        });
    });
}

fn bench_verify_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("secp256k1/verify_batch");

    for size in [10, 50, 100] {
        let items: Vec<_> = (0..size)
            .map(|i| {
                let key = KeyPair::random();
                let hash = sha512_half(format!("tx-{i:06}").as_bytes());
                let signature = sign(&key, &hash).unwrap();
                (*key.public_key(), hash, signature)
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| {
                items
                    .iter()
                    .all(|(public, hash, signature)| verify(public, hash, signature))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_seed_derivation,
    bench_child_derivation,
    bench_sign_hash,
    bench_verify_signature,
    bench_sign_transaction,
    bench_verify_batch,
);
criterion_main!(benches);
