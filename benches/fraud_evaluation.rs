use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use std::sync::Arc;

use payflow::domain::{AccountId, FraudSettings, Transaction, TransactionStatus};
use payflow::rules::{
    Aggregator, FraudEvaluator, HighAmountRule, InlineRule, SuspiciousPatternRule,
};
use payflow::storage::{MemoryStorage, Storage};

fn create_test_tx(from: &str, amount: Decimal) -> Transaction {
    Transaction::new(
        AccountId::new(from),
        AccountId::new("MERCHANT-1"),
        amount,
        "bench",
        TransactionStatus::Success,
    )
}

fn bench_high_amount_rule(c: &mut Criterion) {
    let rule = HighAmountRule::new(Decimal::new(5000, 0));
    let tx = create_test_tx("ACC-1", Decimal::new(1234567, 2));

    c.bench_function("high_amount_rule_evaluate_hit", |b| {
        b.iter(|| rule.evaluate(black_box(&tx)))
    });
}

fn bench_suspicious_pattern_rule(c: &mut Criterion) {
    let rule = SuspiciousPatternRule::new();
    let tx = create_test_tx("ACC-1", Decimal::new(4999, 2));

    c.bench_function("suspicious_pattern_rule_evaluate_miss", |b| {
        b.iter(|| rule.evaluate(black_box(&tx)))
    });
}

fn bench_full_evaluation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = Arc::new(MemoryStorage::new());

    // Pre-populate history across a few hundred accounts
    rt.block_on(async {
        for i in 0..1000 {
            let tx = create_test_tx(&format!("ACC-{}", i % 250), Decimal::new(2500 + i, 2));
            storage.insert_transaction(&tx).await.unwrap();
        }
    });

    let evaluator = FraudEvaluator::from_settings(&FraudSettings::default());
    let aggregator = Aggregator::default();
    let tx = create_test_tx("ACC-7", Decimal::new(600000, 2));

    c.bench_function("full_evaluation_with_history", |b| {
        b.to_async(&rt).iter(|| async {
            let evaluation = evaluator.evaluate(black_box(&tx), storage.as_ref()).await;
            aggregator.aggregate(&tx, &evaluation.alerts)
        })
    });
}

criterion_group!(
    benches,
    bench_high_amount_rule,
    bench_suspicious_pattern_rule,
    bench_full_evaluation,
);

criterion_main!(benches);
