use book_imbalance::{
    BookAction, ImbalanceConfig, ImbalanceSignalEngine, OrderBook, OrderBookDelta, Side,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;

fn engine(use_quote_ticks: bool) -> ImbalanceSignalEngine {
    ImbalanceSignalEngine::new(ImbalanceConfig {
        trigger_min_size: 0.5,
        trigger_imbalance_ratio: 0.4,
        max_trade_size: dec!(1.0),
        use_quote_ticks,
    })
    .unwrap()
}

/// Quote update plus evaluation, the whole per-tick cost in quote mode
fn bench_on_quote(c: &mut Criterion) {
    let mut engine = engine(true);

    c.bench_function("on_quote_imbalanced", |b| {
        b.iter(|| {
            black_box(engine.on_quote(
                black_box(dec!(100.0)),
                black_box(dec!(101.0)),
                black_box(dec!(10.0)),
                black_box(dec!(1.0)),
            ))
        });
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let mut engine = engine(true);
    engine.on_quote(dec!(100.0), dec!(101.0), dec!(5.0), dec!(5.0));

    c.bench_function("evaluate_balanced", |b| {
        b.iter(|| black_box(engine.evaluate()));
    });
}

fn bench_on_book_delta(c: &mut Criterion) {
    let mut engine = engine(false);
    let book = OrderBook::new("BTCUSDT");
    for i in 0..20 {
        let offset = rust_decimal::Decimal::from(i);
        book.update_level(Side::Buy, dec!(100.0) - offset, dec!(1.0)).unwrap();
        book.update_level(Side::Sell, dec!(101.0) + offset, dec!(1.0)).unwrap();
    }
    let delta = OrderBookDelta::new("BTCUSDT", BookAction::Update, Side::Buy, dec!(100.0), dec!(12.0));

    c.bench_function("on_book_delta_20_levels", |b| {
        b.iter(|| black_box(engine.on_book_delta(&book, black_box(&delta)).unwrap()));
    });
}

criterion_group!(benches, bench_on_quote, bench_evaluate, bench_on_book_delta);
criterion_main!(benches);
