use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use options_pricing::core::PricingEngine;
use options_pricing::engines::lsm::LongstaffSchwartz;
use options_pricing::engines::monte_carlo::{MonteCarloEngine, VarianceReduction};
use options_pricing::instruments::Payoff;
use options_pricing::market::MarketEnvironment;
use options_pricing::models::Model;
use std::hint::black_box;

// Monte Carlo performance benchmarks
// Goals:
// - antithetic sampling should cost no more than plain sampling
// - path generation should scale linearly in paths x steps
// - LSM regression should stay within 3x of plain simulation

fn benchmark_market() -> MarketEnvironment {
    MarketEnvironment::builder()
        .spot(100.0)
        .rate(0.05)
        .dividend_yield(0.02)
        .flat_vol(0.20)
        .build()
        .expect("benchmark market should be valid")
}

fn bench_mc_european_paths(c: &mut Criterion) {
    let market = benchmark_market();
    let call = Payoff::european_call(100.0, 1.0);
    let mut group = c.benchmark_group("mc_european_paths");

    for paths in [10_000_usize, 50_000, 100_000] {
        let engine = MonteCarloEngine::new(paths, 1).with_seed(42);
        group.bench_with_input(BenchmarkId::from_parameter(paths), &paths, |b, _| {
            b.iter(|| {
                let px = engine
                    .price(&Model::BlackScholes, black_box(&market), black_box(&call))
                    .expect("pricing should succeed")
                    .price;
                black_box(px)
            })
        });
    }
    group.finish();
}

fn bench_mc_timesteps(c: &mut Criterion) {
    let market = benchmark_market();
    let asian = Payoff::asian_call(100.0, 1.0);
    let mut group = c.benchmark_group("mc_asian_timesteps");

    for steps in [12_usize, 50, 252] {
        let engine = MonteCarloEngine::new(20_000, steps).with_seed(42);
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, _| {
            b.iter(|| {
                let px = engine
                    .price(&Model::BlackScholes, black_box(&market), black_box(&asian))
                    .expect("pricing should succeed")
                    .price;
                black_box(px)
            })
        });
    }
    group.finish();
}

fn bench_variance_reduction(c: &mut Criterion) {
    let market = benchmark_market();
    let call = Payoff::european_call(100.0, 1.0);
    let mut group = c.benchmark_group("mc_variance_reduction");

    for mode in [
        VarianceReduction::None,
        VarianceReduction::Antithetic,
        VarianceReduction::ControlVariate,
    ] {
        let engine = MonteCarloEngine::new(50_000, 1)
            .with_seed(42)
            .with_variance_reduction(mode);
        group.bench_function(format!("{mode:?}").to_lowercase(), |b| {
            b.iter(|| {
                let px = engine
                    .price(&Model::BlackScholes, black_box(&market), black_box(&call))
                    .expect("pricing should succeed")
                    .price;
                black_box(px)
            })
        });
    }
    group.finish();
}

fn bench_lsm(c: &mut Criterion) {
    let market = benchmark_market();
    let put = Payoff::american_put(100.0, 1.0);
    let engine = LongstaffSchwartz::new(20_000, 50).with_seed(42);

    c.bench_function("lsm_american_put_20k_x_50", |b| {
        b.iter(|| {
            let px = engine
                .price(&Model::BlackScholes, black_box(&market), black_box(&put))
                .expect("pricing should succeed")
                .price;
            black_box(px)
        })
    });
}

criterion_group!(
    benches,
    bench_mc_european_paths,
    bench_mc_timesteps,
    bench_variance_reduction,
    bench_lsm
);
criterion_main!(benches);
