use criterion::{black_box, criterion_group, criterion_main, Criterion};
use did_power::statistics::trial_rng;
use did_power::{
    run_trial, Dataset, DesignParameters, FitOptions, GroupParameters, MixedModel,
    PowerAnalysis, SamplingMode,
};

fn design() -> DesignParameters {
    DesignParameters::new(
        GroupParameters::new(40, (3.0, 3.0), (1.0, 1.0), 0.75),
        GroupParameters::new(38, (3.0, 3.5), (1.0, 1.0), 0.75),
    )
}

fn bench_power(c: &mut Criterion) {
    let prepared = design().prepare().expect("valid design");
    let mut group = c.benchmark_group("did_power");
    group.sample_size(20);

    group.bench_function("simulate_dataset", |b| {
        let mut rng = trial_rng(1, 0);
        b.iter(|| {
            let ds = Dataset::simulate(&prepared, SamplingMode::Stochastic, &mut rng).unwrap();
            black_box(ds.len())
        });
    });

    group.bench_function("fit_mixed_model", |b| {
        let mut rng = trial_rng(2, 0);
        let ds = Dataset::simulate(&prepared, SamplingMode::Stochastic, &mut rng).unwrap();
        let model = MixedModel::default();
        b.iter(|| black_box(model.fit(&ds).unwrap().reml_criterion));
    });

    group.bench_function("single_trial", |b| {
        let mut rng = trial_rng(3, 0);
        b.iter(|| black_box(run_trial(&prepared, FitOptions::default(), &mut rng).unwrap()));
    });

    // Keeps trials small to avoid long benches.
    group.bench_function("power_200_trials", |b| {
        b.iter(|| {
            let est = PowerAnalysis::new(design()).trials(200).seed(4).run().unwrap();
            black_box(est.power)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_power);
criterion_main!(benches);
