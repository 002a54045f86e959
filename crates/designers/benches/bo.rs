use bbo_designers::{
    AcqfConfig, AcqfOptimizer, AcqfSpec, AcqfType, BoConfig, BoDesigner, Designer, Objective,
    ObjectiveMetricGoal, ProblemStatement, SearchSpace,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn problem(dim: usize) -> ProblemStatement {
    let mut space = SearchSpace::new();
    for i in 0..dim {
        space
            .add_float_param(&format!("x{i}"), -2., 2.)
            .expect("parameter");
    }
    let mut objective = Objective::new();
    objective
        .add_metric("rosenbrock", ObjectiveMetricGoal::Minimize)
        .expect("metric");
    ProblemStatement::new(space, objective)
}

/// Designer ready for its first model-based suggestion
fn bootstrapped(dim: usize, config: BoConfig) -> BoDesigner {
    let mut designer = BoDesigner::new(&problem(dim), config.n_init(10 * dim)).expect("designer");
    let mut trials = designer.suggest(Some(10 * dim)).expect("bootstrap trials");
    for trial in trials.iter_mut() {
        let x: Vec<f64> = (0..dim)
            .map(|i| trial.parameters[&format!("x{i}")].as_f64().unwrap_or_default())
            .collect();
        trial
            .metrics
            .insert("rosenbrock".to_string(), argmin_testfunctions::rosenbrock(x.as_slice()));
    }
    designer.update(&trials).expect("update");
    designer
}

fn criterion_bo(c: &mut Criterion) {
    let mut group = c.benchmark_group("bo");
    group.sample_size(10);
    for dim in [2, 4] {
        group.bench_function(format!("suggest qEI gradient {dim}d"), |b| {
            b.iter_batched(
                || bootstrapped(dim, BoConfig::default().q(2).seed(42)),
                |mut designer| std::hint::black_box(designer.suggest(None).expect("suggest")),
                criterion::BatchSize::LargeInput,
            )
        });
        group.bench_function(format!("suggest qEI+qUCB nsga2 {dim}d"), |b| {
            b.iter_batched(
                || {
                    bootstrapped(
                        dim,
                        BoConfig::default()
                            .q(4)
                            .seed(42)
                            .acqf(AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QUcb]))
                            .acqf_optimizer(AcqfOptimizer::Evolutionary)
                            .acqf_config(AcqfConfig {
                                epochs: 50,
                                ..AcqfConfig::default()
                            }),
                    )
                },
                |mut designer| std::hint::black_box(designer.suggest(None).expect("suggest")),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_bo);
criterion_main!(benches);
