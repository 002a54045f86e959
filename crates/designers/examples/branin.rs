use bbo_designers::{
    AcqfConfig, AcqfOptimizer, AcqfSpec, AcqfType, BoConfig, BoDesigner, Designer,
    FunctionExperimenter, Objective, ObjectiveMetricGoal, ProblemStatement, SearchSpace,
};
use env_logger::{Builder, Env, Target};
use ndarray::{Array2, ArrayBase, ArrayView2, Data, Ix1, Zip};
use std::f64::consts::PI;

// Branin: 3 global minima y_opt = 0.397887 at (-pi, 12.275), (pi, 2.275), (9.42478, 2.475)
fn branin(x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> f64 {
    let (a, b, c) = (1., 5.1 / (4. * PI * PI), 5. / PI);
    let (r, s, t) = (6., 10., 1. / (8. * PI));
    a * (x[1] - b * x[0] * x[0] + c * x[0] - r).powi(2) + s * (1. - t) * x[0].cos() + s
}

fn f_branin(x: &ArrayView2<f64>) -> Array2<f64> {
    let mut y = Array2::zeros((x.nrows(), 1));
    Zip::from(y.rows_mut())
        .and(x.rows())
        .for_each(|mut yi, xi| yi[0] = branin(&xi));
    y
}

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::new().filter_or("BBO_LOG", "info"))
        .target(Target::Stdout)
        .try_init()
        .ok();

    let mut space = SearchSpace::new();
    space
        .add_float_param("x", -5., 10.)?
        .add_float_param("y", 0., 15.)?;
    let mut objective = Objective::new();
    objective.add_metric("branin", ObjectiveMetricGoal::Minimize)?;
    let problem = ProblemStatement::new(space, objective);
    let experimenter = FunctionExperimenter::new(f_branin, &problem);

    let configs = [
        ("qEI / gradient", BoConfig::default().q(2)),
        (
            "qEI+qUCB / NSGA-II",
            BoConfig::default()
                .q(2)
                .acqf(AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QUcb]))
                .acqf_optimizer(AcqfOptimizer::Evolutionary)
                .acqf_config(AcqfConfig {
                    epochs: 50,
                    ..AcqfConfig::default()
                }),
        ),
    ];

    for (name, config) in configs {
        let mut designer = BoDesigner::new(&problem, config.n_init(8).seed(42))?;
        for _ in 0..20 {
            let mut trials = designer.suggest(None)?;
            experimenter.evaluate(&mut trials)?;
            designer.update(&trials)?;
        }
        let best = designer
            .trials()
            .iter()
            .min_by(|a, b| a.metrics["branin"].total_cmp(&b.metrics["branin"]));
        if let Some(best) = best {
            println!("{name}: best of {} trials = {best}", designer.trials().len());
        }
    }
    Ok(())
}
