use bbo_gp::kernels::{kernel_factory, KernelType};
use bbo_gp::mean_models::{mean_factory, MeanType};
use bbo_gp::GpParams;
use linfa::prelude::*;
use ndarray::{arr2, concatenate, Array, Array1, Array2, Axis};

fn xsinx(x: &Array2<f64>) -> Array1<f64> {
    ((x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())).remove_axis(Axis(1))
}

fn main() {
    let xt = arr2(&[[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]]);
    let yt = xsinx(&xt);
    let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
    let ytest = xsinx(&xtest);

    for kernel in [KernelType::Matern52, KernelType::Kumar] {
        println!("Fit {kernel} GP surrogate of 'xsinx' at {}", xt.column(0));
        let gp = GpParams::new(
            mean_factory(Some(MeanType::Constant), None),
            kernel_factory(Some(kernel), None),
        )
        .input_bounds(Some(arr2(&[[0., 25.]])))
        .seed(Some(42))
        .fit(&Dataset::new(xt.clone(), yt.clone()))
        .expect("GP fitted");
        println!("{gp}");

        let (ypred, yvar) = gp.predict_valvar(&xtest).expect("GP prediction");
        let ysigma = yvar.mapv(f64::sqrt);
        println!("Prediction errors and standard deviations (x, err(x), sigma(x))");
        println!(
            "{}",
            concatenate![
                Axis(1),
                xtest,
                (ypred - &ytest).insert_axis(Axis(1)),
                ysigma.insert_axis(Axis(1))
            ]
        );
    }
}
