use crate::errors::Result;
use crate::trial::Trial;
use ndarray::Array2;

/// A sequential designer proposing trials and learning from completed ones
pub trait Designer {
    /// Propose `count` new trials, the designer default when `None`
    fn suggest(&mut self, count: Option<usize>) -> Result<Vec<Trial>>;

    /// Feed back completed trials
    fn update(&mut self, completed: &[Trial]) -> Result<()>;
}

/// A designer evolving a population of numeric points
pub trait PopulationDesigner: Designer {
    /// Pareto optimal points and their objective values `(pareto_x, pareto_y)`
    fn result(&self) -> (Array2<f64>, Array2<f64>);

    /// Current population and its objective values `(pop_x, pop_y)`
    fn curr_pop(&self) -> (Array2<f64>, Array2<f64>);
}
