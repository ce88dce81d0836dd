pub mod median;
pub mod morphology;
