mod estimator;

pub use estimator::{estimate, MaterialEstimate, MaterialInputs};
