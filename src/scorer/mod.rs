pub mod policy;
pub mod smoothing;

pub use policy::ScorePolicy;
pub use smoothing::{BetaPriors, RateSmoothing};
