pub mod runner;
pub mod state;

pub use runner::{run_phases, Combiner, COMBINER_RECORD};
pub use state::{RunState, RunStatus};
