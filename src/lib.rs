pub use phaseflow_core as core;
pub use phaseflow_utils as utils;

pub mod migrations;

// Convenience re-exports for common usage
pub use phaseflow_core::builder::{BuildError, PhaseFlowBuilder};
pub use phaseflow_core::engine::PhaseFlow;
pub use phaseflow_core::phase::Phase;
pub use phaseflow_core::registry::{phase, Namespace, PhaseRegistry, PhaseTask};
pub use phaseflow_core::report::{ExecutionReport, PhaseError};
pub use phaseflow_core::sources::traits::Source;
pub use phaseflow_core::transforms::traits::Transform;
pub use phaseflow_core::destinations::traits::Destination;
pub use phaseflow_utils::{PhaseflowResult, Row, Rows};
