//! phaseflow_core: phase-ordered ETL execution
//!
//! Tasks are tagged with one of three phases (Extract, Transform, Load),
//! registered once at startup, and executed strictly in phase order. The output
//! of each task becomes the input of the next; the last output is the final
//! context of the run.
//!
//! ```no_run
//! use phaseflow_core::builder::PhaseFlowBuilder;
//! use phaseflow_core::phase::Phase;
//! use phaseflow_core::registry::phase;
//!
//! # async fn demo() {
//! let flow = PhaseFlowBuilder::new("example")
//!     .task(phase(Phase::Extract).apply("read", |_| Ok(vec![1, 2, 3])))
//!     .task(phase(Phase::Transform).apply("double", |ctx: Option<Vec<i32>>| {
//!         Ok(ctx.unwrap_or_default().into_iter().map(|v| v * 2).collect())
//!     }))
//!     .build()
//!     .unwrap();
//! let report = flow.run().await;
//! println!("{report}");
//! # }
//! ```

pub mod phase;
pub mod sources;
pub mod transforms;
pub mod destinations;
pub mod registry;
pub mod execution;
pub mod report;
pub mod engine;
pub mod builder;
pub mod config;
pub mod store;

pub mod logging;

pub mod metrics;
