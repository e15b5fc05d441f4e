use std::sync::Arc;

use phaseflow_utils::PhaseflowResult;
use crate::destinations::traits::Destination;
use crate::engine::PhaseFlow;
use crate::execution::runner::Combiner;
use crate::phase::Phase;
use crate::registry::{Namespace, PhaseRegistry, PhaseTask, RegistryError};
use crate::sources::traits::Source;
use crate::transforms::traits::Transform;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("pipeline name is required")]
    NoName,
    #[error("{count} extract tasks are registered but no combiner was provided")]
    MissingCombiner { count: usize },
    #[error("registration failed: {0}")]
    Registry(#[from] RegistryError),
}

enum Pending<T: Send + 'static> {
    Task(PhaseTask<T>),
    Namespace(Namespace<T>),
}

/// Builds the registration table for one pipeline at startup.
///
/// Tasks and namespaces are registered in the order they are added when
/// [`PhaseFlowBuilder::build`] is called.
pub struct PhaseFlowBuilder<T: Send + 'static> {
    name: String,
    registry: PhaseRegistry<T>,
    pending: Vec<Pending<T>>,
    combiner: Option<Combiner<T>>,
}

impl<T: Send + 'static> PhaseFlowBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: PhaseRegistry::new(),
            pending: Vec::new(),
            combiner: None,
        }
    }

    /// Start from an already populated registry.
    pub fn registry(mut self, registry: PhaseRegistry<T>) -> Self {
        self.registry = registry;
        self
    }

    pub fn namespace(mut self, namespace: Namespace<T>) -> Self {
        self.pending.push(Pending::Namespace(namespace));
        self
    }

    pub fn task(mut self, task: PhaseTask<T>) -> Self {
        self.pending.push(Pending::Task(task));
        self
    }

    pub fn source(self, source: impl Source<T> + 'static) -> Self {
        self.task(PhaseTask::source(source))
    }

    pub fn transform(self, transform: impl Transform<T> + 'static) -> Self {
        self.task(PhaseTask::transform(transform))
    }

    pub fn destination(self, destination: impl Destination<T> + 'static) -> Self {
        self.task(PhaseTask::destination(destination))
    }

    /// How to merge the results of several Extract tasks.
    pub fn combine_with<F>(mut self, combiner: F) -> Self
    where
        F: Fn(Vec<T>) -> PhaseflowResult<T> + Send + Sync + 'static,
    {
        self.combiner = Some(Arc::new(combiner));
        self
    }

    pub fn build(self) -> Result<PhaseFlow<T>, BuildError> {
        if self.name.trim().is_empty() {
            return Err(BuildError::NoName);
        }

        let mut registry = self.registry;
        for pending in self.pending {
            match pending {
                Pending::Task(task) => {
                    registry.register(task)?;
                }
                Pending::Namespace(ns) => {
                    registry.register_phases_from_annotations(&ns)?;
                }
            }
        }

        let extracts = registry.count(Phase::Extract);
        if extracts > 1 && self.combiner.is_none() {
            return Err(BuildError::MissingCombiner { count: extracts });
        }

        tracing::debug!(
            pipeline = %self.name,
            extract = extracts,
            transform = registry.count(Phase::Transform),
            load = registry.count(Phase::Load),
            "pipeline built"
        );
        Ok(PhaseFlow::new(self.name, registry, self.combiner))
    }
}
