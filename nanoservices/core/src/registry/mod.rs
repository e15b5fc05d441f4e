pub mod binding;
pub mod namespace;
pub mod tag;

use std::collections::{BTreeMap, HashSet};

use crate::phase::{ParsePhaseError, Phase};
pub use binding::{PhaseBinding, PhaseTask};
pub use namespace::Namespace;
pub use tag::{phase, PhaseTag};

/// Errors raised while tagging or registering tasks.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid phase: {0}")]
    InvalidPhase(#[from] ParsePhaseError),

    #[error("task '{task}' is already registered for phase {phase}")]
    DuplicateRegistration { phase: Phase, task: String },
}

/// Phase -> ordered bindings. Every phase is always present, possibly empty.
#[derive(Debug)]
pub struct PhaseRegistry<T: Send + 'static> {
    phases: BTreeMap<Phase, Vec<PhaseBinding<T>>>,
}

impl<T: Send + 'static> PhaseRegistry<T> {
    pub fn new() -> Self {
        Self {
            phases: Phase::ALL.into_iter().map(|p| (p, Vec::new())).collect(),
        }
    }

    /// Register one task at the end of its phase.
    pub fn register(&mut self, task: PhaseTask<T>) -> Result<&PhaseBinding<T>, RegistryError> {
        let phase = task.phase();
        if self.contains(phase, task.name()) {
            return Err(RegistryError::DuplicateRegistration {
                phase,
                task: task.name().to_string(),
            });
        }

        let bindings = self.phases.entry(phase).or_default();
        let position = bindings.len();
        tracing::debug!(phase = %phase, task = task.name(), position, "registered task");
        bindings.push(PhaseBinding::new(task, position));
        Ok(&bindings[position])
    }

    /// Register every tagged member of `namespace`, in namespace order.
    ///
    /// Nothing is registered if any member would duplicate an existing
    /// binding, so scanning the same namespace twice fails instead of running
    /// its tasks twice. Call [`PhaseRegistry::clear`] first to rescan.
    pub fn register_phases_from_annotations(
        &mut self,
        namespace: &Namespace<T>,
    ) -> Result<usize, RegistryError> {
        let mut seen: HashSet<(Phase, &str)> = HashSet::new();
        for task in namespace.iter() {
            let key = (task.phase(), task.name());
            if self.contains(key.0, key.1) || !seen.insert(key) {
                return Err(RegistryError::DuplicateRegistration {
                    phase: key.0,
                    task: key.1.to_string(),
                });
            }
        }

        for task in namespace.iter() {
            self.register(task.clone())?;
        }

        tracing::info!(
            namespace = namespace.name(),
            registered = namespace.len(),
            "registered phase tasks from namespace"
        );
        Ok(namespace.len())
    }

    pub fn contains(&self, phase: Phase, name: &str) -> bool {
        self.bindings(phase).iter().any(|b| b.name() == name)
    }

    pub fn bindings(&self, phase: Phase) -> &[PhaseBinding<T>] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.bindings(phase).len()
    }

    /// All bindings in run order: phase order, then registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PhaseBinding<T>> {
        self.phases.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for bindings in self.phases.values_mut() {
            bindings.clear();
        }
    }
}

impl<T: Send + 'static> Default for PhaseRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Clone for PhaseRegistry<T> {
    fn clone(&self) -> Self {
        Self { phases: self.phases.clone() }
    }
}
