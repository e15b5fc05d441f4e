use super::binding::PhaseTask;

/// A named, ordered collection of tagged tasks, typically everything one
/// migration module exposes. Scanning it registers members in this order.
#[derive(Debug)]
pub struct Namespace<T: Send + 'static> {
    name: String,
    members: Vec<PhaseTask<T>>,
}

impl<T: Send + 'static> Namespace<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: Vec::new() }
    }

    pub fn with(mut self, task: PhaseTask<T>) -> Self {
        self.members.push(task);
        self
    }

    pub fn push(&mut self, task: PhaseTask<T>) {
        self.members.push(task);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseTask<T>> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<T: Send + 'static> Clone for Namespace<T> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), members: self.members.clone() }
    }
}

impl<T: Send + 'static> FromIterator<PhaseTask<T>> for Namespace<T> {
    fn from_iter<I: IntoIterator<Item = PhaseTask<T>>>(iter: I) -> Self {
        Self { name: "collection".to_string(), members: iter.into_iter().collect() }
    }
}
