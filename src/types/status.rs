//! Named status counters exposed by stateful stages

use serde::Serialize;

/// One named counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusItem {
    pub name: &'static str,
    pub value: u64,
}

impl StatusItem {
    pub fn new(name: &'static str, value: u64) -> Self {
        Self { name, value }
    }
}

/// Implemented by every stage that keeps counters.
pub trait StatusReporter {
    /// Component name used to group items in a snapshot.
    fn status_name(&self) -> String;

    fn status(&self) -> Vec<StatusItem>;
}

/// Status of one component at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub component: String,
    pub items: Vec<StatusItem>,
}

impl ComponentStatus {
    pub fn of(reporter: &dyn StatusReporter) -> Self {
        Self { component: reporter.status_name(), items: reporter.status() }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.items.iter().find(|item| item.name == name).map(|item| item.value)
    }
}

/// Status of the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub frames_processed: u64,
    pub components: Vec<ComponentStatus>,
}

impl StatusSnapshot {
    /// Look up `component` / `item`.
    pub fn get(&self, component: &str, item: &str) -> Option<u64> {
        self.components.iter().find(|c| c.component == component).and_then(|c| c.get(item))
    }
}
