//! Analysis configuration.

use crate::ir::Type;

/// The bounded resource collection being reasoned about: its class name
/// and the method that indexes into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionModel {
    /// Class of the collection (default: "PrinterArray")
    pub type_name: String,
    /// Indexing method; its first argument is the index (default: "sendJob")
    pub index_method: String,
}

impl CollectionModel {
    pub fn new(type_name: impl Into<String>, index_method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            index_method: index_method.into(),
        }
    }

    pub fn is_collection(&self, ty: &Type) -> bool {
        ty.is_object(&self.type_name)
    }
}

impl Default for CollectionModel {
    fn default() -> Self {
        Self::new("PrinterArray", "sendJob")
    }
}

/// Configuration of one verification run.
///
/// Immutable once the run starts; every engine and checker borrows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Merge into a loop header from which on widening replaces join (default: 6)
    pub widening_threshold: usize,
    /// Upper bound on node visits per procedure (default: 10000)
    pub max_node_visits: usize,
    pub collection: CollectionModel,
    /// Report a procedure unsafe if any domain operation failed (default: false)
    pub strict_domain_errors: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            widening_threshold: 6,
            max_node_visits: 10_000,
            collection: CollectionModel::default(),
            strict_domain_errors: false,
        }
    }
}

impl AnalysisConfig {
    pub fn with_widening_threshold(mut self, threshold: usize) -> Self {
        self.widening_threshold = threshold;
        self
    }

    pub fn with_max_node_visits(mut self, visits: usize) -> Self {
        self.max_node_visits = visits;
        self
    }

    pub fn with_collection(mut self, collection: CollectionModel) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_strict_domain_errors(mut self, strict: bool) -> Self {
        self.strict_domain_errors = strict;
        self
    }
}
