//! Merge of the remote catalog with stored user intent.
//!
//! The catalog decides which operations exist right now; stored settings
//! decide what the user wants done with them. Reconciliation is a pure
//! function of the two and never writes anything back.

use std::collections::HashSet;

use indexmap::IndexMap;
use vaultlab_types::{ActiveOperation, OperationConfig, OperationId};

/// One catalog entry paired with the configuration that applies to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledOperation {
    pub id: OperationId,
    pub config: OperationConfig,
    /// The config was synthesized because the user never stored one.
    pub synthesized: bool,
}

/// Canonical view of the catalog for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    operations: Vec<ReconciledOperation>,
}

impl Reconciliation {
    /// Every catalog operation, in catalog order.
    pub fn operations(&self) -> &[ReconciledOperation] {
        &self.operations
    }

    /// Operations that are both served and enabled.
    pub fn active(&self) -> Vec<ActiveOperation> {
        self.operations
            .iter()
            .filter(|operation| operation.config.active)
            .map(|operation| ActiveOperation::new(operation.id.clone(), operation.config.clone()))
            .collect()
    }

    pub fn synthesized_ids(&self) -> Vec<&OperationId> {
        self.operations
            .iter()
            .filter(|operation| operation.synthesized)
            .map(|operation| &operation.id)
            .collect()
    }

    pub fn get(&self, id: &OperationId) -> Option<&ReconciledOperation> {
        self.operations.iter().find(|operation| &operation.id == id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Pair each catalog id with its stored config, synthesizing inert defaults
/// for ids the user has never configured.
///
/// Duplicate catalog ids keep their first position. Stored entries missing
/// from the catalog are left out of the result.
pub fn reconcile(catalog: &[OperationId], commands: &IndexMap<OperationId, OperationConfig>) -> Reconciliation {
    let mut seen = HashSet::with_capacity(catalog.len());
    let operations = catalog
        .iter()
        .filter(|id| seen.insert(*id))
        .map(|id| match commands.get(id) {
            Some(config) => ReconciledOperation {
                id: id.clone(),
                config: config.clone(),
                synthesized: false,
            },
            None => ReconciledOperation {
                id: id.clone(),
                config: OperationConfig::discovered(id),
                synthesized: true,
            },
        })
        .collect();
    Reconciliation { operations }
}
