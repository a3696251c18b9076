//! Tunable parameters of the assembly engine.
use crate::assembly::global::ScatterDiscipline;
use crate::assembly::partition::Partitioning;
use crate::error::AssemblyError;
use crate::quadrature::QuadratureOrder;
use serde::{Deserialize, Serialize};

/// Settings for an [`AssemblyDispatcher`](crate::assembly::AssemblyDispatcher).
///
/// Missing fields take their default values when deserialized, so an empty JSON object is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssemblySettings {
    /// Size of the worker pool. `None` uses one thread per logical core.
    pub num_threads: Option<usize>,
    pub partitioning: Partitioning,
    pub discipline: ScatterDiscipline,
    pub quadrature_order: QuadratureOrder,
}

impl AssemblySettings {
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn with_discipline(mut self, discipline: ScatterDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_quadrature_order(mut self, order: usize) -> Self {
        self.quadrature_order = QuadratureOrder(order);
        self
    }

    pub fn validate(&self) -> Result<(), AssemblyError> {
        if self.num_threads == Some(0) {
            return Err(AssemblyError::invalid_parameter("num_threads must be positive"));
        }
        if let Partitioning::BlockInterleaved { block_size: 0 } = self.partitioning {
            return Err(AssemblyError::invalid_parameter("block_size must be positive"));
        }
        Ok(())
    }
}
