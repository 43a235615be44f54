//! Model configuration as reported by the analysis backend

use serde::{Deserialize, Serialize};

/// Recurrent cell type of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    #[serde(rename = "GRU")]
    Gru,
    #[serde(rename = "BasicLSTM")]
    BasicLstm,
    #[serde(rename = "BasicRNN")]
    BasicRnn,
}

/// Internal state names exposed by each cell type, in display order
pub const CELL_STATES: [(CellType, &[&str]); 3] = [
    (CellType::Gru, &["state"]),
    (CellType::BasicLstm, &["state_c", "state_h"]),
    (CellType::BasicRnn, &["state"]),
];

impl CellType {
    /// Internal states that can be inspected for this cell type
    pub fn states(self) -> &'static [&'static str] {
        CELL_STATES
            .iter()
            .find(|(cell, _)| *cell == self)
            .map(|(_, states)| *states)
            .unwrap_or(&[])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gru => "GRU",
            Self::BasicLstm => "BasicLSTM",
            Self::BasicRnn => "BasicRNN",
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recurrent layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpec {
    pub num_units: usize,
}

/// Architecture section of a model config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub cell_type: CellType,
    /// Layers ordered from input to output
    pub cells: Vec<CellSpec>,
}

/// Per-model configuration, immutable once fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: ModelArchitecture,
}

impl ModelConfig {
    pub fn cell_type(&self) -> CellType {
        self.model.cell_type
    }

    pub fn layer_count(&self) -> usize {
        self.model.cells.len()
    }

    /// Unit count of a layer, `None` when out of range
    pub fn layer_units(&self, layer: usize) -> Option<usize> {
        self.model.cells.get(layer).map(|cell| cell.num_units)
    }
}
