//! Per-cell QC metric vectors.

use crate::error::{QcError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Aligned per-cell damage and complexity metrics.
///
/// `damage` is the fraction of reads assigned to a stress-marker gene set,
/// conventionally expressed as a percentage (0-100). `complexity` is the
/// number of distinct features detected in the cell. Records are aligned by
/// index and immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellMetrics {
    cell_ids: Vec<String>,
    damage: Vec<f64>,
    complexity: Vec<f64>,
}

impl CellMetrics {
    /// Create a new metric set from aligned vectors.
    ///
    /// Validates that all three vectors have equal length, that the set is
    /// non-empty, and that every value is finite and non-negative.
    pub fn new(cell_ids: Vec<String>, damage: Vec<f64>, complexity: Vec<f64>) -> Result<Self> {
        if damage.len() != complexity.len() {
            return Err(QcError::DimensionMismatch {
                expected: damage.len(),
                actual: complexity.len(),
            });
        }
        if cell_ids.len() != damage.len() {
            return Err(QcError::DimensionMismatch {
                expected: damage.len(),
                actual: cell_ids.len(),
            });
        }
        if damage.is_empty() {
            return Err(QcError::EmptyData("no records provided".to_string()));
        }
        validate_metric("damage", &damage)?;
        validate_metric("complexity", &complexity)?;
        Ok(Self {
            cell_ids,
            damage,
            complexity,
        })
    }

    /// Create a metric set with generated cell identifiers.
    pub fn from_vectors(damage: Vec<f64>, complexity: Vec<f64>) -> Result<Self> {
        let cell_ids = (0..damage.len()).map(|i| format!("Cell_{:05}", i)).collect();
        Self::new(cell_ids, damage, complexity)
    }

    /// Load metrics from a TSV file with columns `cell_id`, `damage`,
    /// `complexity`.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let mut cell_ids = Vec::new();
        let mut damage = Vec::new();
        let mut complexity = Vec::new();

        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() < 3 {
                return Err(QcError::EmptyData(format!(
                    "record {} has {} fields, expected 3",
                    index,
                    record.len()
                )));
            }
            cell_ids.push(record[0].to_string());
            damage.push(parse_metric("damage", &record[1], index)?);
            complexity.push(parse_metric("complexity", &record[2], index)?);
        }

        Self::new(cell_ids, damage, complexity)
    }

    /// Write metrics to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(["cell_id", "damage", "complexity"])?;
        for i in 0..self.len() {
            let damage = self.damage[i].to_string();
            let complexity = self.complexity[i].to_string();
            writer.write_record([
                self.cell_ids[i].as_str(),
                damage.as_str(),
                complexity.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.damage.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.damage.is_empty()
    }

    /// Cell identifiers.
    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    /// Damage metric values.
    pub fn damage(&self) -> &[f64] {
        &self.damage
    }

    /// Complexity metric values.
    pub fn complexity(&self) -> &[f64] {
        &self.complexity
    }

    /// Minimum and maximum observed complexity.
    pub fn complexity_range(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &x in &self.complexity {
            min = min.min(x);
            max = max.max(x);
        }
        (min, max)
    }
}

fn validate_metric(name: &str, values: &[f64]) -> Result<()> {
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(QcError::InvalidMetric {
                metric: name.to_string(),
                value: value.to_string(),
                index,
            });
        }
    }
    Ok(())
}

fn parse_metric(name: &str, field: &str, index: usize) -> Result<f64> {
    field.trim().parse().map_err(|_| QcError::InvalidMetric {
        metric: name.to_string(),
        value: field.to_string(),
        index,
    })
}
