// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: mean total loss over training batches
//   - val_loss:   mean total loss over validation batches
//   - l1, kl, l1_uninf, mse: validation loss terms; a column
//     is left empty when the policy class has no such term
//     (ACT has no mse, CNNMLP has only mse)
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss,l1,kl,l1_uninf,mse
//   1,0.912300,0.884100,0.402000,0.047500,0.004800,
//   2,0.701200,0.690800,0.331000,0.034900,0.004100,
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// Loss-term columns, in CSV order
pub const TERM_COLUMNS: [&str; 4] = ["l1", "kl", "l1_uninf", "mse"];

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch: usize,

    pub train_loss: f64,

    /// Should track train_loss; divergence indicates overfitting
    pub val_loss: f64,

    /// Mean validation value of each loss term
    pub terms: BTreeMap<String, f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, terms: BTreeMap<String, f64>) -> Self {
        Self { epoch, train_loss, val_loss, terms }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }

    fn csv_row(&self) -> String {
        let mut fields = vec![
            self.epoch.to_string(),
            format!("{:.6}", self.train_loss),
            format!("{:.6}", self.val_loss),
        ];
        fields.extend(TERM_COLUMNS.iter().map(|name| {
            self.terms.get(*name).map(|v| format!("{v:.6}")).unwrap_or_default()
        }));
        fields.join(",")
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");

        // Appending across runs keeps one log per checkpoint dir
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss,{}", TERM_COLUMNS.join(","))?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, BTreeMap::new());
        // 2.3 < 3.0 → this is an improvement
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_rows_leave_missing_terms_empty() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();

        let terms = BTreeMap::from([
            ("l1".to_string(), 0.5),
            ("kl".to_string(), 0.25),
            ("l1_uninf".to_string(), 0.005),
        ]);
        logger.log(&EpochMetrics::new(1, 1.0, 0.75, terms)).unwrap();
        logger
            .log(&EpochMetrics::new(2, 0.5, 0.4, BTreeMap::from([("mse".to_string(), 0.4)])))
            .unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss,l1,kl,l1_uninf,mse");
        assert_eq!(lines[1], "1,1.000000,0.750000,0.500000,0.250000,0.005000,");
        assert_eq!(lines[2], "2,0.500000,0.400000,,,,0.400000");
    }
}
