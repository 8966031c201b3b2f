//! Regression metrics for scoring a fitted model against labeled data.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::errors::PipelineError;
use crate::fitted::FittedModel;
use crate::frame::Frame;
use crate::gbdt::from_fixed;
use crate::schema::Record;

/// A scalar evaluation metric over predictions and labels.
pub trait Metric: Send + Sync {
    /// Compute the metric. Callers guarantee equal, non-zero lengths.
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64;

    /// Whether higher values indicate better performance.
    fn higher_is_better(&self) -> bool;

    /// Name of the metric (for logging).
    fn name(&self) -> &'static str;
}

/// Mean squared error ("L2").
#[derive(Debug, Clone, Copy, Default)]
pub struct Mse;

impl Metric for Mse {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        if preds.is_empty() {
            return 0.0;
        }
        let sum: f64 = preds
            .iter()
            .zip(labels)
            .map(|(p, l)| (p - l) * (p - l))
            .sum();
        sum / preds.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "mse"
    }
}

/// Root mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

impl Metric for Rmse {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        Mse.compute(preds, labels).sqrt()
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}

/// Mean absolute error ("L1").
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

impl Metric for Mae {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        if preds.is_empty() {
            return 0.0;
        }
        let sum: f64 = preds.iter().zip(labels).map(|(p, l)| (p - l).abs()).sum();
        sum / preds.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}

/// Coefficient of determination: `1 - SS_res / SS_tot`.
///
/// A constant label column has `SS_tot = 0`; that scores 1.0 when the
/// predictions are exact and 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct RSquared;

impl Metric for RSquared {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let mean = labels.iter().sum::<f64>() / labels.len() as f64;
        let ss_tot: f64 = labels.iter().map(|l| (l - mean) * (l - mean)).sum();
        let ss_res: f64 = preds
            .iter()
            .zip(labels)
            .map(|(p, l)| (l - p) * (l - p))
            .sum();

        if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        }
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "r2"
    }
}

/// Metrics reported by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r_squared: f64,
    pub rms: f64,
    pub mae: f64,
    pub mse: f64,
    pub count: usize,
}

impl RegressionMetrics {
    /// Compute every metric over `preds` against `labels`.
    pub fn compute(preds: &[f64], labels: &[f64]) -> Result<Self, PipelineError> {
        if preds.len() != labels.len() {
            return Err(PipelineError::LengthMismatch {
                column: "predictions".to_string(),
                expected: labels.len(),
                got: preds.len(),
            });
        }
        if labels.is_empty() {
            return Err(PipelineError::EmptyFrame);
        }

        Ok(Self {
            r_squared: RSquared.compute(preds, labels),
            rms: Rmse.compute(preds, labels),
            mae: Mae.compute(preds, labels),
            mse: Mse.compute(preds, labels),
            count: labels.len(),
        })
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "R2 Score: {:.4}", self.r_squared)?;
        writeln!(f, "RMS loss: {:.4}", self.rms)?;
        writeln!(f, "L1 loss:  {:.4}", self.mae)?;
        write!(f, "L2 loss:  {:.4}", self.mse)
    }
}

/// Score `model` against labeled `records`.
pub fn evaluate<R: Record>(
    model: &FittedModel,
    records: &[R],
) -> Result<RegressionMetrics, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::EmptyFrame);
    }
    evaluate_frame(model, Frame::from_records(records)?)
}

/// Score `model` against an untransformed frame that carries the label field.
pub fn evaluate_frame(
    model: &FittedModel,
    mut frame: Frame,
) -> Result<RegressionMetrics, PipelineError> {
    if frame.is_empty() {
        return Err(PipelineError::EmptyFrame);
    }

    model.transform(&mut frame)?;
    let labels: Vec<f64> = frame
        .scalar(model.label_column())?
        .iter()
        .map(|&v| from_fixed(v))
        .collect();
    let features = model.features(&frame)?;
    let preds: Vec<f64> = features
        .iter_rows()
        .map(|row| model.model().predict(row))
        .collect();

    let metrics = RegressionMetrics::compute(&preds, &labels)?;
    info!(
        "Evaluated {} model on {} rows: r2={:.4} rms={:.4} mae={:.4}",
        model.target(),
        metrics.count,
        metrics.r_squared,
        metrics.rms,
        metrics.mae
    );
    Ok(metrics)
}
