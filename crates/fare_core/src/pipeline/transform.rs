//! Column transforms: label copy, one-hot encoding and concatenation.
//!
//! A [`Transform`] is the unfitted stage; fitting it against a frame yields a
//! serializable [`FittedTransform`] that can be replayed on new frames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::PipelineError;
use crate::frame::{ColumnData, Frame, HOT};

/// An unfitted column transform.
pub trait Transform: fmt::Debug + Send + Sync {
    /// Short stage name used in logs.
    fn name(&self) -> &'static str;

    /// Learn whatever state the transform needs from `frame`.
    fn fit(&self, frame: &Frame) -> Result<FittedTransform, PipelineError>;
}

/// Copies a column under a new name (used to select the label).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyColumn {
    pub input: String,
    pub output: String,
}

impl CopyColumn {
    pub fn new(output: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

impl Transform for CopyColumn {
    fn name(&self) -> &'static str {
        "copy_column"
    }

    fn fit(&self, frame: &Frame) -> Result<FittedTransform, PipelineError> {
        frame.column(&self.input)?;
        Ok(FittedTransform::CopyColumn {
            input: self.input.clone(),
            output: self.output.clone(),
        })
    }
}

/// One-hot encodes a text column; the vocabulary is learned at fit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotEncoding {
    pub input: String,
    pub output: String,
}

impl OneHotEncoding {
    pub fn new(output: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

impl Transform for OneHotEncoding {
    fn name(&self) -> &'static str {
        "one_hot_encoding"
    }

    fn fit(&self, frame: &Frame) -> Result<FittedTransform, PipelineError> {
        let values = match frame.column(&self.input)? {
            ColumnData::Text(values) => values,
            _ => {
                return Err(PipelineError::ColumnType {
                    column: self.input.clone(),
                    expected: "text",
                })
            }
        };

        if values.is_empty() {
            return Err(PipelineError::EmptyFrame);
        }

        let vocabulary: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        Ok(FittedTransform::OneHot {
            input: self.input.clone(),
            output: self.output.clone(),
            vocabulary: vocabulary.into_iter().map(str::to_string).collect(),
        })
    }
}

/// Concatenates numeric columns into one vector column, in the given order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concatenate {
    pub inputs: Vec<String>,
    pub output: String,
}

impl Concatenate {
    pub fn new<I, S>(output: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: output.into(),
        }
    }
}

impl Transform for Concatenate {
    fn name(&self) -> &'static str {
        "concatenate"
    }

    fn fit(&self, frame: &Frame) -> Result<FittedTransform, PipelineError> {
        if self.inputs.is_empty() {
            return Err(PipelineError::MissingColumn(format!(
                "{} needs at least one input",
                self.output
            )));
        }

        for input in &self.inputs {
            if frame.column(input)?.width().is_none() {
                return Err(PipelineError::ColumnType {
                    column: input.clone(),
                    expected: "numeric",
                });
            }
        }

        Ok(FittedTransform::Concatenate {
            inputs: self.inputs.clone(),
            output: self.output.clone(),
        })
    }
}

/// A fitted pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedTransform {
    CopyColumn {
        input: String,
        output: String,
    },
    OneHot {
        input: String,
        output: String,
        /// Sorted, de-duplicated categories seen during fitting
        vocabulary: Vec<String>,
    },
    Concatenate {
        inputs: Vec<String>,
        output: String,
    },
}

impl FittedTransform {
    pub fn output(&self) -> &str {
        match self {
            FittedTransform::CopyColumn { output, .. }
            | FittedTransform::OneHot { output, .. }
            | FittedTransform::Concatenate { output, .. } => output,
        }
    }

    /// Apply the stage to `frame`, adding its output column.
    ///
    /// A copy whose input is absent is skipped, so records without a label
    /// still flow through a training-time chain.
    pub fn apply(&self, frame: &mut Frame) -> Result<(), PipelineError> {
        match self {
            FittedTransform::CopyColumn { input, output } => {
                let Some(data) = frame.get(input).cloned() else {
                    return Ok(());
                };
                frame.insert(output, data)
            }
            FittedTransform::OneHot {
                input,
                output,
                vocabulary,
            } => {
                let encoded = one_hot(frame, input, vocabulary)?;
                frame.insert(output, encoded)
            }
            FittedTransform::Concatenate { inputs, output } => {
                let concatenated = concatenate(frame, inputs)?;
                frame.insert(output, concatenated)
            }
        }
    }
}

fn one_hot(frame: &Frame, input: &str, vocabulary: &[String]) -> Result<ColumnData, PipelineError> {
    let values = match frame.column(input)? {
        ColumnData::Text(values) => values,
        _ => {
            return Err(PipelineError::ColumnType {
                column: input.to_string(),
                expected: "text",
            })
        }
    };

    let width = vocabulary.len();
    let mut encoded = vec![0i64; values.len() * width];
    for (row, value) in values.iter().enumerate() {
        // Unseen categories stay all-zero
        if let Ok(slot) = vocabulary.binary_search_by(|v| v.as_str().cmp(value.as_str())) {
            encoded[row * width + slot] = HOT;
        }
    }

    Ok(ColumnData::Vector {
        width,
        values: encoded,
    })
}

fn concatenate(frame: &Frame, inputs: &[String]) -> Result<ColumnData, PipelineError> {
    let columns = inputs
        .iter()
        .map(|name| {
            let column = frame.column(name)?;
            column
                .width()
                .map(|width| (column, width))
                .ok_or_else(|| PipelineError::ColumnType {
                    column: name.clone(),
                    expected: "numeric",
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let width: usize = columns.iter().map(|(_, width)| width).sum();
    let mut values = Vec::with_capacity(frame.rows() * width);
    for row in 0..frame.rows() {
        for (column, _) in &columns {
            if let Some(slots) = column.numeric_row(row) {
                values.extend_from_slice(slots);
            }
        }
    }

    Ok(ColumnData::Vector { width, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        let mut frame = Frame::new(3);
        frame
            .insert(
                "Vendor",
                ColumnData::Text(vec!["VTS".into(), "CMT".into(), "VTS".into()]),
            )
            .unwrap();
        frame
            .insert("Distance", ColumnData::Scalar(vec![1, 2, 3]))
            .unwrap();
        frame
    }

    #[test]
    fn test_one_hot_vocabulary_is_sorted() {
        let fitted = OneHotEncoding::new("VendorEncoded", "Vendor")
            .fit(&frame())
            .unwrap();

        match &fitted {
            FittedTransform::OneHot { vocabulary, .. } => {
                assert_eq!(vocabulary, &vec!["CMT".to_string(), "VTS".to_string()]);
            }
            other => panic!("unexpected stage: {other:?}"),
        }

        let mut frame = frame();
        fitted.apply(&mut frame).unwrap();
        assert_eq!(
            frame.get("VendorEncoded"),
            Some(&ColumnData::Vector {
                width: 2,
                values: vec![0, HOT, HOT, 0, 0, HOT],
            })
        );
    }

    #[test]
    fn test_unseen_category_encodes_to_zeros() {
        let fitted = OneHotEncoding::new("VendorEncoded", "Vendor")
            .fit(&frame())
            .unwrap();

        let mut unseen = Frame::new(1);
        unseen
            .insert("Vendor", ColumnData::Text(vec!["DDS".into()]))
            .unwrap();
        fitted.apply(&mut unseen).unwrap();

        assert_eq!(
            unseen.get("VendorEncoded"),
            Some(&ColumnData::Vector {
                width: 2,
                values: vec![0, 0],
            })
        );
    }

    #[test]
    fn test_one_hot_rejects_numeric_input() {
        let err = OneHotEncoding::new("x", "Distance").fit(&frame()).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnType { .. }));
    }

    #[test]
    fn test_concatenate_preserves_order() {
        let mut frame = frame();
        OneHotEncoding::new("VendorEncoded", "Vendor")
            .fit(&frame)
            .unwrap()
            .apply(&mut frame)
            .unwrap();

        let fitted = Concatenate::new("Features", ["Distance", "VendorEncoded"])
            .fit(&frame)
            .unwrap();
        fitted.apply(&mut frame).unwrap();

        let matrix = frame.feature_matrix("Features").unwrap();
        assert_eq!(matrix.width(), 3);
        assert_eq!(matrix.row(0), &[1, 0, HOT]);
        assert_eq!(matrix.row(1), &[2, HOT, 0]);
    }

    #[test]
    fn test_concatenate_rejects_text_and_missing() {
        assert!(Concatenate::new("F", ["Vendor"]).fit(&frame()).is_err());
        assert!(Concatenate::new("F", ["Nope"]).fit(&frame()).is_err());
        assert!(Concatenate::new("F", Vec::<String>::new())
            .fit(&frame())
            .is_err());
    }

    #[test]
    fn test_copy_skips_missing_input() {
        let fitted = CopyColumn::new("Label", "Distance").fit(&frame()).unwrap();

        let mut without_label = Frame::new(1);
        fitted.apply(&mut without_label).unwrap();
        assert!(!without_label.contains("Label"));

        let mut with_label = frame();
        fitted.apply(&mut with_label).unwrap();
        assert_eq!(with_label.scalar("Label").unwrap(), &[1, 2, 3]);
    }
}
