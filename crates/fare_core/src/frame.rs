//! In-memory column store the feature pipeline operates on.
//!
//! Numeric columns are held as fixed-point integers at [`SCALE`]. Vector
//! columns (one-hot encodings, the concatenated feature vector) are stored
//! row-major.

use crate::errors::PipelineError;
use crate::gbdt::{to_fixed, SCALE};
use crate::schema::{ColumnKind, FieldValue, Record};

/// One-hot slot value: 1.0 in fixed-point.
pub const HOT: i64 = SCALE;

/// Data of one frame column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<String>),
    Scalar(Vec<i64>),
    Vector { width: usize, values: Vec<i64> },
}

impl ColumnData {
    /// Number of rows held by the column.
    pub fn rows(&self) -> usize {
        match self {
            ColumnData::Text(values) => values.len(),
            ColumnData::Scalar(values) => values.len(),
            ColumnData::Vector { width, values } => {
                if *width == 0 {
                    0
                } else {
                    values.len() / width
                }
            }
        }
    }

    /// Number of feature slots the column contributes per row.
    pub fn width(&self) -> Option<usize> {
        match self {
            ColumnData::Text(_) => None,
            ColumnData::Scalar(_) => Some(1),
            ColumnData::Vector { width, .. } => Some(*width),
        }
    }

    /// Feature slots of `row`, or `None` for text columns.
    pub fn numeric_row(&self, row: usize) -> Option<&[i64]> {
        match self {
            ColumnData::Text(_) => None,
            ColumnData::Scalar(values) => values.get(row..row + 1),
            ColumnData::Vector { width, values } => values.get(row * width..(row + 1) * width),
        }
    }
}

/// Ordered set of named, equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    rows: usize,
    columns: Vec<(String, ColumnData)>,
}

impl Frame {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: Vec::new(),
        }
    }

    /// Build a frame holding every column of `R::LAYOUT`.
    pub fn from_records<R: Record>(records: &[R]) -> Result<Self, PipelineError> {
        let mut frame = Frame::new(records.len());

        for &column in R::LAYOUT {
            let data = match column.kind() {
                ColumnKind::Categorical => {
                    let values = records
                        .iter()
                        .map(|record| match record.field(column) {
                            Some(FieldValue::Text(text)) => Ok(text.to_string()),
                            _ => Err(PipelineError::InvalidRecord(format!(
                                "{column} must be a text field"
                            ))),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    ColumnData::Text(values)
                }
                ColumnKind::Numeric => {
                    let values = records
                        .iter()
                        .map(|record| match record.field(column) {
                            Some(FieldValue::Number(value))
                                if value.is_finite() && value >= 0.0 =>
                            {
                                Ok(to_fixed(value as f64))
                            }
                            Some(FieldValue::Number(value)) => Err(PipelineError::InvalidRecord(
                                format!("{column} must be a non-negative number, got {value}"),
                            )),
                            _ => Err(PipelineError::InvalidRecord(format!(
                                "{column} must be a number"
                            ))),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    ColumnData::Scalar(values)
                }
            };
            frame.insert(column.name(), data)?;
        }

        Ok(frame)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, data)| data)
    }

    /// Like [`Frame::get`] but reports a missing column as an error.
    pub fn column(&self, name: &str) -> Result<&ColumnData, PipelineError> {
        self.get(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Add a column, replacing any existing column with the same name.
    pub fn insert(&mut self, name: &str, data: ColumnData) -> Result<(), PipelineError> {
        if data.rows() != self.rows {
            return Err(PipelineError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows,
                got: data.rows(),
            });
        }

        match self.columns.iter_mut().find(|(column, _)| column == name) {
            Some((_, existing)) => *existing = data,
            None => self.columns.push((name.to_string(), data)),
        }
        Ok(())
    }

    /// A scalar column's values.
    pub fn scalar(&self, name: &str) -> Result<&[i64], PipelineError> {
        match self.column(name)? {
            ColumnData::Scalar(values) => Ok(values),
            _ => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "scalar",
            }),
        }
    }

    /// A numeric column (scalar or vector) viewed as a feature matrix.
    pub fn feature_matrix(&self, name: &str) -> Result<FeatureMatrix, PipelineError> {
        match self.column(name)? {
            ColumnData::Vector { width, values } => Ok(FeatureMatrix {
                rows: self.rows,
                width: *width,
                values: values.clone(),
            }),
            ColumnData::Scalar(values) => Ok(FeatureMatrix {
                rows: self.rows,
                width: 1,
                values: values.clone(),
            }),
            ColumnData::Text(_) => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }
}

/// Dense row-major matrix of fixed-point features handed to a regressor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    width: usize,
    values: Vec<i64>,
}

impl FeatureMatrix {
    pub fn new(rows: usize, width: usize, values: Vec<i64>) -> Result<Self, PipelineError> {
        if values.len() != rows * width {
            return Err(PipelineError::LengthMismatch {
                column: "features".to_string(),
                expected: rows * width,
                got: values.len(),
            });
        }
        Ok(Self {
            rows,
            width,
            values,
        })
    }

    /// Build a matrix from floating-point rows, converting to fixed-point.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PipelineError> {
        let width = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(PipelineError::FeatureWidth {
                    expected: width,
                    got: row.len(),
                });
            }
            values.extend(row.iter().map(|&v| to_fixed(v)));
        }
        Self::new(rows.len(), width, values)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> &[i64] {
        &self.values[index * self.width..(index + 1) * self.width]
    }

    /// Value of one feature slot for one row.
    pub fn get(&self, row: usize, feature: usize) -> i64 {
        self.values[row * self.width + feature]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[i64]> {
        (0..self.rows).map(move |i| self.row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ReducedRecord, TripRecord};

    fn trip(vendor: &str, distance: f32) -> TripRecord {
        TripRecord {
            vendor_id: vendor.to_string(),
            rate_code: "1".to_string(),
            passenger_count: 1.0,
            trip_time: 600.0,
            trip_distance: distance,
            payment_type: "CRD".to_string(),
            trip_amount: 9.5,
        }
    }

    #[test]
    fn test_frame_from_trip_records() {
        let frame = Frame::from_records(&[trip("VTS", 2.5), trip("CMT", 1.0)]).unwrap();

        assert_eq!(frame.rows(), 2);
        assert_eq!(frame.column_names().count(), 7);
        assert_eq!(
            frame.get("VendorID"),
            Some(&ColumnData::Text(vec!["VTS".into(), "CMT".into()]))
        );
        assert_eq!(frame.scalar("TripDistance").unwrap(), &[2_500_000, 1_000_000]);
    }

    #[test]
    fn test_frame_from_reduced_records() {
        let frame = Frame::from_records(&[ReducedRecord {
            trip_time: 60.0,
            trip_distance: 0.25,
        }])
        .unwrap();

        assert!(!frame.contains("VendorID"));
        assert_eq!(frame.scalar("TripTime").unwrap(), &[60_000_000]);
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        let err = Frame::from_records(&[trip("VTS", f32::NAN)]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRecord(_)));
    }

    #[test]
    fn test_negative_numbers_rejected() {
        let err = Frame::from_records(&[trip("VTS", 1.0), trip("CMT", -40.0)]).unwrap_err();
        match err {
            PipelineError::InvalidRecord(message) => assert!(message.contains("TripDistance")),
            other => panic!("unexpected error: {other:?}"),
        }

        let reduced = ReducedRecord {
            trip_time: -1.0,
            trip_distance: 2.0,
        };
        assert!(Frame::from_records(&[reduced]).is_err());

        // Zero is a valid value
        assert!(Frame::from_records(&[trip("VTS", 0.0)]).is_ok());
    }

    #[test]
    fn test_insert_checks_length() {
        let mut frame = Frame::new(2);
        assert!(frame.insert("x", ColumnData::Scalar(vec![1])).is_err());
        assert!(frame.insert("x", ColumnData::Scalar(vec![1, 2])).is_ok());

        // Replacing keeps a single column
        frame.insert("x", ColumnData::Scalar(vec![3, 4])).unwrap();
        assert_eq!(frame.column_names().count(), 1);
        assert_eq!(frame.scalar("x").unwrap(), &[3, 4]);
    }

    #[test]
    fn test_feature_matrix_from_rows() {
        let matrix = FeatureMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.5]]).unwrap();
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.row(1), &[3_000_000, 4_500_000]);
        assert!(FeatureMatrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }
}
