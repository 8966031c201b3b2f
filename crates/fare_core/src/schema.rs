//! Taxi trip record schema, prediction targets and prediction results.
//!
//! Column positions are fixed: the dataset loader binds each field to a
//! zero-based column index rather than to a header name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the column holding the regression label after the copy stage.
pub const LABEL_COLUMN: &str = "Label";

/// Name of the concatenated feature vector column.
pub const FEATURES_COLUMN: &str = "Features";

/// Suffix appended to a categorical column name by one-hot encoding.
pub const ENCODED_SUFFIX: &str = "Encoded";

/// A field of the taxi trip dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    VendorId,
    RateCode,
    PassengerCount,
    TripTime,
    TripDistance,
    PaymentType,
    TripAmount,
}

/// Whether a column holds free-form categories or numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

impl Column {
    /// All columns in file order.
    pub const ALL: [Column; 7] = [
        Column::VendorId,
        Column::RateCode,
        Column::PassengerCount,
        Column::TripTime,
        Column::TripDistance,
        Column::PaymentType,
        Column::TripAmount,
    ];

    /// Zero-based position of the column in the dataset file.
    pub const fn index(self) -> usize {
        match self {
            Column::VendorId => 0,
            Column::RateCode => 1,
            Column::PassengerCount => 2,
            Column::TripTime => 3,
            Column::TripDistance => 4,
            Column::PaymentType => 5,
            Column::TripAmount => 6,
        }
    }

    pub const fn kind(self) -> ColumnKind {
        match self {
            Column::VendorId | Column::RateCode | Column::PaymentType => ColumnKind::Categorical,
            _ => ColumnKind::Numeric,
        }
    }

    /// Column name as used inside a frame.
    pub const fn name(self) -> &'static str {
        match self {
            Column::VendorId => "VendorID",
            Column::RateCode => "RateCode",
            Column::PassengerCount => "PassengerCount",
            Column::TripTime => "TripTime",
            Column::TripDistance => "TripDistance",
            Column::PaymentType => "PaymentType",
            Column::TripAmount => "TripAmount",
        }
    }

    /// Name of the derived one-hot column, e.g. `VendorIDEncoded`.
    pub fn encoded_name(self) -> String {
        format!("{}{}", self.name(), ENCODED_SUFFIX)
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed field value read out of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f32),
}

/// A typed observation that can be turned into a frame.
pub trait Record {
    /// Columns this record type carries, in file order.
    const LAYOUT: &'static [Column];

    /// Returns the value of `column`, or `None` if the record does not carry it.
    fn field(&self, column: Column) -> Option<FieldValue<'_>>;
}

/// One taxi trip observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vendor_id: String,
    pub rate_code: String,
    pub passenger_count: f32,
    /// Trip duration in seconds
    pub trip_time: f32,
    pub trip_distance: f32,
    pub payment_type: String,
    /// Fare amount; the label for fare training, ignored otherwise
    pub trip_amount: f32,
}

impl Record for TripRecord {
    const LAYOUT: &'static [Column] = &Column::ALL;

    fn field(&self, column: Column) -> Option<FieldValue<'_>> {
        Some(match column {
            Column::VendorId => FieldValue::Text(&self.vendor_id),
            Column::RateCode => FieldValue::Text(&self.rate_code),
            Column::PassengerCount => FieldValue::Number(self.passenger_count),
            Column::TripTime => FieldValue::Number(self.trip_time),
            Column::TripDistance => FieldValue::Number(self.trip_distance),
            Column::PaymentType => FieldValue::Text(&self.payment_type),
            Column::TripAmount => FieldValue::Number(self.trip_amount),
        })
    }
}

/// The time/distance subset used by the distance and time models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReducedRecord {
    pub trip_time: f32,
    pub trip_distance: f32,
}

impl Record for ReducedRecord {
    const LAYOUT: &'static [Column] = &[Column::TripTime, Column::TripDistance];

    fn field(&self, column: Column) -> Option<FieldValue<'_>> {
        match column {
            Column::TripTime => Some(FieldValue::Number(self.trip_time)),
            Column::TripDistance => Some(FieldValue::Number(self.trip_distance)),
            _ => None,
        }
    }
}

impl From<&TripRecord> for ReducedRecord {
    fn from(trip: &TripRecord) -> Self {
        Self {
            trip_time: trip.trip_time,
            trip_distance: trip.trip_distance,
        }
    }
}

/// Which record type a target trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Trip,
    Reduced,
}

/// A prediction target. Each target fixes its label and its feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Fare,
    Distance,
    Time,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Fare, Target::Distance, Target::Time];

    pub const fn label(self) -> Column {
        match self {
            Target::Fare => Column::TripAmount,
            Target::Distance => Column::TripDistance,
            Target::Time => Column::TripTime,
        }
    }

    /// Feature columns in concatenation order.
    pub const fn features(self) -> &'static [Column] {
        match self {
            Target::Fare => &[
                Column::VendorId,
                Column::RateCode,
                Column::PassengerCount,
                Column::TripTime,
                Column::TripDistance,
                Column::PaymentType,
            ],
            Target::Distance => &[Column::TripTime],
            Target::Time => &[Column::TripDistance],
        }
    }

    pub const fn layout(self) -> Layout {
        match self {
            Target::Fare => Layout::Trip,
            Target::Distance | Target::Time => Layout::Reduced,
        }
    }

    /// Name of the scalar a model for this target produces.
    pub const fn output_name(self) -> &'static str {
        match self {
            Target::Fare => "FareAmount",
            Target::Distance => "Distance",
            Target::Time => "Seconds",
        }
    }

    /// Default artifact file name for this target.
    pub const fn model_file_name(self) -> &'static str {
        match self {
            Target::Fare => "model_taxi_fare.bin",
            Target::Distance => "model_taxi_distance.bin",
            Target::Time => "model_taxi_time.bin",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Target::Fare => "fare",
            Target::Distance => "distance",
            Target::Time => "time",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fare" => Ok(Target::Fare),
            "distance" => Ok(Target::Distance),
            "time" => Ok(Target::Time),
            other => Err(format!(
                "unknown target '{other}' (expected fare, distance or time)"
            )),
        }
    }
}

/// A single named scalar produced by applying a model to one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub target: Target,
    pub value: f64,
}

impl PredictionResult {
    pub fn name(&self) -> &'static str {
        self.target.output_name()
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.4}", self.name(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_positions_follow_file_order() {
        for (i, column) in Column::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
        assert_eq!(Column::from_name("VendorID"), Some(Column::VendorId));
        assert_eq!(Column::from_name("Fare"), None);
    }

    #[test]
    fn test_reduced_record_lacks_categoricals() {
        let reduced = ReducedRecord {
            trip_time: 600.0,
            trip_distance: 2.0,
        };
        assert_eq!(reduced.field(Column::VendorId), None);
        assert_eq!(
            reduced.field(Column::TripTime),
            Some(FieldValue::Number(600.0))
        );
    }

    #[test]
    fn test_target_features_exclude_label() {
        for target in Target::ALL {
            assert!(!target.features().contains(&target.label()));
        }
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("Fare".parse::<Target>(), Ok(Target::Fare));
        assert_eq!(" time ".parse::<Target>(), Ok(Target::Time));
        assert!("speed".parse::<Target>().is_err());
    }

    #[test]
    fn test_prediction_display() {
        let result = PredictionResult {
            target: Target::Fare,
            value: 15.5,
        };
        assert_eq!(result.to_string(), "FareAmount: 15.5000");
    }
}
