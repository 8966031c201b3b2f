//! Interactive menu shell
//!
//! An explicit read-dispatch loop over a line-oriented reader and writer, so
//! sessions can be scripted in tests. Operation failures are reported and the
//! menu is shown again; only I/O errors on the terminal end the session.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use taxifare_core::metrics::RegressionMetrics;
use taxifare_core::{persist, FittedModel, PersistError, PipelineError, Target, TripRecord};

use crate::config::AppConfig;
use crate::errors::TrainerError;
use crate::workflow::{evaluate_dataset, train_for_target};

/// Recorded fare of the fixed sample trip.
pub const SAMPLE_ACTUAL_FARE: f64 = 15.5;

const MENU: &str = "\
Enter 1. for model evaluation.
Enter 2. for testing model with user input.
Enter 3. for testing model using predefined values.
Enter 4. to train model for distance prediction.
Enter 5. to train model for journey time prediction.
Enter 6. to exit.";

const BANNER: &str = "**********************************************************************";

#[derive(Debug, Error)]
pub enum ShellError {
    /// Input that should have been a number
    #[error("'{0}' is not a number")]
    Parse(String),

    #[error("Invalid choice: {0}")]
    InvalidSelection(String),

    #[error(transparent)]
    Trainer(#[from] TrainerError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Evaluate,
    PredictManual,
    PredictSample,
    TrainDistance,
    TrainTime,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_number::<i64>(s)? {
            1 => Ok(MenuChoice::Evaluate),
            2 => Ok(MenuChoice::PredictManual),
            3 => Ok(MenuChoice::PredictSample),
            4 => Ok(MenuChoice::TrainDistance),
            5 => Ok(MenuChoice::TrainTime),
            6 => Ok(MenuChoice::Exit),
            other => Err(ShellError::InvalidSelection(other.to_string())),
        }
    }
}

/// The trip field a manual prediction overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualField {
    Distance,
    Minutes,
    Passengers,
}

impl ManualField {
    pub fn prompt(self) -> &'static str {
        match self {
            ManualField::Distance => "Enter distance you want to travel.",
            ManualField::Minutes => "Enter time in minutes.",
            ManualField::Passengers => "Enter number of passengers",
        }
    }

    /// Write `value` into `trip`; minutes are stored as seconds.
    pub fn apply(self, trip: &mut TripRecord, value: f32) {
        match self {
            ManualField::Distance => trip.trip_distance = value,
            ManualField::Minutes => trip.trip_time = value * 60.0,
            ManualField::Passengers => trip.passenger_count = value,
        }
    }
}

impl FromStr for ManualField {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_number::<i64>(s)? {
            1 => Ok(ManualField::Distance),
            2 => Ok(ManualField::Minutes),
            3 => Ok(ManualField::Passengers),
            other => Err(ShellError::InvalidSelection(other.to_string())),
        }
    }
}

/// Trip used for manual predictions before the entered field is applied.
pub fn default_trip() -> TripRecord {
    TripRecord {
        vendor_id: "VTS".to_string(),
        rate_code: "1".to_string(),
        passenger_count: 1.0,
        trip_time: 1440.0,
        trip_distance: 5.0,
        payment_type: "CRD".to_string(),
        trip_amount: 0.0,
    }
}

/// A manual trip with `field` set to `value` and every other field defaulted.
pub fn manual_trip(field: ManualField, value: f32) -> TripRecord {
    let mut trip = default_trip();
    field.apply(&mut trip, value);
    trip
}

/// The fixed sample trip whose recorded fare is [`SAMPLE_ACTUAL_FARE`].
pub fn sample_trip() -> TripRecord {
    TripRecord {
        vendor_id: "VTS".to_string(),
        rate_code: "1".to_string(),
        passenger_count: 2.0,
        trip_time: 1140.0,
        trip_distance: 3.75,
        payment_type: "CRD".to_string(),
        trip_amount: 0.0,
    }
}

fn parse_number<T: FromStr>(input: &str) -> Result<T, ShellError> {
    let trimmed = input.trim();
    trimmed
        .parse()
        .map_err(|_| ShellError::Parse(trimmed.to_string()))
}

/// Train a model for `target`, save it to its artifact path and report progress.
pub fn train_and_save<W: Write>(
    config: &AppConfig,
    target: Target,
    out: &mut W,
) -> Result<FittedModel, ShellError> {
    writeln!(out, "Training model for {target} prediction........")?;
    let model = train_for_target(target, &config.train_path(), &config.training)?;
    writeln!(out, "Model trained.")?;

    let path = config.model_path(target);
    persist::save(&model, &path)?;
    writeln!(out, "Model saved to: {}", path.display())?;
    Ok(model)
}

/// Write the evaluation block for `metrics`.
pub fn write_metrics<W: Write>(out: &mut W, metrics: &RegressionMetrics) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "*************************************************")?;
    writeln!(out, "*       Model quality metrics evaluation")?;
    writeln!(out, "*------------------------------------------------")?;
    writeln!(
        out,
        "*       R2 Score:      {:.2}. Closer to 1 the better the model has trained",
        metrics.r_squared
    )?;
    writeln!(
        out,
        "*       RMS loss:      {:.2}. The lesser it is the better the model has trained",
        metrics.rms
    )?;
    writeln!(out, "        Actual loss: {:.4}", metrics.mae)?;
    writeln!(out, "__________________________________________________")
}

enum Flow {
    Continue,
    Exit,
}

/// Menu loop over an input and an output stream.
pub struct Shell<R, W> {
    config: AppConfig,
    current: FittedModel,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    /// `current` is the model menu 1 evaluates until a retrain replaces it.
    pub fn new(config: AppConfig, current: FittedModel, input: R, output: W) -> Self {
        Self {
            config,
            current,
            input,
            output,
        }
    }

    pub fn current(&self) -> &FittedModel {
        &self.current
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until the user exits or input ends.
    pub fn run(&mut self) -> Result<(), ShellError> {
        loop {
            writeln!(self.output, "{MENU}")?;
            let Some(line) = self.read_line()? else {
                info!("Input closed, leaving shell");
                return Ok(());
            };

            let result = line
                .parse::<MenuChoice>()
                .and_then(|choice| self.dispatch(choice));

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(ShellError::Io(e)) => return Err(ShellError::Io(e)),
                Err(ShellError::InvalidSelection(_)) => {
                    writeln!(self.output, "Invalid choice.")?;
                }
                Err(e) => {
                    warn!("Shell operation failed: {e}");
                    writeln!(self.output, "Error: {e}")?;
                }
            }
        }
    }

    fn dispatch(&mut self, choice: MenuChoice) -> Result<Flow, ShellError> {
        match choice {
            MenuChoice::Evaluate => {
                let metrics = evaluate_dataset(&self.current, &self.config.test_path())?;
                write_metrics(&mut self.output, &metrics)?;
            }
            MenuChoice::PredictManual => return self.predict_manual(),
            MenuChoice::PredictSample => {
                let prediction = self.predict_fare(&sample_trip())?;
                writeln!(self.output, "{BANNER}")?;
                writeln!(
                    self.output,
                    "Predicted fare: {prediction:.4}, actual fare: {SAMPLE_ACTUAL_FARE}"
                )?;
                writeln!(self.output, "{BANNER}")?;
            }
            MenuChoice::TrainDistance => self.retrain(Target::Distance)?,
            MenuChoice::TrainTime => self.retrain(Target::Time)?,
            MenuChoice::Exit => {
                writeln!(self.output, "Closing connections.....")?;
                writeln!(self.output, "Connections closed.")?;
                writeln!(self.output, "Bye!!")?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn predict_manual(&mut self) -> Result<Flow, ShellError> {
        writeln!(self.output, "Press 1. to get prediction based on distance to travel")?;
        writeln!(self.output, "Press 2. to get prediction based on time of travel")?;
        writeln!(self.output, "Press 3. to get prediction based on number of passengers.")?;
        let Some(line) = self.read_line()? else {
            return Ok(Flow::Exit);
        };
        let field = match line.parse::<ManualField>() {
            Ok(field) => field,
            Err(ShellError::InvalidSelection(_)) => {
                writeln!(self.output, "Invalid input")?;
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e),
        };

        writeln!(self.output, "{}", field.prompt())?;
        let Some(line) = self.read_line()? else {
            return Ok(Flow::Exit);
        };
        let value: f32 = parse_number(&line)?;

        let prediction = self.predict_fare(&manual_trip(field, value))?;
        writeln!(self.output, "{BANNER}")?;
        writeln!(self.output, "Predicted fare: {prediction:.4}.")?;
        writeln!(self.output, "{BANNER}")?;
        Ok(Flow::Continue)
    }

    /// Fare predictions always use the saved fare artifact.
    fn predict_fare(&self, trip: &TripRecord) -> Result<f64, ShellError> {
        let model = persist::load(self.config.model_path(Target::Fare))?;
        Ok(model.predict(trip)?.value)
    }

    fn retrain(&mut self, target: Target) -> Result<(), ShellError> {
        let model = train_and_save(&self.config, target, &mut self.output)?;
        let metrics = evaluate_dataset(&model, &self.config.test_path())?;
        write_metrics(&mut self.output, &metrics)?;
        self.current = model;
        Ok(())
    }

    /// Next input line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>, ShellError> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
