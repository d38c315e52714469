use crate::execute::dataset::Dataset;
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::{DEFAULT_TIME_COL_LABEL, DEFAULT_VALUE_COL_LABEL};
use crate::functions::aggregate::Numeric;
use crate::table::reader::typed_column;
use crate::table::{col_idx, ColMeta, ColReader, DataType, GroupKey, Table};
use crate::time::Time;

pub const PREDICT_LINEAR_KIND: &str = "predictLinear";

#[derive(Debug, Clone, PartialEq)]
pub struct PredictLinearSpec {
    /// The y column followed by the time-typed x column.
    pub columns: Vec<String>,
    pub wanted_value: f64,
    pub time_dst: String,
    pub value_dst: String,
}

impl PredictLinearSpec {
    pub fn new(wanted_value: f64) -> PredictLinearSpec {
        PredictLinearSpec {
            columns: vec![
                DEFAULT_VALUE_COL_LABEL.to_string(),
                DEFAULT_TIME_COL_LABEL.to_string(),
            ],
            wanted_value,
            time_dst: DEFAULT_TIME_COL_LABEL.to_string(),
            value_dst: DEFAULT_VALUE_COL_LABEL.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ExecuteError> {
        if self.columns.len() != 2 {
            return Err(ExecuteError::InvalidArg("must provide exactly two columns"));
        }
        if !self.wanted_value.is_finite() {
            return Err(ExecuteError::InvalidArg("wantedValue must be finite"));
        }
        if self.time_dst.is_empty() || self.value_dst.is_empty() {
            return Err(ExecuteError::MissingArg("timeDst"));
        }
        Ok(())
    }
}

/// Running sums for an ordinary least-squares fit; constant memory in the number of rows.
///
/// x is summed as nanoseconds since the first observed time so epoch-scale timestamps keep
/// their precision.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinearRegression {
    origin: Option<Time>,
    n: usize,
    sum_x: f64,
    sum_y: f64,
    sum_xy: f64,
    sum_x2: f64,
}

/// A fitted line, with x measured from `LinearRegression::origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fit {
    Line { slope: f64, intercept: f64 },
    TooFewPoints(usize),
    /// Every x is the same.
    Degenerate,
}

impl LinearRegression {
    pub fn observe(&mut self, x: Time, y: f64) {
        let origin = *self.origin.get_or_insert(x);
        let x = (x - origin).nanos() as f64;
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xy += x * y;
        self.sum_x2 += x * x;
    }

    pub fn count(&self) -> usize {
        self.n
    }

    /// The first observed time.
    pub fn origin(&self) -> Option<Time> {
        self.origin
    }

    pub fn fit(&self) -> Fit {
        if self.n < 2 {
            return Fit::TooFewPoints(self.n);
        }
        let n = self.n as f64;
        let cov_xy = self.sum_xy - self.sum_x * self.sum_y / n;
        let var_x = self.sum_x2 - self.sum_x * self.sum_x / n;
        if var_x == 0.0 || !var_x.is_finite() {
            return Fit::Degenerate;
        }
        let slope = cov_xy / var_x;
        let intercept = self.sum_y / n - slope * self.sum_x / n;
        Fit::Line { slope, intercept }
    }
}

type Observe = fn(&mut LinearRegression, &dyn ColReader, usize, usize) -> Result<(), ExecuteError>;

fn observe_column<T: Numeric>(
    r: &mut LinearRegression,
    cr: &dyn ColReader,
    y: usize,
    x: usize,
) -> Result<(), ExecuteError> {
    let ys = typed_column::<T, _>(cr, y)?;
    let xs = cr.times(x)?;
    for (yv, xv) in ys.iter().zip(xs.iter()) {
        r.observe(*xv, yv.to_f64());
    }
    Ok(())
}

/// Fits a line through (time, value) per partition and emits the time at which the line
/// reaches the wanted value.
pub struct PredictLinearTransformation {
    d: Dataset,
    spec: PredictLinearSpec,
}

impl PredictLinearTransformation {
    pub fn new(
        d: Dataset,
        spec: &PredictLinearSpec,
    ) -> Result<PredictLinearTransformation, ExecuteError> {
        spec.validate()?;
        Ok(PredictLinearTransformation {
            d,
            spec: spec.clone(),
        })
    }

    fn predict(&self, key: &GroupKey, r: &LinearRegression) -> Result<Time, ExecuteError> {
        let column = self.spec.columns[0].clone();
        let (slope, intercept) = match r.fit() {
            Fit::Line { slope, intercept } => (slope, intercept),
            Fit::TooFewPoints(count) => {
                return Err(ExecuteError::InsufficientObservations {
                    key: key.clone(),
                    column,
                    count,
                })
            }
            Fit::Degenerate => {
                return Err(ExecuteError::DegenerateRegression {
                    key: key.clone(),
                    column,
                })
            }
        };
        if slope == 0.0 {
            return Err(ExecuteError::ZeroSlope {
                key: key.clone(),
                column,
            });
        }
        let out_of_range = || ExecuteError::PredictionOutOfRange {
            key: key.clone(),
            column: column.clone(),
        };
        let dx = ((self.spec.wanted_value - intercept) / slope).round();
        if !dx.is_finite() || dx < i64::min_value() as f64 || dx >= i64::max_value() as f64 {
            return Err(out_of_range());
        }
        let origin = r.origin().ok_or_else(out_of_range)?;
        origin
            .nanos()
            .checked_add(dx as i64)
            .map(Time)
            .ok_or_else(out_of_range)
    }
}

impl Transformation for PredictLinearTransformation {
    fn retract_table(&mut self, _id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError> {
        self.d.retract_table(key)
    }

    fn process(&mut self, _id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError> {
        let key = tbl.key().clone();
        let cols = tbl.cols().to_vec();
        let find = |label: &String| {
            col_idx(label, &cols).ok_or_else(|| ExecuteError::ColumnNotFound(label.clone()))
        };
        let y = find(&self.spec.columns[0])?;
        let x = find(&self.spec.columns[1])?;
        if cols[x].data_type != DataType::Time {
            return Err(ExecuteError::InvalidColumnType {
                label: cols[x].label.clone(),
                expected: DataType::Time,
                actual: cols[x].data_type,
            });
        }
        let observe: Observe = match cols[y].data_type {
            DataType::Int => observe_column::<i64>,
            DataType::UInt => observe_column::<u64>,
            DataType::Float => observe_column::<f64>,
            data_type => {
                return Err(ExecuteError::UnsupportedType {
                    op: PREDICT_LINEAR_KIND,
                    data_type,
                })
            }
        };

        let mut regression = LinearRegression::default();
        tbl.do_batches(&mut |cr| observe(&mut regression, cr, y, x))?;
        let t = self.predict(&key, &regression)?;
        debug!(
            "Predicted {} for table {} from {} observations",
            t,
            key,
            regression.count()
        );

        let builder = self.d.new_table_builder(&key, PREDICT_LINEAR_KIND)?;
        builder.add_key_cols(&key)?;
        let tj = builder.add_col(ColMeta::new(&self.spec.time_dst, DataType::Time))?;
        let vj = builder.add_col(ColMeta::new(&self.spec.value_dst, DataType::Float))?;
        builder.append_key_values(&key)?;
        builder.append_time(tj, t)?;
        builder.append_float(vj, self.spec.wanted_value)
    }

    fn update_watermark(&mut self, _id: DatasetId, mark: Time) -> Result<(), ExecuteError> {
        self.d.update_watermark(mark)
    }

    fn update_processing_time(&mut self, _id: DatasetId, t: Time) -> Result<(), ExecuteError> {
        self.d.update_processing_time(t)
    }

    fn finish(&mut self, _id: DatasetId, err: Option<ExecuteError>) -> Result<(), ExecuteError> {
        self.d.finish(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::mock::{pass_through_test_helper, process_test_helper, MockTable};
    use crate::table::Value;
    use crate::time::NANOS_PER_SECOND;

    fn series() -> MockTable {
        MockTable::new(&[
            ("t1", DataType::String),
            ("_time", DataType::Time),
            ("_value", DataType::Float),
        ])
        .key_cols(&["t1"])
    }

    fn predict(
        spec: PredictLinearSpec,
        data: Vec<MockTable>,
    ) -> Result<Vec<Vec<Value>>, ExecuteError> {
        let tables = data
            .into_iter()
            .map(|t| t.build())
            .collect::<Result<Vec<_>, _>>()?;
        let out = process_test_helper(tables, move |d| {
            let t: Box<dyn Transformation> = Box::new(PredictLinearTransformation::new(d, &spec)?);
            Ok(t)
        })?;
        Ok(out.iter().flat_map(|t| t.rows()).collect())
    }

    #[test]
    fn it_predicts_when_the_line_reaches_the_wanted_value() {
        let mut table = series().batch_size(2);
        for i in 0..5 {
            table = table.row(crate::row!["a", Time(i), (i + 1) as f64]);
        }
        let rows = predict(PredictLinearSpec::new(50.0), vec![table]).unwrap();
        assert_eq!(rows, vec![crate::row!["a", Time(49), 50.0]]);
    }

    #[test]
    fn it_accepts_integer_values() {
        let table = MockTable::new(&[("_time", DataType::Time), ("_value", DataType::Int)])
            .row(crate::row![Time(0), 10i64])
            .row(crate::row![Time(10), 0i64]);
        let rows = predict(PredictLinearSpec::new(5.0), vec![table]).unwrap();
        assert_eq!(rows, vec![crate::row![Time(5), 5.0]]);
    }

    #[test]
    fn it_accepts_unsigned_values() {
        let table = MockTable::new(&[("_time", DataType::Time), ("_value", DataType::UInt)])
            .row(crate::row![Time(0), 10u64])
            .row(crate::row![Time(10), 20u64]);
        let rows = predict(PredictLinearSpec::new(15.0), vec![table]).unwrap();
        assert_eq!(rows, vec![crate::row![Time(5), 15.0]]);
    }

    #[test]
    fn it_keeps_precision_for_epoch_timestamps() {
        let start = 1_700_000_000_000_000_000;
        let mut table = MockTable::new(&[("_time", DataType::Time), ("_value", DataType::Float)]);
        for i in 0..10 {
            table = table.row(crate::row![Time(start + i * NANOS_PER_SECOND), i as f64]);
        }
        let rows = predict(PredictLinearSpec::new(50.0), vec![table]).unwrap();
        assert_eq!(rows, vec![crate::row![Time(1_700_000_050_000_000_000), 50.0]]);
    }

    #[test]
    fn it_measures_x_from_the_first_observation() {
        let mut r = LinearRegression::default();
        r.observe(Time(1_000), 1.0);
        r.observe(Time(1_002), 3.0);
        assert_eq!(r.origin(), Some(Time(1_000)));
        assert_eq!(
            r.fit(),
            Fit::Line {
                slope: 1.0,
                intercept: 1.0
            }
        );
    }

    #[test]
    fn it_fails_with_fewer_than_two_observations() {
        let table = series().row(crate::row!["a", Time(0), 1.0]);
        match predict(PredictLinearSpec::new(5.0), vec![table]) {
            Err(ExecuteError::InsufficientObservations { count, .. }) => assert_eq!(count, 1),
            other => panic!("Expected insufficient observations, got {:?}", other),
        }
    }

    #[test]
    fn it_reports_a_flat_line() {
        let table = series()
            .row(crate::row!["a", Time(0), 3.0])
            .row(crate::row!["a", Time(1), 3.0]);
        match predict(PredictLinearSpec::new(5.0), vec![table]) {
            Err(ExecuteError::ZeroSlope { column, .. }) => assert_eq!(column, "_value"),
            other => panic!("Expected zero slope, got {:?}", other),
        }
    }

    #[test]
    fn it_reports_a_single_timestamp() {
        let table = series()
            .row(crate::row!["a", Time(4), 1.0])
            .row(crate::row!["a", Time(4), 3.0]);
        match predict(PredictLinearSpec::new(5.0), vec![table]) {
            Err(ExecuteError::DegenerateRegression { .. }) => {}
            other => panic!("Expected degenerate regression, got {:?}", other),
        }
    }

    #[test]
    fn it_rejects_a_non_time_x_column() {
        let table = series().row(crate::row!["a", Time(4), 1.0]);
        let spec = PredictLinearSpec {
            columns: vec!["_value".to_string(), "t1".to_string()],
            ..PredictLinearSpec::new(1.0)
        };
        assert_eq!(
            predict(spec, vec![table]),
            Err(ExecuteError::InvalidColumnType {
                label: "t1".to_string(),
                expected: DataType::Time,
                actual: DataType::String,
            })
        );
    }

    #[test]
    fn it_validates_configuration() {
        assert!(PredictLinearSpec::new(f64::NAN).validate().is_err());
        let spec = PredictLinearSpec {
            columns: vec!["_value".to_string()],
            ..PredictLinearSpec::new(1.0)
        };
        assert_eq!(
            spec.validate(),
            Err(ExecuteError::InvalidArg("must provide exactly two columns"))
        );
    }

    #[test]
    fn it_passes_signals_downstream() {
        pass_through_test_helper(|d| {
            let t: Box<dyn Transformation> = Box::new(PredictLinearTransformation::new(d, &PredictLinearSpec::new(1.0))?);
            Ok(t)
        })
        .unwrap();
    }
}
