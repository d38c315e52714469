use crate::execute::dataset::{AccumulationMode, Dataset};
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::{DEFAULT_START_COL_LABEL, DEFAULT_STOP_COL_LABEL, DEFAULT_TIME_COL_LABEL};
use crate::table::{col_idx, ColMeta, DataType, GroupKey, Table, TableBuilder, Value};
use crate::time::{Duration, Time};

pub const SHIFT_KIND: &str = "shift";

#[derive(Debug, Clone, PartialEq)]
pub struct ShiftSpec {
    pub columns: Vec<String>,
    pub shift: Duration,
}

impl Default for ShiftSpec {
    fn default() -> ShiftSpec {
        ShiftSpec {
            columns: vec![
                DEFAULT_START_COL_LABEL.to_string(),
                DEFAULT_STOP_COL_LABEL.to_string(),
                DEFAULT_TIME_COL_LABEL.to_string(),
            ],
            shift: Duration(0),
        }
    }
}

impl ShiftSpec {
    pub fn validate(&self) -> Result<(), ExecuteError> {
        if self.columns.is_empty() {
            return Err(ExecuteError::MissingArg("columns"));
        }
        Ok(())
    }
}

/// Adds a fixed offset to every value of the configured time columns.
///
/// Configured columns absent from a table are skipped. A shifted column that is part of
/// the group key moves the partition to the shifted key.
pub struct ShiftTransformation {
    d: Dataset,
    columns: Vec<String>,
    shift: Duration,
}

impl ShiftTransformation {
    pub fn new(d: Dataset, spec: &ShiftSpec) -> Result<ShiftTransformation, ExecuteError> {
        spec.validate()?;
        Ok(ShiftTransformation {
            d,
            columns: spec.columns.clone(),
            shift: spec.shift,
        })
    }

    /// Per-column flags marking which table columns get shifted.
    fn shifted_columns(&self, cols: &[ColMeta]) -> Result<Vec<bool>, ExecuteError> {
        let mut shifted = vec![false; cols.len()];
        for label in self.columns.iter() {
            let j = match col_idx(label, cols) {
                Some(j) => j,
                None => {
                    debug!("Shift column {} not present in table, skipping", label);
                    continue;
                }
            };
            if cols[j].data_type != DataType::Time {
                return Err(ExecuteError::InvalidColumnType {
                    label: label.clone(),
                    expected: DataType::Time,
                    actual: cols[j].data_type,
                });
            }
            shifted[j] = true;
        }
        Ok(shifted)
    }

    fn shift_key(&self, key: &GroupKey, cols: &[ColMeta], shifted: &[bool]) -> GroupKey {
        let mut out = key.clone();
        for (j, c) in key.cols().iter().enumerate() {
            let is_shifted = col_idx(&c.label, cols).map(|tj| shifted[tj]).unwrap_or(false);
            if !is_shifted {
                continue;
            }
            if let Some(t) = key.value_time(j) {
                if let Some(k) = out.with_value(j, Value::Time(t + self.shift)) {
                    out = k;
                }
            }
        }
        out
    }
}

impl Transformation for ShiftTransformation {
    fn retract_table(&mut self, _id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError> {
        let cols = key.cols().to_vec();
        let shifted = self.shifted_columns(&cols)?;
        let key = self.shift_key(key, &cols, &shifted);
        self.d.retract_table(&key)
    }

    fn process(&mut self, _id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError> {
        let cols = tbl.cols().to_vec();
        let shifted = self.shifted_columns(&cols)?;
        let key = self.shift_key(tbl.key(), &cols, &shifted);
        let shift = self.shift;

        let builder: &mut TableBuilder = match self.d.mode() {
            AccumulationMode::Accumulating => {
                let (builder, created) = self.d.table_builder(&key)?;
                if created {
                    builder.add_table_cols(&cols)?;
                }
                builder
            }
            AccumulationMode::Discarding => {
                let builder = self.d.new_table_builder(&key, SHIFT_KIND)?;
                builder.add_table_cols(&cols)?;
                builder
            }
        };

        tbl.do_batches(&mut |cr| {
            for (j, &is_shifted) in shifted.iter().enumerate() {
                if is_shifted {
                    let times: Vec<Time> = cr.times(j)?.iter().map(|&t| t + shift).collect();
                    builder.append_slice(j, &times)?;
                } else {
                    let col = cr.column(j).ok_or(ExecuteError::ColumnIndexOutOfRange(j))?;
                    builder.append_column(j, col)?;
                }
            }
            Ok(())
        })
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
