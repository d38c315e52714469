use crate::execute::dataset::Dataset;
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::DEFAULT_VALUE_COL_LABEL;
use crate::functions::distinct::{any_unseen_value, first_seen, RowFilter};
use crate::table::{col_idx, ColMeta, GroupKey, Table};
use crate::time::Time;

pub const UNIQUE_KIND: &str = "unique";

#[derive(Debug, Clone, PartialEq)]
pub struct UniqueSpec {
    pub column: String,
    /// Keep a row when any of its values is new for its data type.
    pub all: bool,
}

impl Default for UniqueSpec {
    fn default() -> UniqueSpec {
        UniqueSpec {
            column: DEFAULT_VALUE_COL_LABEL.to_string(),
            all: false,
        }
    }
}

impl UniqueSpec {
    pub fn validate(&self) -> Result<(), ExecuteError> {
        if !self.all && self.column.is_empty() {
            return Err(ExecuteError::MissingArg("column"));
        }
        Ok(())
    }
}

/// Emits the first row for each distinct value per partition, in arrival order.
///
/// With `all` set, every column is checked and values are pooled per data type across
/// columns. A row is dropped only when all of its values were seen earlier in the partition.
pub struct UniqueTransformation {
    d: Dataset,
    spec: UniqueSpec,
}

impl UniqueTransformation {
    pub fn new(d: Dataset, spec: &UniqueSpec) -> Result<UniqueTransformation, ExecuteError> {
        spec.validate()?;
        Ok(UniqueTransformation {
            d,
            spec: spec.clone(),
        })
    }

    fn row_filter(&self, cols: &[ColMeta]) -> Result<Box<dyn RowFilter>, ExecuteError> {
        if self.spec.all {
            return Ok(any_unseen_value(cols.len()));
        }
        let j = col_idx(&self.spec.column, cols)
            .ok_or_else(|| ExecuteError::ColumnNotFound(self.spec.column.clone()))?;
        Ok(first_seen(cols[j].data_type, j))
    }
}

impl Transformation for UniqueTransformation {
    fn retract_table(&mut self, _id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError> {
        self.d.retract_table(key)
    }

    fn process(&mut self, _id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError> {
        let key = tbl.key().clone();
        let cols = tbl.cols().to_vec();
        let mut filter = self.row_filter(&cols)?;

        let builder = self.d.new_table_builder(&key, UNIQUE_KIND)?;
        builder.add_table_cols(&cols)?;
        tbl.do_batches(&mut |cr| {
            for i in 0..cr.len() {
                if filter.keep(cr, i)? {
                    builder.append_record(i, cr)?;
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
