use crate::execute::dataset::Dataset;
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::DEFAULT_TIME_COL_LABEL;
use crate::functions::distinct::{first_seen, value_change, RowFilter};
use crate::table::{col_idx, ColMeta, GroupKey, Table};
use crate::time::Time;

pub const DEDUP_KIND: &str = "dedup";

#[derive(Debug, Clone, PartialEq)]
pub enum DedupPolicy {
    /// Drop a row when every column equals the previously kept row.
    ValueChange,
    /// Keep only the first row for each distinct value of `column`.
    UniqueColumn { column: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupSpec {
    pub policy: DedupPolicy,
}

impl Default for DedupSpec {
    fn default() -> DedupSpec {
        DedupSpec {
            policy: DedupPolicy::ValueChange,
        }
    }
}

impl DedupSpec {
    pub fn unique_time() -> DedupSpec {
        DedupSpec {
            policy: DedupPolicy::UniqueColumn {
                column: DEFAULT_TIME_COL_LABEL.to_string(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ExecuteError> {
        match self.policy {
            DedupPolicy::UniqueColumn { ref column } if column.is_empty() => {
                Err(ExecuteError::MissingArg("column"))
            }
            _ => Ok(()),
        }
    }
}

pub struct DedupTransformation {
    d: Dataset,
    policy: DedupPolicy,
}

impl DedupTransformation {
    pub fn new(d: Dataset, spec: &DedupSpec) -> Result<DedupTransformation, ExecuteError> {
        spec.validate()?;
        Ok(DedupTransformation {
            d,
            policy: spec.policy.clone(),
        })
    }

    fn row_filter(&self, cols: &[ColMeta]) -> Result<Box<dyn RowFilter>, ExecuteError> {
        match self.policy {
            DedupPolicy::ValueChange => Ok(value_change(cols)),
            DedupPolicy::UniqueColumn { ref column } => {
                let j = col_idx(column, cols)
                    .ok_or_else(|| ExecuteError::ColumnNotFound(column.clone()))?;
                Ok(first_seen(cols[j].data_type, j))
            }
        }
    }
}

impl Transformation for DedupTransformation {
    fn retract_table(&mut self, _id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError> {
        self.d.retract_table(key)
    }

    fn process(&mut self, _id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError> {
        let key = tbl.key().clone();
        let cols = tbl.cols().to_vec();
        let mut filter = self.row_filter(&cols)?;

        let builder = self.d.new_table_builder(&key, DEDUP_KIND)?;
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
