use crate::execute::error::ExecuteError;
use crate::table::{GroupKey, Table};
use crate::time::Time;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DatasetId(Uuid);

impl DatasetId {
    pub fn new() -> DatasetId {
        DatasetId(Uuid::new_v4())
    }

    pub fn nil() -> DatasetId {
        DatasetId(Uuid::nil())
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One operator in the push graph.
///
/// Calls arrive in order from the upstream dataset identified by `id`: any number of
/// `process`, `retract_table`, `update_watermark` and `update_processing_time` calls
/// followed by exactly one `finish`. An error from any call aborts the whole query.
pub trait Transformation: Send {
    fn retract_table(&mut self, id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError>;
    fn process(&mut self, id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError>;
    fn update_watermark(&mut self, id: DatasetId, mark: Time) -> Result<(), ExecuteError>;
    fn update_processing_time(&mut self, id: DatasetId, t: Time) -> Result<(), ExecuteError>;
    fn finish(&mut self, id: DatasetId, err: Option<ExecuteError>) -> Result<(), ExecuteError>;
}
