use crate::execute::allocator::AllocError;
use crate::table::{DataType, GroupKey};
use crate::time::Time;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteError {
    // Configuration
    ColumnNotFound(String),
    ColumnIndexOutOfRange(usize),
    ColumnIsGroupKey(String),
    DuplicateColumn(String),
    InvalidColumnType {
        label: String,
        expected: DataType,
        actual: DataType,
    },
    MissingArg(&'static str),
    InvalidArg(&'static str),
    UnknownKind(String),

    UnsupportedType {
        op: &'static str,
        data_type: DataType,
    },

    DuplicateTable {
        op: &'static str,
        key: GroupKey,
    },

    // Numeric degeneracy
    InsufficientObservations {
        key: GroupKey,
        column: String,
        count: usize,
    },
    ZeroSlope {
        key: GroupKey,
        column: String,
    },
    DegenerateRegression {
        key: GroupKey,
        column: String,
    },
    PredictionOutOfRange {
        key: GroupKey,
        column: String,
    },

    Alloc(AllocError),

    // Dataset protocol
    WatermarkRegression {
        current: Time,
        mark: Time,
    },
    ProcessingTimeRegression {
        current: Time,
        time: Time,
    },
    DatasetFinished,
    Cancelled,

    Source(String),
}

impl From<AllocError> for ExecuteError {
    fn from(err: AllocError) -> ExecuteError {
        ExecuteError::Alloc(err)
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecuteError::ColumnNotFound(label) => write!(f, "column {:?} does not exist", label),
            ExecuteError::ColumnIndexOutOfRange(j) => {
                write!(f, "column index {} is out of range", j)
            }
            ExecuteError::ColumnIsGroupKey(label) => write!(
                f,
                "cannot aggregate column {:?}: it is part of the group key",
                label
            ),
            ExecuteError::DuplicateColumn(label) => {
                write!(f, "column {:?} already exists", label)
            }
            ExecuteError::InvalidColumnType {
                label,
                expected,
                actual,
            } => write!(
                f,
                "column {:?} has type {}, expected {}",
                label, actual, expected
            ),
            ExecuteError::MissingArg(name) => write!(f, "missing required argument {:?}", name),
            ExecuteError::InvalidArg(msg) => write!(f, "invalid argument: {}", msg),
            ExecuteError::UnknownKind(kind) => write!(f, "unknown transformation kind {:?}", kind),
            ExecuteError::UnsupportedType { op, data_type } => {
                write!(f, "{} does not support column type {}", op, data_type)
            }
            ExecuteError::DuplicateTable { op, key } => {
                write!(f, "{} found duplicate table with key: {}", op, key)
            }
            ExecuteError::InsufficientObservations { key, column, count } => write!(
                f,
                "column {:?} in table {} has {} observations, at least 2 are required",
                column, key, count
            ),
            ExecuteError::ZeroSlope { key, column } => write!(
                f,
                "column {:?} in table {} has zero slope, the wanted value is unreachable",
                column, key
            ),
            ExecuteError::DegenerateRegression { key, column } => write!(
                f,
                "column {:?} in table {} has no variance in time, cannot fit a line",
                column, key
            ),
            ExecuteError::PredictionOutOfRange { key, column } => write!(
                f,
                "predicted time for column {:?} in table {} is not representable",
                column, key
            ),
            ExecuteError::Alloc(err) => write!(f, "{}", err),
            ExecuteError::WatermarkRegression { current, mark } => write!(
                f,
                "watermark cannot move backward from {} to {}",
                current, mark
            ),
            ExecuteError::ProcessingTimeRegression { current, time } => write!(
                f,
                "processing time cannot move backward from {} to {}",
                current, time
            ),
            ExecuteError::DatasetFinished => f.write_str("dataset is already finished"),
            ExecuteError::Cancelled => f.write_str("query was cancelled"),
            ExecuteError::Source(msg) => write!(f, "source error: {}", msg),
        }
    }
}

impl Error for ExecuteError {}
