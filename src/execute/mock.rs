use crate::execute::allocator::Allocator;
use crate::execute::dataset::{AccumulationMode, Dataset};
use crate::execute::error::ExecuteError;
use crate::execute::pipeline::{Message, Source};
use crate::execute::result::{ResultCollector, Results};
use crate::execute::transformation::{DatasetId, Transformation};
use crate::table::{col_idx, ColListTable, ColMeta, DataType, GroupKey, Table, TableBuilder, Value};
use crate::time::Time;
use std::collections::VecDeque;

/// Builds a row of `Value`s from literals: `row![Time(1), "a", 1.5]`.
#[macro_export]
macro_rules! row {
    ($($v:expr),* $(,)*) => {
        vec![$($crate::table::Value::from($v)),*]
    };
}

/// Literal table description used by tests and benchmarks.
pub struct MockTable {
    cols: Vec<ColMeta>,
    key_cols: Vec<String>,
    key_values: Option<Vec<Value>>,
    rows: Vec<Vec<Value>>,
    batch_size: usize,
}

impl MockTable {
    pub fn new(cols: &[(&str, DataType)]) -> MockTable {
        MockTable {
            cols: cols.iter().map(|&(l, dt)| ColMeta::new(l, dt)).collect(),
            key_cols: Vec::new(),
            key_values: None,
            rows: Vec::new(),
            batch_size: 0,
        }
    }

    pub fn key_cols(mut self, labels: &[&str]) -> MockTable {
        self.key_cols = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Key values for a table without rows; otherwise they are read from the first row.
    pub fn key_values(mut self, values: Vec<Value>) -> MockTable {
        self.key_values = Some(values);
        self
    }

    pub fn row(mut self, row: Vec<Value>) -> MockTable {
        self.rows.push(row);
        self
    }

    /// Splits rows into batches of at most `n` rows. Zero means one batch.
    pub fn batch_size(mut self, n: usize) -> MockTable {
        self.batch_size = n;
        self
    }

    pub fn build(mut self) -> Result<ColListTable, ExecuteError> {
        let mut key_idx = Vec::with_capacity(self.key_cols.len());
        for label in self.key_cols.iter() {
            let j = col_idx(label, &self.cols)
                .ok_or_else(|| ExecuteError::ColumnNotFound(label.clone()))?;
            key_idx.push(j);
        }
        let key_values = match (self.key_values.take(), self.rows.first()) {
            (Some(values), _) => values,
            (None, Some(first)) => key_idx
                .iter()
                .map(|&j| first.get(j).cloned().ok_or(ExecuteError::ColumnIndexOutOfRange(j)))
                .collect::<Result<Vec<_>, _>>()?,
            (None, None) if key_idx.is_empty() => Vec::new(),
            (None, None) => return Err(ExecuteError::MissingArg("key values")),
        };
        let key_meta = key_idx.iter().map(|&j| self.cols[j].clone()).collect();
        let key = GroupKey::new(key_meta, key_values)
            .ok_or(ExecuteError::InvalidArg("key values do not match key columns"))?;

        let batch_size = if self.batch_size == 0 {
            self.rows.len().max(1)
        } else {
            self.batch_size
        };
        let mut batches = Vec::new();
        let mut chunks: Vec<&[Vec<Value>]> = self.rows.chunks(batch_size).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        for chunk in chunks {
            let mut builder = TableBuilder::new(key.clone(), Allocator::unlimited());
            builder.add_table_cols(&self.cols)?;
            for row in chunk {
                if row.len() != self.cols.len() {
                    return Err(ExecuteError::InvalidArg("row length does not match columns"));
                }
                for (j, v) in row.iter().enumerate() {
                    builder.append_value(j, v)?;
                }
            }
            batches.extend(builder.into_table()?.batches().iter().cloned());
        }
        Ok(ColListTable::new(key, self.cols, batches))
    }
}

/// Source that replays a scripted sequence of messages, optionally ending in an error.
pub struct MockSource {
    messages: VecDeque<Result<Message, ExecuteError>>,
}

impl MockSource {
    pub fn new() -> MockSource {
        MockSource {
            messages: VecDeque::new(),
        }
    }

    pub fn push(mut self, msg: Message) -> MockSource {
        self.messages.push_back(Ok(msg));
        self
    }

    pub fn table(self, tbl: ColListTable) -> MockSource {
        self.push(Message::Process(Box::new(tbl)))
    }

    pub fn fail(mut self, err: ExecuteError) -> MockSource {
        self.messages.push_back(Err(err));
        self
    }
}

impl Source for MockSource {
    fn next_message(&mut self) -> Result<Option<Message>, ExecuteError> {
        match self.messages.pop_front() {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

/// Runs one transformation over `data` and returns its output sorted by group key.
///
/// `create` receives a discarding dataset already wired to a result collector.
pub fn process_test_helper<F>(
    data: Vec<ColListTable>,
    create: F,
) -> Result<Vec<ColListTable>, ExecuteError>
where
    F: FnOnce(Dataset) -> Result<Box<dyn Transformation>, ExecuteError>,
{
    let results = Results::new();
    let mut d = Dataset::new(
        DatasetId::new(),
        AccumulationMode::Discarding,
        Allocator::unlimited(),
    );
    d.add_transformation(Box::new(ResultCollector::new(results.clone())));
    let mut t = create(d)?;

    let parent = DatasetId::new();
    let outcome = data
        .into_iter()
        .try_for_each(|mut tbl| t.process(parent, &mut tbl));
    match outcome {
        Ok(()) => t.finish(parent, None)?,
        Err(err) => {
            let _ = t.finish(parent, Some(err.clone()));
            return Err(err);
        }
    }

    let mut tables = results.take()?;
    tables.sort_by_key(|t| t.key().to_string());
    Ok(tables)
}

/// Sends a retraction, a watermark, a processing time and a successful finish through a
/// fresh transformation and checks that each one reaches the downstream sink unchanged.
///
/// Panics if a signal is lost or altered.
pub fn pass_through_test_helper<F>(create: F) -> Result<(), ExecuteError>
where
    F: FnOnce(Dataset) -> Result<Box<dyn Transformation>, ExecuteError>,
{
    let results = Results::new();
    let mut d = Dataset::new(
        DatasetId::new(),
        AccumulationMode::Discarding,
        Allocator::unlimited(),
    );
    d.add_transformation(Box::new(ResultCollector::new(results.clone())));
    let mut t = create(d)?;

    let parent = DatasetId::new();
    let key = GroupKey::new(
        vec![ColMeta::new("t1", DataType::String)],
        vec![Value::from("a")],
    )
    .ok_or(ExecuteError::InvalidArg("key values do not match key columns"))?;
    t.retract_table(parent, &key)?;
    t.update_watermark(parent, Time(10))?;
    t.update_processing_time(parent, Time(20))?;
    t.finish(parent, None)?;

    assert_eq!(results.retractions(), vec![key]);
    assert_eq!(results.watermark(), Some(Time(10)));
    assert_eq!(results.processing_time(), Some(Time(20)));
    assert!(results.finished());
    assert_eq!(results.err(), None);
    assert!(results.is_empty());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_splits_rows_into_batches() {
        let tbl = MockTable::new(&[("t1", DataType::String), ("_value", DataType::Int)])
            .key_cols(&["t1"])
            .batch_size(2)
            .row(row!["a", 1i64])
            .row(row!["a", 2i64])
            .row(row!["a", 3i64])
            .build()
            .unwrap();
        assert_eq!(tbl.batches().len(), 2);
        assert_eq!(tbl.len(), 3);
        assert_eq!(tbl.key().label_value("t1"), Some(&Value::from("a")));
    }

    #[test]
    fn it_requires_key_values_for_empty_tables() {
        let desc = || MockTable::new(&[("t1", DataType::String)]).key_cols(&["t1"]);
        assert_eq!(
            desc().build(),
            Err(ExecuteError::MissingArg("key values"))
        );
        let tbl = desc().key_values(row!["a"]).build().unwrap();
        assert!(tbl.is_empty());
    }

    #[test]
    fn it_replays_scripted_messages() {
        let mut src = MockSource::new()
            .push(Message::Watermark(Time(1)))
            .fail(ExecuteError::Source("boom".to_string()));
        match src.next_message() {
            Ok(Some(Message::Watermark(t))) => assert_eq!(t, Time(1)),
            _ => panic!("Expected watermark"),
        }
        assert!(src.next_message().is_err());
        assert!(src.next_message().unwrap().is_none());
    }
}
