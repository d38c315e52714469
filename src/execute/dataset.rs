use crate::execute::allocator::Allocator;
use crate::execute::cache::TableBuilderCache;
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::trigger::{Trigger, TriggerContext};
use crate::table::{ColListTable, GroupKey, TableBuilder};
use crate::time::Time;
use std::collections::HashMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccumulationMode {
    /// A flushed partition's builder is dropped; later rows for the key start a new table.
    Discarding,
    /// A flushed partition's builder is kept. When it is flushed again the previous output
    /// is retracted downstream before the accumulated table is re-sent.
    Accumulating,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DatasetState {
    Created,
    Processing,
    Finished,
}

/// Per-operator output buffer.
///
/// Owns the operator's builder cache, tracks the watermark and processing time, and
/// forwards finished tables, retractions and the terminal signal to every successor.
pub struct Dataset {
    id: DatasetId,
    mode: AccumulationMode,
    trigger: Trigger,
    cache: TableBuilderCache,
    watermark: Time,
    processing_time: Time,
    state: DatasetState,
    // Row count at last emission, for keys flushed in accumulating mode.
    emitted: HashMap<GroupKey, usize>,
    ts: Vec<Box<dyn Transformation>>,
}

impl Dataset {
    pub fn new(id: DatasetId, mode: AccumulationMode, alloc: Allocator) -> Dataset {
        Dataset {
            id,
            mode,
            trigger: Trigger::default(),
            cache: TableBuilderCache::new(alloc),
            watermark: Time::MIN,
            processing_time: Time::MIN,
            state: DatasetState::Created,
            emitted: HashMap::new(),
            ts: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Dataset {
        self.trigger = trigger;
        self
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn mode(&self) -> AccumulationMode {
        self.mode
    }

    pub fn state(&self) -> DatasetState {
        self.state
    }

    pub fn watermark(&self) -> Time {
        self.watermark
    }

    pub fn processing_time(&self) -> Time {
        self.processing_time
    }

    pub fn cache(&self) -> &TableBuilderCache {
        &self.cache
    }

    pub fn add_transformation(&mut self, t: Box<dyn Transformation>) {
        self.ts.push(t);
    }

    /// Looks up or creates the builder for `key`; the flag is true iff it was created.
    pub fn table_builder(
        &mut self,
        key: &GroupKey,
    ) -> Result<(&mut TableBuilder, bool), ExecuteError> {
        self.begin()?;
        Ok(self.cache.table_builder(key))
    }

    /// Creates the builder for `key`, failing if one is already live for this pass.
    pub fn new_table_builder(
        &mut self,
        key: &GroupKey,
        op: &'static str,
    ) -> Result<&mut TableBuilder, ExecuteError> {
        match self.table_builder(key)? {
            (builder, true) => Ok(builder),
            (_, false) => Err(ExecuteError::DuplicateTable {
                op,
                key: key.clone(),
            }),
        }
    }

    pub fn retract_table(&mut self, key: &GroupKey) -> Result<(), ExecuteError> {
        self.begin()?;
        if self.cache.remove(key).is_some() {
            debug!("Dataset {} dropped buffered table {}", self.id, key);
        }
        self.emitted.remove(key);
        for t in self.ts.iter_mut() {
            t.retract_table(self.id, key)?;
        }
        Ok(())
    }

    pub fn update_watermark(&mut self, mark: Time) -> Result<(), ExecuteError> {
        self.begin()?;
        if mark < self.watermark {
            return Err(ExecuteError::WatermarkRegression {
                current: self.watermark,
                mark,
            });
        }
        if mark == self.watermark {
            return Ok(());
        }
        self.watermark = mark;
        self.evaluate_triggers(false)?;
        for t in self.ts.iter_mut() {
            t.update_watermark(self.id, mark)?;
        }
        Ok(())
    }

    pub fn update_processing_time(&mut self, time: Time) -> Result<(), ExecuteError> {
        self.begin()?;
        if time < self.processing_time {
            return Err(ExecuteError::ProcessingTimeRegression {
                current: self.processing_time,
                time,
            });
        }
        if time == self.processing_time {
            return Ok(());
        }
        self.processing_time = time;
        for t in self.ts.iter_mut() {
            t.update_processing_time(self.id, time)?;
        }
        Ok(())
    }

    /// Terminal signal. On success every buffered partition is flushed first; on error all
    /// buffered output is discarded. The outcome is passed to each successor exactly once.
    pub fn finish(&mut self, err: Option<ExecuteError>) -> Result<(), ExecuteError> {
        if self.state == DatasetState::Finished {
            return Err(ExecuteError::DatasetFinished);
        }
        self.state = DatasetState::Processing;
        let err = match err {
            None => self.evaluate_triggers(true).err(),
            Some(err) => Some(err),
        };
        self.state = DatasetState::Finished;
        self.cache.clear();
        self.emitted.clear();

        match err {
            Some(ref e) => warn!("Dataset {} finished with error: {}", self.id, e),
            None => debug!("Dataset {} finished", self.id),
        }
        let mut downstream_err = None;
        for t in self.ts.iter_mut() {
            if let Err(e) = t.finish(self.id, err.clone()) {
                downstream_err.get_or_insert(e);
            }
        }
        match err.or(downstream_err) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn begin(&mut self) -> Result<(), ExecuteError> {
        match self.state {
            DatasetState::Finished => Err(ExecuteError::DatasetFinished),
            DatasetState::Created => {
                self.state = DatasetState::Processing;
                Ok(())
            }
            DatasetState::Processing => Ok(()),
        }
    }

    fn evaluate_triggers(&mut self, finished: bool) -> Result<(), ExecuteError> {
        for key in self.cache.keys() {
            let ready = finished || match self.cache.get(&key) {
                Some(builder) => self.trigger.triggered(&TriggerContext {
                    key: &key,
                    rows: builder.nrows(),
                    watermark: self.watermark,
                }),
                None => false,
            };
            if ready {
                self.trigger_table(&key)?;
            }
        }
        Ok(())
    }

    fn trigger_table(&mut self, key: &GroupKey) -> Result<(), ExecuteError> {
        let table = match self.mode {
            AccumulationMode::Discarding => match self.cache.remove(key) {
                Some(builder) => builder.into_table()?,
                None => return Ok(()),
            },
            AccumulationMode::Accumulating => {
                let table = match self.cache.get(key) {
                    Some(builder) => builder.table()?,
                    None => return Ok(()),
                };
                match self.emitted.get(key) {
                    Some(&rows) if rows == table.len() => return Ok(()),
                    Some(_) => {
                        for t in self.ts.iter_mut() {
                            t.retract_table(self.id, key)?;
                        }
                    }
                    None => {}
                }
                self.emitted.insert(key.clone(), table.len());
                table
            }
        };
        debug!(
            "Dataset {} flushing table {} with {} rows",
            self.id,
            key,
            table.len()
        );
        self.send(table)
    }

    fn send(&mut self, table: ColListTable) -> Result<(), ExecuteError> {
        for t in self.ts.iter_mut() {
            let mut tbl = table.clone();
            t.process(self.id, &mut tbl)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::result::{ResultCollector, Results};
    use crate::table::{ColMeta, DataType, Table, Value};

    fn window_key(tag: &str, stop: i64) -> GroupKey {
        GroupKey::new(
            vec![
                ColMeta::new("t1", DataType::String),
                ColMeta::new("_stop", DataType::Time),
            ],
            vec![Value::String(tag.to_string()), Value::Time(Time(stop))],
        )
        .expect("valid key")
    }

    fn dataset(mode: AccumulationMode) -> (Dataset, Results) {
        let results = Results::new();
        let mut d = Dataset::new(DatasetId::new(), mode, Allocator::unlimited());
        d.add_transformation(Box::new(ResultCollector::new(results.clone())));
        (d, results)
    }

    fn append_row(d: &mut Dataset, key: &GroupKey, v: f64) {
        let (b, created) = d.table_builder(key).unwrap();
        if created {
            b.add_col(ColMeta::new("_value", DataType::Float)).unwrap();
        }
        b.append_float(0, v).unwrap();
    }

    #[test]
    fn it_flushes_partitions_when_watermark_passes_stop() {
        let (mut d, results) = dataset(AccumulationMode::Discarding);
        append_row(&mut d, &window_key("a", 10), 1.0);
        append_row(&mut d, &window_key("b", 20), 2.0);

        d.update_watermark(Time(15)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.tables()[0].key(), &window_key("a", 10));
        assert!(d.cache().contains(&window_key("b", 20)));

        d.finish(None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.finished());
    }

    #[test]
    fn it_drops_buffered_state_on_retraction() {
        let (mut d, results) = dataset(AccumulationMode::Discarding);
        append_row(&mut d, &window_key("a", 10), 1.0);
        d.retract_table(&window_key("a", 10)).unwrap();
        d.finish(None).unwrap();
        assert_eq!(results.len(), 0);
        assert_eq!(results.retractions(), vec![window_key("a", 10)]);
    }

    #[test]
    fn it_rejects_watermark_regression() {
        let (mut d, _) = dataset(AccumulationMode::Discarding);
        d.update_watermark(Time(10)).unwrap();
        d.update_watermark(Time(10)).unwrap();
        assert_eq!(
            d.update_watermark(Time(5)),
            Err(ExecuteError::WatermarkRegression {
                current: Time(10),
                mark: Time(5),
            })
        );
        assert_eq!(d.watermark(), Time(10));
    }

    #[test]
    fn it_rejects_processing_time_regression() {
        let (mut d, _) = dataset(AccumulationMode::Discarding);
        d.update_processing_time(Time(10)).unwrap();
        assert!(d.update_processing_time(Time(9)).is_err());
        assert_eq!(d.processing_time(), Time(10));
    }

    #[test]
    fn it_rejects_calls_after_finish() {
        let (mut d, _) = dataset(AccumulationMode::Discarding);
        assert_eq!(d.state(), DatasetState::Created);
        d.update_watermark(Time(1)).unwrap();
        assert_eq!(d.state(), DatasetState::Processing);
        d.finish(None).unwrap();
        assert_eq!(d.state(), DatasetState::Finished);
        assert_eq!(d.finish(None), Err(ExecuteError::DatasetFinished));
        assert!(d.table_builder(&window_key("a", 1)).is_err());
        assert!(d.retract_table(&window_key("a", 1)).is_err());
        assert!(d.update_watermark(Time(2)).is_err());
    }

    #[test]
    fn it_discards_output_when_finished_with_error() {
        let (mut d, results) = dataset(AccumulationMode::Discarding);
        append_row(&mut d, &window_key("a", 10), 1.0);
        assert_eq!(
            d.finish(Some(ExecuteError::Cancelled)),
            Err(ExecuteError::Cancelled)
        );
        assert_eq!(results.len(), 0);
        assert_eq!(results.err(), Some(ExecuteError::Cancelled));
    }

    #[test]
    fn it_retracts_before_re_emitting_accumulated_tables() {
        let (mut d, results) = dataset(AccumulationMode::Accumulating);
        let d = &mut d;
        let key = window_key("a", 10);
        append_row(d, &key, 1.0);
        d.update_watermark(Time(10)).unwrap();
        assert_eq!(results.len(), 1);

        // Unchanged partitions are not re-sent.
        d.update_watermark(Time(11)).unwrap();
        assert!(results.retractions().is_empty());

        let (_, created) = d.table_builder(&key).unwrap();
        assert!(!created);
        append_row(d, &key, 2.0);
        d.update_watermark(Time(12)).unwrap();
        assert_eq!(results.retractions(), vec![key.clone()]);
        assert_eq!(results.len(), 1);
        assert_eq!(results.tables()[0].len(), 2);
    }

    #[test]
    fn it_flushes_on_row_count_trigger() {
        let results = Results::new();
        let mut d = Dataset::new(
            DatasetId::new(),
            AccumulationMode::Discarding,
            Allocator::unlimited(),
        )
        .with_trigger(Trigger::AfterAtLeastCount(2));
        d.add_transformation(Box::new(ResultCollector::new(results.clone())));
        let key = window_key("a", 10);
        append_row(&mut d, &key, 1.0);
        d.update_watermark(Time(1)).unwrap();
        assert_eq!(results.len(), 0);
        append_row(&mut d, &key, 2.0);
        d.update_watermark(Time(2)).unwrap();
        assert_eq!(results.len(), 1);
    }
}
