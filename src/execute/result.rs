use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::table::{ColListTable, GroupKey, Table};
use crate::time::Time;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct ResultState {
    tables: Vec<ColListTable>,
    retractions: Vec<GroupKey>,
    watermark: Option<Time>,
    processing_time: Option<Time>,
    err: Option<ExecuteError>,
    finished: bool,
}

/// Shared view of what reached the end of a pipeline.
#[derive(Clone, Default)]
pub struct Results {
    state: Arc<Mutex<ResultState>>,
}

impl Results {
    pub fn new() -> Results {
        Results::default()
    }

    pub fn tables(&self) -> Vec<ColListTable> {
        self.lock().tables.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn retractions(&self) -> Vec<GroupKey> {
        self.lock().retractions.clone()
    }

    /// The last watermark that reached the sink.
    pub fn watermark(&self) -> Option<Time> {
        self.lock().watermark
    }

    pub fn processing_time(&self) -> Option<Time> {
        self.lock().processing_time
    }

    pub fn err(&self) -> Option<ExecuteError> {
        self.lock().err.clone()
    }

    pub fn finished(&self) -> bool {
        self.lock().finished
    }

    /// The final tables of a successful run, or the error that aborted it.
    pub fn take(&self) -> Result<Vec<ColListTable>, ExecuteError> {
        let mut state = self.lock();
        match state.err.clone() {
            Some(err) => Err(err),
            None => Ok(state.tables.drain(..).collect()),
        }
    }

    fn lock(&self) -> MutexGuard<ResultState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Terminal transformation that buffers every table it receives.
///
/// A retraction removes the key's tables; an error at finish discards all output.
pub struct ResultCollector {
    results: Results,
}

impl ResultCollector {
    pub fn new(results: Results) -> ResultCollector {
        ResultCollector { results }
    }
}

impl Transformation for ResultCollector {
    fn retract_table(&mut self, _id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError> {
        let mut state = self.results.lock();
        state.tables.retain(|t| t.key() != key);
        state.retractions.push(key.clone());
        Ok(())
    }

    fn process(&mut self, _id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError> {
        let table = ColListTable::copy_from(tbl)?;
        let mut state = self.results.lock();
        if state.finished {
            return Err(ExecuteError::DatasetFinished);
        }
        state.tables.push(table);
        Ok(())
    }

    fn update_watermark(&mut self, _id: DatasetId, mark: Time) -> Result<(), ExecuteError> {
        self.results.lock().watermark = Some(mark);
        Ok(())
    }

    fn update_processing_time(&mut self, _id: DatasetId, t: Time) -> Result<(), ExecuteError> {
        self.results.lock().processing_time = Some(t);
        Ok(())
    }

    fn finish(&mut self, _id: DatasetId, err: Option<ExecuteError>) -> Result<(), ExecuteError> {
        let mut state = self.results.lock();
        if state.finished {
            return Err(ExecuteError::DatasetFinished);
        }
        state.finished = true;
        if err.is_some() {
            state.tables.clear();
            state.err = err;
        }
        Ok(())
    }
}
