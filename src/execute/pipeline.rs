use crate::execute::error::ExecuteError;
use crate::execute::registry::Administration;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::table::{ColMeta, ColReader, GroupKey, Table};
use crate::time::clock::Clock;
use crate::time::Time;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// One unit of input pushed into the head of a chain.
pub enum Message {
    Process(Box<dyn Table>),
    Retract(GroupKey),
    Watermark(Time),
    ProcessingTime(Time),
}

/// Producer of messages for a pipeline. `Ok(None)` signals the end of input.
pub trait Source: Send {
    fn next_message(&mut self) -> Result<Option<Message>, ExecuteError>;
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), ExecuteError> {
        if self.is_cancelled() {
            Err(ExecuteError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Checks for cancellation before handing each batch to the consumer.
struct CancellableTable<'a> {
    inner: &'a mut dyn Table,
    cancel: &'a CancelToken,
}

impl<'a> Table for CancellableTable<'a> {
    fn key(&self) -> &GroupKey {
        self.inner.key()
    }

    fn cols(&self) -> &[ColMeta] {
        self.inner.cols()
    }

    fn do_batches(
        &mut self,
        f: &mut dyn FnMut(&dyn ColReader) -> Result<(), ExecuteError>,
    ) -> Result<(), ExecuteError> {
        let cancel = self.cancel;
        self.inner.do_batches(&mut |cr| {
            cancel.check()?;
            f(cr)
        })
    }
}

/// Drives one source into the head of a transformation chain.
pub struct Pipeline {
    id: DatasetId,
    source: Box<dyn Source>,
    head: Box<dyn Transformation>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn Source>,
        head: Box<dyn Transformation>,
        admin: &Administration,
    ) -> Pipeline {
        Pipeline {
            id: DatasetId::new(),
            source,
            head,
            clock: admin.clock(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Pipeline {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs to completion. The chain is finished exactly once: cleanly when the source is
    /// exhausted, with the error otherwise.
    pub fn run(mut self) -> Result<(), ExecuteError> {
        info!("Starting pipeline {}", self.id);
        match self.drive() {
            Ok(()) => {
                self.head.finish(self.id, None)?;
                info!("Pipeline {} finished", self.id);
                Ok(())
            }
            Err(err) => {
                error!("Pipeline {} failed: {}", self.id, err);
                if let Err(finish_err) = self.head.finish(self.id, Some(err.clone())) {
                    if finish_err != err {
                        debug!("Pipeline {} error during finish: {}", self.id, finish_err);
                    }
                }
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<(), ExecuteError> {
        let id = self.id;
        self.head.update_processing_time(id, self.clock.now())?;
        loop {
            self.cancel.check()?;
            let msg = match self.source.next_message()? {
                Some(msg) => msg,
                None => break,
            };
            match msg {
                Message::Process(mut tbl) => {
                    let mut tbl = CancellableTable {
                        inner: &mut *tbl,
                        cancel: &self.cancel,
                    };
                    self.head.process(id, &mut tbl)?;
                }
                Message::Retract(key) => self.head.retract_table(id, &key)?,
                Message::Watermark(mark) => self.head.update_watermark(id, mark)?,
                Message::ProcessingTime(t) => self.head.update_processing_time(id, t)?,
            }
        }
        self.cancel.check()
    }
}

/// Runs independent pipelines on their own threads.
///
/// The first failure cancels the remaining pipelines through `cancel`, and is returned in
/// preference to the cancellations it caused.
pub fn run_parallel(pipelines: Vec<Pipeline>, cancel: &CancelToken) -> Result<(), ExecuteError> {
    let handles: Vec<_> = pipelines
        .into_iter()
        .map(|p| {
            let p = p.with_cancel(cancel.clone());
            let cancel = cancel.clone();
            thread::spawn(move || {
                let res = p.run();
                if res.is_err() {
                    cancel.cancel();
                }
                res
            })
        })
        .collect();

    let mut first_err: Option<ExecuteError> = None;
    for handle in handles {
        let res = match handle.join() {
            Ok(res) => res,
            Err(_) => Err(ExecuteError::Source("pipeline thread panicked".to_string())),
        };
        if let Err(err) = res {
            match first_err {
                None => first_err = Some(err),
                Some(ExecuteError::Cancelled) if err != ExecuteError::Cancelled => {
                    first_err = Some(err)
                }
                Some(_) => {}
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
