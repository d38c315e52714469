use crate::execute::allocator::Allocator;
use crate::execute::dataset::{AccumulationMode, Dataset};
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::trigger::Trigger;
use crate::functions;
use crate::functions::aggregate::AggregateConfig;
use crate::functions::dedup::{DedupSpec, DEDUP_KIND};
use crate::functions::predict_linear::{PredictLinearSpec, PREDICT_LINEAR_KIND};
use crate::functions::shift::{ShiftSpec, SHIFT_KIND};
use crate::functions::unique::{UniqueSpec, UNIQUE_KIND};
use crate::functions::{count::COUNT_KIND, mean::MEAN_KIND, sum::SUM_KIND};
use crate::time::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for one operator, as handed over by the planner.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureSpec {
    Dedup(DedupSpec),
    Unique(UniqueSpec),
    Sum(AggregateConfig),
    Mean(AggregateConfig),
    Count(AggregateConfig),
    PredictLinear(PredictLinearSpec),
    Shift(ShiftSpec),
}

impl ProcedureSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ProcedureSpec::Dedup(_) => DEDUP_KIND,
            ProcedureSpec::Unique(_) => UNIQUE_KIND,
            ProcedureSpec::Sum(_) => SUM_KIND,
            ProcedureSpec::Mean(_) => MEAN_KIND,
            ProcedureSpec::Count(_) => COUNT_KIND,
            ProcedureSpec::PredictLinear(_) => PREDICT_LINEAR_KIND,
            ProcedureSpec::Shift(_) => SHIFT_KIND,
        }
    }

    pub fn validate(&self) -> Result<(), ExecuteError> {
        match self {
            ProcedureSpec::Dedup(s) => s.validate(),
            ProcedureSpec::Unique(s) => s.validate(),
            ProcedureSpec::Sum(c) | ProcedureSpec::Mean(c) | ProcedureSpec::Count(c) => {
                c.validate()
            }
            ProcedureSpec::PredictLinear(s) => s.validate(),
            ProcedureSpec::Shift(s) => s.validate(),
        }
    }
}

/// Execution-wide resources shared by every operator of a query.
#[derive(Clone)]
pub struct Administration {
    allocator: Allocator,
    clock: Arc<dyn Clock>,
}

impl Administration {
    pub fn new(allocator: Allocator, clock: Arc<dyn Clock>) -> Administration {
        Administration { allocator, clock }
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

impl Default for Administration {
    fn default() -> Administration {
        Administration::new(Allocator::unlimited(), Arc::new(SystemClock::new()))
    }
}

pub type CreateTransformation = fn(
    &ProcedureSpec,
    Dataset,
    &Administration,
) -> Result<Box<dyn Transformation>, ExecuteError>;

/// Maps operator kinds to their constructors.
pub struct Registry {
    creators: HashMap<&'static str, CreateTransformation>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            creators: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Registry {
        let mut registry = Registry::new();
        functions::register_builtins(&mut registry);
        registry
    }

    /// Registers a constructor, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: &'static str, create: CreateTransformation) {
        if self.creators.insert(kind, create).is_some() {
            warn!("Replacing transformation constructor for kind {}", kind);
        }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.creators.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Builds the transformation for `spec` around its output dataset.
    pub fn create(
        &self,
        spec: &ProcedureSpec,
        d: Dataset,
        admin: &Administration,
    ) -> Result<Box<dyn Transformation>, ExecuteError> {
        let create = self
            .creators
            .get(spec.kind())
            .ok_or_else(|| ExecuteError::UnknownKind(spec.kind().to_string()))?;
        spec.validate()?;
        create(spec, d, admin)
    }

    /// Builds a linear chain `specs[0] -> specs[1] -> ... -> sink` and returns its head.
    pub fn build_chain(
        &self,
        specs: &[ProcedureSpec],
        mode: AccumulationMode,
        trigger: Trigger,
        admin: &Administration,
        sink: Box<dyn Transformation>,
    ) -> Result<Box<dyn Transformation>, ExecuteError> {
        let mut next = sink;
        for spec in specs.iter().rev() {
            let mut d = Dataset::new(DatasetId::new(), mode, admin.allocator().clone())
                .with_trigger(trigger);
            debug!("Creating {} transformation with dataset {}", spec.kind(), d.id());
            d.add_transformation(next);
            next = self.create(spec, d, admin)?;
        }
        Ok(next)
    }
}
