pub mod aggregate;
pub mod count;
pub mod dedup;
pub mod distinct;
pub mod mean;
pub mod predict_linear;
pub mod shift;
pub mod sum;
pub mod unique;

use crate::execute::dataset::Dataset;
use crate::execute::error::ExecuteError;
use crate::execute::registry::{Administration, ProcedureSpec, Registry};
use crate::execute::transformation::Transformation;
use self::aggregate::{Aggregate, AggregateConfig, AggregateTransformation};
use self::count::{Count, COUNT_KIND};
use self::dedup::{DedupTransformation, DEDUP_KIND};
use self::mean::{Mean, MEAN_KIND};
use self::predict_linear::{PredictLinearTransformation, PREDICT_LINEAR_KIND};
use self::shift::{ShiftTransformation, SHIFT_KIND};
use self::sum::{Sum, SUM_KIND};
use self::unique::{UniqueTransformation, UNIQUE_KIND};

pub fn register_builtins(registry: &mut Registry) {
    registry.register(DEDUP_KIND, create_dedup);
    registry.register(UNIQUE_KIND, create_unique);
    registry.register(SUM_KIND, create_aggregate);
    registry.register(MEAN_KIND, create_aggregate);
    registry.register(COUNT_KIND, create_aggregate);
    registry.register(PREDICT_LINEAR_KIND, create_predict_linear);
    registry.register(SHIFT_KIND, create_shift);
}

fn mismatched(spec: &ProcedureSpec) -> ExecuteError {
    ExecuteError::UnknownKind(spec.kind().to_string())
}

fn create_dedup(
    spec: &ProcedureSpec,
    d: Dataset,
    _admin: &Administration,
) -> Result<Box<dyn Transformation>, ExecuteError> {
    match spec {
        ProcedureSpec::Dedup(s) => Ok(Box::new(DedupTransformation::new(d, s)?)),
        _ => Err(mismatched(spec)),
    }
}

fn create_unique(
    spec: &ProcedureSpec,
    d: Dataset,
    _admin: &Administration,
) -> Result<Box<dyn Transformation>, ExecuteError> {
    match spec {
        ProcedureSpec::Unique(s) => Ok(Box::new(UniqueTransformation::new(d, s)?)),
        _ => Err(mismatched(spec)),
    }
}

fn create_aggregate(
    spec: &ProcedureSpec,
    d: Dataset,
    _admin: &Administration,
) -> Result<Box<dyn Transformation>, ExecuteError> {
    let (agg, config): (Box<dyn Aggregate>, &AggregateConfig) = match spec {
        ProcedureSpec::Sum(c) => (Box::new(Sum), c),
        ProcedureSpec::Mean(c) => (Box::new(Mean), c),
        ProcedureSpec::Count(c) => (Box::new(Count), c),
        _ => return Err(mismatched(spec)),
    };
    Ok(Box::new(AggregateTransformation::new(d, agg, config.clone())?))
}

fn create_predict_linear(
    spec: &ProcedureSpec,
    d: Dataset,
    _admin: &Administration,
) -> Result<Box<dyn Transformation>, ExecuteError> {
    match spec {
        ProcedureSpec::PredictLinear(s) => Ok(Box::new(PredictLinearTransformation::new(d, s)?)),
        _ => Err(mismatched(spec)),
    }
}

fn create_shift(
    spec: &ProcedureSpec,
    d: Dataset,
    _admin: &Administration,
) -> Result<Box<dyn Transformation>, ExecuteError> {
    match spec {
        ProcedureSpec::Shift(s) => Ok(Box::new(ShiftTransformation::new(d, s)?)),
        _ => Err(mismatched(spec)),
    }
}
