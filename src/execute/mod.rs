pub mod allocator;
pub mod cache;
pub mod dataset;
pub mod error;
pub mod mock;
pub mod pipeline;
pub mod registry;
pub mod result;
pub mod transformation;
pub mod trigger;


pub use self::allocator::{AllocError, Allocator};
pub use self::dataset::{AccumulationMode, Dataset, DatasetState};
pub use self::error::ExecuteError;
pub use self::pipeline::{run_parallel, CancelToken, Message, Pipeline, Source};
pub use self::registry::{Administration, ProcedureSpec, Registry};
pub use self::result::{ResultCollector, Results};
pub use self::transformation::{DatasetId, Transformation};
pub use self::trigger::Trigger;

pub const DEFAULT_START_COL_LABEL: &str = "_start";
pub const DEFAULT_STOP_COL_LABEL: &str = "_stop";
pub const DEFAULT_TIME_COL_LABEL: &str = "_time";
pub const DEFAULT_VALUE_COL_LABEL: &str = "_value";
