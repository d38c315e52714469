use crate::functions::aggregate::{Aggregate, DoAgg, Numeric};
use crate::table::{DataType, Value};

pub const SUM_KIND: &str = "sum";

/// Sums int, uint and float columns. The result keeps the input type; integer sums wrap.
pub struct Sum;

impl Aggregate for Sum {
    fn name(&self) -> &'static str {
        SUM_KIND
    }

    fn new_int_agg(&self) -> Option<Box<dyn DoAgg<i64>>> {
        Some(Box::new(SumAgg::<i64>::default()))
    }

    fn new_uint_agg(&self) -> Option<Box<dyn DoAgg<u64>>> {
        Some(Box::new(SumAgg::<u64>::default()))
    }

    fn new_float_agg(&self) -> Option<Box<dyn DoAgg<f64>>> {
        Some(Box::new(SumAgg::<f64>::default()))
    }
}

#[derive(Default)]
struct SumAgg<T> {
    sum: T,
}

impl<T: Numeric> DoAgg<T> for SumAgg<T> {
    fn do_values(&mut self, vs: &[T]) {
        for v in vs {
            self.sum = self.sum.plus(*v);
        }
    }

    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn value(&self) -> Value {
        self.sum.into_value()
    }
}
