use crate::functions::aggregate::{Aggregate, DoAgg};
use crate::table::{DataType, Value};
use std::marker::PhantomData;

pub const COUNT_KIND: &str = "count";

/// Number of rows in a column of any non-time type.
pub struct Count;

impl Aggregate for Count {
    fn name(&self) -> &'static str {
        COUNT_KIND
    }

    fn new_bool_agg(&self) -> Option<Box<dyn DoAgg<bool>>> {
        Some(Box::new(CountAgg::<bool>::new()))
    }

    fn new_int_agg(&self) -> Option<Box<dyn DoAgg<i64>>> {
        Some(Box::new(CountAgg::<i64>::new()))
    }

    fn new_uint_agg(&self) -> Option<Box<dyn DoAgg<u64>>> {
        Some(Box::new(CountAgg::<u64>::new()))
    }

    fn new_float_agg(&self) -> Option<Box<dyn DoAgg<f64>>> {
        Some(Box::new(CountAgg::<f64>::new()))
    }

    fn new_string_agg(&self) -> Option<Box<dyn DoAgg<String>>> {
        Some(Box::new(CountAgg::<String>::new()))
    }
}

struct CountAgg<T> {
    count: i64,
    _input: PhantomData<fn(&T)>,
}

impl<T> CountAgg<T> {
    fn new() -> CountAgg<T> {
        CountAgg {
            count: 0,
            _input: PhantomData,
        }
    }
}

impl<T> DoAgg<T> for CountAgg<T> {
    fn do_values(&mut self, vs: &[T]) {
        self.count += vs.len() as i64;
    }

    fn data_type(&self) -> DataType {
        DataType::Int
    }

    fn value(&self) -> Value {
        Value::Int(self.count)
    }
}
