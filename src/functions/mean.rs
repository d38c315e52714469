use crate::functions::aggregate::{Aggregate, DoAgg, Numeric};
use crate::table::{DataType, Value};
use std::f64;
use std::marker::PhantomData;

pub const MEAN_KIND: &str = "mean";

/// Arithmetic mean of int, uint and float columns, always as a float.
/// An empty partition yields NaN.
pub struct Mean;

impl Aggregate for Mean {
    fn name(&self) -> &'static str {
        MEAN_KIND
    }

    fn new_int_agg(&self) -> Option<Box<dyn DoAgg<i64>>> {
        Some(Box::new(MeanAgg::<i64>::new()))
    }

    fn new_uint_agg(&self) -> Option<Box<dyn DoAgg<u64>>> {
        Some(Box::new(MeanAgg::<u64>::new()))
    }

    fn new_float_agg(&self) -> Option<Box<dyn DoAgg<f64>>> {
        Some(Box::new(MeanAgg::<f64>::new()))
    }
}

struct MeanAgg<T> {
    count: u64,
    sum: f64,
    _input: PhantomData<T>,
}

impl<T> MeanAgg<T> {
    fn new() -> MeanAgg<T> {
        MeanAgg {
            count: 0,
            sum: 0.0,
            _input: PhantomData,
        }
    }
}

impl<T: Numeric> DoAgg<T> for MeanAgg<T> {
    fn do_values(&mut self, vs: &[T]) {
        self.count += vs.len() as u64;
        for v in vs {
            self.sum += v.to_f64();
        }
    }

    fn data_type(&self) -> DataType {
        DataType::Float
    }

    fn value(&self) -> Value {
        if self.count == 0 {
            return Value::Float(f64::NAN);
        }
        Value::Float(self.sum / self.count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_averages_ints_as_float() {
        let mut agg = Mean.new_int_agg().unwrap();
        agg.do_values(&[1, 2]);
        agg.do_values(&[6]);
        assert_eq!(agg.data_type(), DataType::Float);
        assert_eq!(agg.value(), Value::Float(3.0));
    }

    #[test]
    fn it_returns_nan_for_empty_input() {
        let agg = Mean.new_float_agg().unwrap();
        match agg.value() {
            Value::Float(v) => assert!(v.is_nan()),
            other => panic!("Expected float, got {:?}", other),
        }
    }
}
