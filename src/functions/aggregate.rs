use crate::execute::dataset::Dataset;
use crate::execute::error::ExecuteError;
use crate::execute::transformation::{DatasetId, Transformation};
use crate::execute::{DEFAULT_STOP_COL_LABEL, DEFAULT_TIME_COL_LABEL, DEFAULT_VALUE_COL_LABEL};
use crate::table::{col_idx, ColMeta, ColReader, ColumnType, DataType, GroupKey, Table, Value};
use crate::time::Time;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateConfig {
    pub columns: Vec<String>,
    pub time_src: String,
    pub time_dst: String,
}

impl Default for AggregateConfig {
    fn default() -> AggregateConfig {
        AggregateConfig {
            columns: vec![DEFAULT_VALUE_COL_LABEL.to_string()],
            time_src: DEFAULT_STOP_COL_LABEL.to_string(),
            time_dst: DEFAULT_TIME_COL_LABEL.to_string(),
        }
    }
}

impl AggregateConfig {
    pub fn validate(&self) -> Result<(), ExecuteError> {
        if self.columns.is_empty() {
            return Err(ExecuteError::MissingArg("columns"));
        }
        if self.time_src.is_empty() {
            return Err(ExecuteError::MissingArg("timeSrc"));
        }
        if self.time_dst.is_empty() {
            return Err(ExecuteError::MissingArg("timeDst"));
        }
        Ok(())
    }
}

/// Numeric scalars that aggregates and regressions can fold.
pub trait Numeric: ColumnType + Copy + Default {
    fn to_f64(self) -> f64;
    fn plus(self, other: Self) -> Self;
}

impl Numeric for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn plus(self, other: i64) -> i64 {
        self.wrapping_add(other)
    }
}

impl Numeric for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn plus(self, other: u64) -> u64 {
        self.wrapping_add(other)
    }
}

impl Numeric for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn plus(self, other: f64) -> f64 {
        self + other
    }
}

/// Folds slices of one input type into a single output scalar.
pub trait DoAgg<T>: Send {
    fn do_values(&mut self, vs: &[T]);
    /// Type of the value produced.
    fn data_type(&self) -> DataType;
    fn value(&self) -> Value;
}

/// An aggregate offers one constructor per input type; `None` means the type is unsupported.
pub trait Aggregate: Send {
    fn name(&self) -> &'static str;

    fn new_bool_agg(&self) -> Option<Box<dyn DoAgg<bool>>> {
        None
    }

    fn new_int_agg(&self) -> Option<Box<dyn DoAgg<i64>>> {
        None
    }

    fn new_uint_agg(&self) -> Option<Box<dyn DoAgg<u64>>> {
        None
    }

    fn new_float_agg(&self) -> Option<Box<dyn DoAgg<f64>>> {
        None
    }

    fn new_string_agg(&self) -> Option<Box<dyn DoAgg<String>>> {
        None
    }
}

/// An aggregator bound to the type of the column it consumes.
pub enum ValueFunc {
    Bool(Box<dyn DoAgg<bool>>),
    Int(Box<dyn DoAgg<i64>>),
    UInt(Box<dyn DoAgg<u64>>),
    Float(Box<dyn DoAgg<f64>>),
    String(Box<dyn DoAgg<String>>),
}

impl ValueFunc {
    pub fn new(agg: &dyn Aggregate, data_type: DataType) -> Result<ValueFunc, ExecuteError> {
        let vf = match data_type {
            DataType::Bool => agg.new_bool_agg().map(ValueFunc::Bool),
            DataType::Int => agg.new_int_agg().map(ValueFunc::Int),
            DataType::UInt => agg.new_uint_agg().map(ValueFunc::UInt),
            DataType::Float => agg.new_float_agg().map(ValueFunc::Float),
            DataType::String => agg.new_string_agg().map(ValueFunc::String),
            DataType::Time => None,
        };
        vf.ok_or(ExecuteError::UnsupportedType {
            op: agg.name(),
            data_type,
        })
    }

    /// Feeds column `j` of one batch.
    pub fn consume(&mut self, cr: &dyn ColReader, j: usize) -> Result<(), ExecuteError> {
        match self {
            ValueFunc::Bool(f) => f.do_values(cr.bools(j)?),
            ValueFunc::Int(f) => f.do_values(cr.ints(j)?),
            ValueFunc::UInt(f) => f.do_values(cr.uints(j)?),
            ValueFunc::Float(f) => f.do_values(cr.floats(j)?),
            ValueFunc::String(f) => f.do_values(cr.strings(j)?),
        }
        Ok(())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ValueFunc::Bool(f) => f.data_type(),
            ValueFunc::Int(f) => f.data_type(),
            ValueFunc::UInt(f) => f.data_type(),
            ValueFunc::Float(f) => f.data_type(),
            ValueFunc::String(f) => f.data_type(),
        }
    }

    pub fn value(&self) -> Value {
        match self {
            ValueFunc::Bool(f) => f.value(),
            ValueFunc::Int(f) => f.value(),
            ValueFunc::UInt(f) => f.value(),
            ValueFunc::Float(f) => f.value(),
            ValueFunc::String(f) => f.value(),
        }
    }
}

/// Reduces each partition to one row: the key columns, a timestamp copied from the key
/// column `time_src`, and one aggregated value per configured column.
pub struct AggregateTransformation {
    d: Dataset,
    agg: Box<dyn Aggregate>,
    config: AggregateConfig,
}

impl AggregateTransformation {
    pub fn new(
        d: Dataset,
        agg: Box<dyn Aggregate>,
        config: AggregateConfig,
    ) -> Result<AggregateTransformation, ExecuteError> {
        config.validate()?;
        Ok(AggregateTransformation { d, agg, config })
    }
}

impl Transformation for AggregateTransformation {
    fn retract_table(&mut self, _id: DatasetId, key: &GroupKey) -> Result<(), ExecuteError> {
        self.d.retract_table(key)
    }

    fn process(&mut self, _id: DatasetId, tbl: &mut dyn Table) -> Result<(), ExecuteError> {
        let key = tbl.key().clone();
        let cols = tbl.cols().to_vec();

        let mut table_idx = Vec::with_capacity(self.config.columns.len());
        let mut aggregates = Vec::with_capacity(self.config.columns.len());
        for label in self.config.columns.iter() {
            let j = col_idx(label, &cols).ok_or_else(|| ExecuteError::ColumnNotFound(label.clone()))?;
            if key.has_col(label) {
                return Err(ExecuteError::ColumnIsGroupKey(label.clone()));
            }
            aggregates.push(ValueFunc::new(&*self.agg, cols[j].data_type)?);
            table_idx.push(j);
        }
        let time = aggregate_time(&self.config.time_src, &key)?;

        let builder = self.d.new_table_builder(&key, self.agg.name())?;
        builder.add_key_cols(&key)?;
        let time_j = builder.add_col(ColMeta::new(&self.config.time_dst, DataType::Time))?;
        let mut builder_idx = Vec::with_capacity(aggregates.len());
        for (label, vf) in self.config.columns.iter().zip(aggregates.iter()) {
            builder_idx.push(builder.add_col(ColMeta::new(label, vf.data_type()))?);
        }

        tbl.do_batches(&mut |cr| {
            for (vf, &j) in aggregates.iter_mut().zip(table_idx.iter()) {
                vf.consume(cr, j)?;
            }
            Ok(())
        })?;

        builder.append_key_values(&key)?;
        builder.append_time(time_j, time)?;
        for (vf, &bj) in aggregates.iter().zip(builder_idx.iter()) {
            builder.append_value(bj, &vf.value())?;
        }
        Ok(())
    }

    fn update_watermark(&mut self, _id: DatasetId, mark: Time) -> Result<(), ExecuteError> {
        self.d.update_watermark(mark)
    }

    fn update_processing_time(&mut self, _id: DatasetId, t: Time) -> Result<(), ExecuteError> {
        self.d.update_processing_time(t)
    }

    fn finish(&mut self, _id: DatasetId, err: Option<ExecuteError>) -> Result<(), ExecuteError> {
        self.d.finish(err)
    }
}

/// The time value of key column `time_src`, which must exist and be of type time.
pub fn aggregate_time(time_src: &str, key: &GroupKey) -> Result<Time, ExecuteError> {
    let j = key
        .index(time_src)
        .ok_or_else(|| ExecuteError::ColumnNotFound(time_src.to_string()))?;
    let actual = key.cols()[j].data_type;
    key.value_time(j).ok_or(ExecuteError::InvalidColumnType {
        label: time_src.to_string(),
        expected: DataType::Time,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::mock::{pass_through_test_helper, process_test_helper, MockTable};
    use crate::functions::count::Count;
    use crate::functions::mean::Mean;
    use crate::functions::sum::Sum;

    fn window_table() -> MockTable {
        MockTable::new(&[
            ("_start", DataType::Time),
            ("_stop", DataType::Time),
            ("_time", DataType::Time),
            ("t1", DataType::String),
            ("_value", DataType::Float),
            ("n", DataType::Int),
        ])
        .key_cols(&["_start", "_stop", "t1"])
    }

    fn aggregate(
        agg: Box<dyn Aggregate>,
        config: AggregateConfig,
        data: Vec<MockTable>,
    ) -> Result<Vec<Vec<Value>>, ExecuteError> {
        let tables = data
            .into_iter()
            .map(|t| t.build())
            .collect::<Result<Vec<_>, _>>()?;
        let out = process_test_helper(tables, move |d| {
            let t: Box<dyn Transformation> = Box::new(AggregateTransformation::new(d, agg, config)?);
            Ok(t)
        })?;
        Ok(out.iter().flat_map(|t| t.rows()).collect())
    }

    #[test]
    fn it_sums_each_partition() {
        let data = vec![
            window_table()
                .row(crate::row![Time(0), Time(10), Time(1), "a", 1.5, 2i64])
                .row(crate::row![Time(0), Time(10), Time(2), "a", 2.5, 3i64]),
            window_table().row(crate::row![Time(0), Time(10), Time(3), "b", 4.0, 1i64]),
        ];
        let config = AggregateConfig {
            columns: vec!["_value".to_string(), "n".to_string()],
            ..AggregateConfig::default()
        };
        let rows = aggregate(Box::new(Sum), config, data).unwrap();
        assert_eq!(
            rows,
            vec![
                crate::row![Time(0), Time(10), "a", Time(10), 4.0, 5i64],
                crate::row![Time(0), Time(10), "b", Time(10), 4.0, 1i64],
            ]
        );
    }

    #[test]
    fn it_streams_values_across_batches() {
        let data = vec![window_table()
            .batch_size(1)
            .row(crate::row![Time(0), Time(10), Time(1), "a", 1.0, 1i64])
            .row(crate::row![Time(0), Time(10), Time(2), "a", 2.0, 1i64])
            .row(crate::row![Time(0), Time(10), Time(3), "a", 6.0, 1i64])];
        let rows = aggregate(Box::new(Mean), AggregateConfig::default(), data).unwrap();
        assert_eq!(rows, vec![crate::row![Time(0), Time(10), "a", Time(10), 3.0]]);
    }

    #[test]
    fn it_rejects_time_columns_even_for_count() {
        let data = vec![window_table()
            .row(crate::row![Time(0), Time(10), Time(1), "a", 1.0, 1i64])
            .row(crate::row![Time(0), Time(10), Time(2), "a", 2.0, 1i64])];
        let config = AggregateConfig {
            columns: vec!["_time".to_string()],
            time_dst: "_at".to_string(),
            ..AggregateConfig::default()
        };
        assert_eq!(
            aggregate(Box::new(Count), config, data),
            Err(ExecuteError::UnsupportedType {
                op: "count",
                data_type: DataType::Time,
            })
        );
    }

    #[test]
    fn it_rejects_group_key_columns() {
        let data = vec![window_table().row(crate::row![Time(0), Time(10), Time(1), "a", 1.0, 1i64])];
        let config = AggregateConfig {
            columns: vec!["t1".to_string()],
            ..AggregateConfig::default()
        };
        assert_eq!(
            aggregate(Box::new(Count), config, data),
            Err(ExecuteError::ColumnIsGroupKey("t1".to_string()))
        );
    }

    #[test]
    fn it_rejects_unsupported_types() {
        let table = MockTable::new(&[("_stop", DataType::Time), ("flag", DataType::Bool)])
            .key_cols(&["_stop"])
            .row(crate::row![Time(5), true]);
        let bool_config = AggregateConfig {
            columns: vec!["flag".to_string()],
            ..AggregateConfig::default()
        };
        assert_eq!(
            aggregate(Box::new(Sum), bool_config, vec![table]),
            Err(ExecuteError::UnsupportedType {
                op: "sum",
                data_type: DataType::Bool,
            })
        );
    }

    #[test]
    fn it_requires_a_time_typed_source_column() {
        let data = vec![window_table().row(crate::row![Time(0), Time(10), Time(1), "a", 1.0, 1i64])];
        let config = AggregateConfig {
            time_src: "t1".to_string(),
            ..AggregateConfig::default()
        };
        assert_eq!(
            aggregate(Box::new(Sum), config, data),
            Err(ExecuteError::InvalidColumnType {
                label: "t1".to_string(),
                expected: DataType::Time,
                actual: DataType::String,
            })
        );

        let missing = AggregateConfig {
            time_src: "_end".to_string(),
            ..AggregateConfig::default()
        };
        let data = vec![window_table().row(crate::row![Time(0), Time(10), Time(1), "a", 1.0, 1i64])];
        assert_eq!(
            aggregate(Box::new(Sum), missing, data),
            Err(ExecuteError::ColumnNotFound("_end".to_string()))
        );
    }

    #[test]
    fn it_rejects_duplicate_partitions() {
        let data = vec![
            window_table().row(crate::row![Time(0), Time(10), Time(1), "a", 1.0, 1i64]),
            window_table().row(crate::row![Time(0), Time(10), Time(2), "a", 2.0, 1i64]),
        ];
        match aggregate(Box::new(Sum), AggregateConfig::default(), data) {
            Err(ExecuteError::DuplicateTable { op, .. }) => assert_eq!(op, "sum"),
            other => panic!("Expected duplicate table error, got {:?}", other),
        }
    }

    #[test]
    fn it_passes_signals_downstream() {
        pass_through_test_helper(|d| {
            let t: Box<dyn Transformation> = Box::new(AggregateTransformation::new(
                d,
                Box::new(Sum),
                AggregateConfig::default(),
            )?);
            Ok(t)
        })
        .unwrap();
    }
}
