use crate::execute::error::ExecuteError;
use crate::table::reader::typed_column;
use crate::table::{ColMeta, ColReader, ColumnType, DataType, Value};
use std::collections::{HashMap, HashSet};

/// Stateful row predicate; state carries across the batches of one table.
pub trait RowFilter: Send {
    fn keep(&mut self, cr: &dyn ColReader, i: usize) -> Result<bool, ExecuteError>;
}

/// Keeps the first row carrying each distinct value of one column.
struct FirstSeen<T: ColumnType> {
    col: usize,
    seen: HashSet<T::Key>,
}

impl<T: ColumnType> RowFilter for FirstSeen<T> {
    fn keep(&mut self, cr: &dyn ColReader, i: usize) -> Result<bool, ExecuteError> {
        let vs = typed_column::<T, _>(cr, self.col)?;
        Ok(self.seen.insert(vs[i].key()))
    }
}

pub fn first_seen(data_type: DataType, col: usize) -> Box<dyn RowFilter> {
    with_column_type!(data_type, T => Box::new(FirstSeen::<T> {
        col,
        seen: HashSet::new(),
    }))
}

/// Remembers the value of one column in the last kept row.
trait LastValue: Send {
    fn differs(&self, cr: &dyn ColReader, i: usize) -> Result<bool, ExecuteError>;
    fn remember(&mut self, cr: &dyn ColReader, i: usize) -> Result<(), ExecuteError>;
}

struct TypedLastValue<T: ColumnType> {
    col: usize,
    last: Option<T::Key>,
}

impl<T: ColumnType> LastValue for TypedLastValue<T> {
    fn differs(&self, cr: &dyn ColReader, i: usize) -> Result<bool, ExecuteError> {
        let vs = typed_column::<T, _>(cr, self.col)?;
        Ok(self.last.as_ref() != Some(&vs[i].key()))
    }

    fn remember(&mut self, cr: &dyn ColReader, i: usize) -> Result<(), ExecuteError> {
        let vs = typed_column::<T, _>(cr, self.col)?;
        self.last = Some(vs[i].key());
        Ok(())
    }
}

/// Keeps a row iff some column differs from the last kept row. The first row is always kept.
struct ValueChange {
    columns: Vec<Box<dyn LastValue>>,
    started: bool,
}

impl RowFilter for ValueChange {
    fn keep(&mut self, cr: &dyn ColReader, i: usize) -> Result<bool, ExecuteError> {
        let mut changed = !self.started;
        for c in self.columns.iter() {
            if changed {
                break;
            }
            changed = c.differs(cr, i)?;
        }
        if changed {
            for c in self.columns.iter_mut() {
                c.remember(cr, i)?;
            }
            self.started = true;
        }
        Ok(changed)
    }
}

pub fn value_change(cols: &[ColMeta]) -> Box<dyn RowFilter> {
    let columns = cols
        .iter()
        .enumerate()
        .map(|(col, c)| -> Box<dyn LastValue> {
            with_column_type!(c.data_type, T => Box::new(TypedLastValue::<T> {
                col,
                last: None,
            }))
        })
        .collect();
    Box::new(ValueChange {
        columns,
        started: false,
    })
}

/// Keeps a row unless every one of its values has been seen before. Seen values are pooled
/// per data type, so all columns of one type share a set.
struct SharedValues {
    ncols: usize,
    seen: HashMap<DataType, HashSet<Value>>,
}

impl RowFilter for SharedValues {
    fn keep(&mut self, cr: &dyn ColReader, i: usize) -> Result<bool, ExecuteError> {
        let mut unseen = false;
        for j in 0..self.ncols {
            let v = cr
                .column(j)
                .and_then(|c| c.value(i))
                .ok_or(ExecuteError::ColumnIndexOutOfRange(j))?;
            let set = self.seen.entry(v.data_type()).or_insert_with(HashSet::new);
            if set.insert(v) {
                unseen = true;
            }
        }
        Ok(unseen)
    }
}

pub fn any_unseen_value(ncols: usize) -> Box<dyn RowFilter> {
    Box::new(SharedValues {
        ncols,
        seen: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColListBatch, Column, GroupKey};

    fn batch(tags: Vec<&str>, values: Vec<f64>) -> ColListBatch {
        ColListBatch::new(
            GroupKey::empty(),
            vec![
                ColMeta::new("tag", DataType::String),
                ColMeta::new("_value", DataType::Float),
            ],
            vec![
                Column::String(tags.into_iter().map(String::from).collect()),
                Column::Float(values),
            ],
        )
        .unwrap()
    }

    fn kept(f: &mut dyn RowFilter, batches: &[ColListBatch]) -> Vec<Vec<Value>> {
        let mut rows = Vec::new();
        for b in batches {
            for i in 0..b.len() {
                if f.keep(b, i).unwrap() {
                    rows.push(b.row(i));
                }
            }
        }
        rows
    }

    #[test]
    fn it_keeps_first_occurrence_across_batches() {
        let batches = vec![batch(vec!["a", "b"], vec![1.0, 2.0]), batch(vec!["a", "c"], vec![3.0, 4.0])];
        let mut f = first_seen(DataType::String, 0);
        let rows = kept(&mut *f, &batches);
        assert_eq!(
            rows,
            vec![
                vec![Value::from("a"), Value::Float(1.0)],
                vec![Value::from("b"), Value::Float(2.0)],
                vec![Value::from("c"), Value::Float(4.0)],
            ]
        );
    }

    #[test]
    fn it_keeps_rows_that_change_any_column() {
        let b = batch(vec!["a", "a", "a", "b", "b"], vec![1.0, 1.0, 2.0, 2.0, 2.0]);
        let mut f = value_change(b.cols());
        let rows = kept(&mut *f, &[b]);
        assert_eq!(
            rows,
            vec![
                vec![Value::from("a"), Value::Float(1.0)],
                vec![Value::from("a"), Value::Float(2.0)],
                vec![Value::from("b"), Value::Float(2.0)],
            ]
        );
    }

    #[test]
    fn it_keeps_rows_with_an_unseen_value() {
        let b = batch(vec!["a", "b", "a", "a"], vec![1.0, 1.0, 1.0, 2.0]);
        let mut f = any_unseen_value(2);
        assert_eq!(
            kept(&mut *f, &[b]),
            vec![
                vec![Value::from("a"), Value::Float(1.0)],
                vec![Value::from("b"), Value::Float(1.0)],
                vec![Value::from("a"), Value::Float(2.0)],
            ]
        );
    }

    #[test]
    fn it_shares_seen_values_between_columns_of_one_type() {
        let b = ColListBatch::new(
            GroupKey::empty(),
            vec![
                ColMeta::new("host", DataType::String),
                ColMeta::new("region", DataType::String),
            ],
            vec![
                Column::String(vec!["a".to_string(), "b".to_string()]),
                Column::String(vec!["b".to_string(), "a".to_string()]),
            ],
        )
        .unwrap();
        let mut f = any_unseen_value(2);
        assert_eq!(kept(&mut *f, &[b]).len(), 1);
    }
}
