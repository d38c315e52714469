use crate::execute::error::ExecuteError;
use crate::table::{ColMeta, Column, ColumnType, GroupKey, Value};
use crate::time::Time;

/// One immutable row batch with positional, typed column access.
///
/// Index `i` into any column of the same reader refers to the same logical row.
pub trait ColReader {
    fn key(&self) -> &GroupKey;
    fn cols(&self) -> &[ColMeta];
    fn len(&self) -> usize;
    fn column(&self, j: usize) -> Option<&Column>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bools(&self, j: usize) -> Result<&[bool], ExecuteError> {
        typed_column(self, j)
    }

    fn ints(&self, j: usize) -> Result<&[i64], ExecuteError> {
        typed_column(self, j)
    }

    fn uints(&self, j: usize) -> Result<&[u64], ExecuteError> {
        typed_column(self, j)
    }

    fn floats(&self, j: usize) -> Result<&[f64], ExecuteError> {
        typed_column(self, j)
    }

    fn strings(&self, j: usize) -> Result<&[String], ExecuteError> {
        typed_column(self, j)
    }

    fn times(&self, j: usize) -> Result<&[Time], ExecuteError> {
        typed_column(self, j)
    }
}

/// Typed view of column `j`, failing if the column is missing or has another type.
pub fn typed_column<'a, T, R>(cr: &'a R, j: usize) -> Result<&'a [T], ExecuteError>
where
    T: ColumnType,
    R: ColReader + ?Sized,
{
    let col = cr.column(j).ok_or(ExecuteError::ColumnIndexOutOfRange(j))?;
    T::slice(col).ok_or_else(|| ExecuteError::InvalidColumnType {
        label: cr.cols()[j].label.clone(),
        expected: T::DATA_TYPE,
        actual: col.data_type(),
    })
}

/// A partition of data: an ordered sequence of row batches sharing one key and schema.
pub trait Table: Send {
    fn key(&self) -> &GroupKey;
    fn cols(&self) -> &[ColMeta];

    /// Applies `f` to each batch in arrival order, stopping at the first error.
    fn do_batches(
        &mut self,
        f: &mut dyn FnMut(&dyn ColReader) -> Result<(), ExecuteError>,
    ) -> Result<(), ExecuteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColListBatch {
    key: GroupKey,
    cols: Vec<ColMeta>,
    columns: Vec<Column>,
    len: usize,
}

impl ColListBatch {
    pub fn new(
        key: GroupKey,
        cols: Vec<ColMeta>,
        columns: Vec<Column>,
    ) -> Result<ColListBatch, ExecuteError> {
        if cols.len() != columns.len() {
            return Err(ExecuteError::InvalidArg("column metadata and data differ in length"));
        }
        let len = columns.first().map(|c| c.len()).unwrap_or(0);
        for (meta, col) in cols.iter().zip(columns.iter()) {
            if col.data_type() != meta.data_type {
                return Err(ExecuteError::InvalidColumnType {
                    label: meta.label.clone(),
                    expected: meta.data_type,
                    actual: col.data_type(),
                });
            }
            if col.len() != len {
                return Err(ExecuteError::InvalidArg("columns differ in length"));
            }
        }
        Ok(ColListBatch {
            key,
            cols,
            columns,
            len,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row(&self, i: usize) -> Vec<Value> {
        self.columns.iter().filter_map(|c| c.value(i)).collect()
    }
}

impl ColReader for ColListBatch {
    fn key(&self) -> &GroupKey {
        &self.key
    }

    fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    fn len(&self) -> usize {
        self.len
    }

    fn column(&self, j: usize) -> Option<&Column> {
        self.columns.get(j)
    }
}

/// A fully buffered table. Unlike a streaming source it can be read any number of times,
/// which is what lets a dataset fan one finished table out to several successors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColListTable {
    key: GroupKey,
    cols: Vec<ColMeta>,
    batches: Vec<ColListBatch>,
}

impl ColListTable {
    pub fn new(key: GroupKey, cols: Vec<ColMeta>, batches: Vec<ColListBatch>) -> ColListTable {
        ColListTable { key, cols, batches }
    }

    /// Buffers every batch of `tbl`, consuming its iteration.
    pub fn copy_from(tbl: &mut dyn Table) -> Result<ColListTable, ExecuteError> {
        let key = tbl.key().clone();
        let cols = tbl.cols().to_vec();
        let mut batches = Vec::new();
        tbl.do_batches(&mut |cr| {
            let columns = (0..cr.cols().len())
                .map(|j| cr.column(j).cloned())
                .collect::<Option<Vec<Column>>>()
                .ok_or(ExecuteError::ColumnIndexOutOfRange(cr.cols().len()))?;
            batches.push(ColListBatch::new(key.clone(), cols.clone(), columns)?);
            Ok(())
        })?;
        Ok(ColListTable::new(key, cols, batches))
    }

    pub fn batches(&self) -> &[ColListBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows across batches, in arrival order.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.batches
            .iter()
            .flat_map(|b| (0..b.len()).map(move |i| b.row(i)))
            .collect()
    }
}

impl Table for ColListTable {
    fn key(&self) -> &GroupKey {
        &self.key
    }

    fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    fn do_batches(
        &mut self,
        f: &mut dyn FnMut(&dyn ColReader) -> Result<(), ExecuteError>,
    ) -> Result<(), ExecuteError> {
        for batch in self.batches.iter() {
            f(batch)?;
        }
        Ok(())
    }
}
