use crate::execute::allocator::Allocator;
use crate::execute::error::ExecuteError;
use crate::table::{
    col_idx, ColListBatch, ColListTable, ColMeta, ColReader, Column, ColumnType, GroupKey, Value,
};
use crate::time::Time;
use std::mem;

/// Mutable accumulator for the rows of one partition.
///
/// Every value appended is charged against the shared allocator and released again when the
/// builder is cleared or dropped.
#[derive(Debug)]
pub struct TableBuilder {
    key: GroupKey,
    cols: Vec<ColMeta>,
    columns: Vec<Column>,
    alloc: Allocator,
    allocated: usize,
}

impl TableBuilder {
    pub fn new(key: GroupKey, alloc: Allocator) -> TableBuilder {
        TableBuilder {
            key,
            cols: Vec::new(),
            columns: Vec::new(),
            alloc,
            allocated: 0,
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Adds a column and returns its index. Column order is the output order.
    pub fn add_col(&mut self, meta: ColMeta) -> Result<usize, ExecuteError> {
        if col_idx(&meta.label, &self.cols).is_some() {
            return Err(ExecuteError::DuplicateColumn(meta.label));
        }
        if self.nrows() > 0 {
            return Err(ExecuteError::InvalidArg(
                "cannot add a column to a builder that already has rows",
            ));
        }
        self.columns.push(Column::new(meta.data_type));
        self.cols.push(meta);
        Ok(self.cols.len() - 1)
    }

    pub fn add_table_cols(&mut self, cols: &[ColMeta]) -> Result<(), ExecuteError> {
        for c in cols {
            self.add_col(c.clone())?;
        }
        Ok(())
    }

    pub fn add_key_cols(&mut self, key: &GroupKey) -> Result<(), ExecuteError> {
        self.add_table_cols(key.cols())
    }

    /// Appends one value. Nothing is charged unless column `j` exists and holds `T`.
    pub fn append<T: ColumnType>(&mut self, j: usize, v: T) -> Result<(), ExecuteError> {
        let size = v.size();
        let col = typed_vec_mut::<T>(&self.cols, &mut self.columns, j)?;
        self.alloc.account(size)?;
        self.allocated += size;
        col.push(v);
        Ok(())
    }

    pub fn append_slice<T: ColumnType>(&mut self, j: usize, vs: &[T]) -> Result<(), ExecuteError> {
        let size: usize = vs.iter().map(|v| v.size()).sum();
        let col = typed_vec_mut::<T>(&self.cols, &mut self.columns, j)?;
        self.alloc.account(size)?;
        self.allocated += size;
        col.extend_from_slice(vs);
        Ok(())
    }

    pub fn append_column(&mut self, j: usize, col: &Column) -> Result<(), ExecuteError> {
        match col {
            Column::Bool(vs) => self.append_slice(j, vs),
            Column::Int(vs) => self.append_slice(j, vs),
            Column::UInt(vs) => self.append_slice(j, vs),
            Column::Float(vs) => self.append_slice(j, vs),
            Column::String(vs) => self.append_slice(j, vs),
            Column::Time(vs) => self.append_slice(j, vs),
        }
    }

    pub fn append_value(&mut self, j: usize, v: &Value) -> Result<(), ExecuteError> {
        match v {
            Value::Bool(x) => self.append(j, *x),
            Value::Int(x) => self.append(j, *x),
            Value::UInt(x) => self.append(j, *x),
            Value::Float(x) => self.append(j, *x),
            Value::String(x) => self.append(j, x.clone()),
            Value::Time(x) => self.append(j, *x),
        }
    }

    pub fn append_bool(&mut self, j: usize, v: bool) -> Result<(), ExecuteError> {
        self.append(j, v)
    }

    pub fn append_int(&mut self, j: usize, v: i64) -> Result<(), ExecuteError> {
        self.append(j, v)
    }

    pub fn append_uint(&mut self, j: usize, v: u64) -> Result<(), ExecuteError> {
        self.append(j, v)
    }

    pub fn append_float(&mut self, j: usize, v: f64) -> Result<(), ExecuteError> {
        self.append(j, v)
    }

    pub fn append_string(&mut self, j: usize, v: String) -> Result<(), ExecuteError> {
        self.append(j, v)
    }

    pub fn append_time(&mut self, j: usize, v: Time) -> Result<(), ExecuteError> {
        self.append(j, v)
    }

    /// Appends the key's value to every builder column that shares a label with a key column.
    pub fn append_key_values(&mut self, key: &GroupKey) -> Result<(), ExecuteError> {
        for (c, v) in key.cols().iter().zip(key.values()) {
            let j = col_idx(&c.label, &self.cols)
                .ok_or_else(|| ExecuteError::ColumnNotFound(c.label.clone()))?;
            self.append_value(j, v)?;
        }
        Ok(())
    }

    /// Copies row `i` of `cr` column by column; the builder must share the reader's schema.
    pub fn append_record(&mut self, i: usize, cr: &dyn ColReader) -> Result<(), ExecuteError> {
        for j in 0..self.cols.len() {
            let v = cr
                .column(j)
                .and_then(|c| c.value(i))
                .ok_or(ExecuteError::ColumnIndexOutOfRange(j))?;
            self.append_value(j, &v)?;
        }
        Ok(())
    }

    /// Snapshot of the rows built so far.
    pub fn table(&self) -> Result<ColListTable, ExecuteError> {
        let batch = ColListBatch::new(self.key.clone(), self.cols.clone(), self.columns.clone())?;
        Ok(ColListTable::new(
            self.key.clone(),
            self.cols.clone(),
            vec![batch],
        ))
    }

    /// Finalizes the builder into an immutable table, releasing its allocation.
    pub fn into_table(mut self) -> Result<ColListTable, ExecuteError> {
        let columns = mem::replace(&mut self.columns, Vec::new());
        let cols = self.cols.clone();
        let batch = ColListBatch::new(self.key.clone(), cols.clone(), columns)?;
        Ok(ColListTable::new(self.key.clone(), cols, vec![batch]))
    }

    /// Drops all buffered rows but keeps the schema.
    pub fn clear_data(&mut self) {
        for col in self.columns.iter_mut() {
            *col = Column::new(col.data_type());
        }
        self.release();
    }

    fn release(&mut self) {
        self.alloc.free(self.allocated);
        self.allocated = 0;
    }
}

fn typed_vec_mut<'a, T: ColumnType>(
    cols: &[ColMeta],
    columns: &'a mut [Column],
    j: usize,
) -> Result<&'a mut Vec<T>, ExecuteError> {
    let (meta, col) = match (cols.get(j), columns.get_mut(j)) {
        (Some(meta), Some(col)) => (meta, col),
        _ => return Err(ExecuteError::ColumnIndexOutOfRange(j)),
    };
    let actual = col.data_type();
    T::vec_mut(col).ok_or_else(|| ExecuteError::InvalidColumnType {
        label: meta.label.clone(),
        expected: T::DATA_TYPE,
        actual,
    })
}

impl Drop for TableBuilder {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::allocator::AllocError;
    use crate::table::DataType;

    fn tag_key(tag: &str) -> GroupKey {
        GroupKey::new(
            vec![ColMeta::new("t1", DataType::String)],
            vec![Value::String(tag.to_string())],
        )
        .expect("valid key")
    }

    #[test]
    fn it_builds_a_table() {
        let mut b = TableBuilder::new(tag_key("a"), Allocator::unlimited());
        b.add_key_cols(&tag_key("a")).unwrap();
        let tj = b.add_col(ColMeta::new("_time", DataType::Time)).unwrap();
        let vj = b.add_col(ColMeta::new("_value", DataType::Float)).unwrap();
        assert_eq!((tj, vj), (1, 2));
        for i in 0..3 {
            b.append_key_values(&tag_key("a")).unwrap();
            b.append_time(tj, Time(i)).unwrap();
            b.append_float(vj, i as f64).unwrap();
        }
        assert_eq!(b.nrows(), 3);
        let tbl = b.into_table().unwrap();
        assert_eq!(tbl.len(), 3);
        assert_eq!(
            tbl.rows()[2],
            vec![
                Value::String("a".to_string()),
                Value::Time(Time(2)),
                Value::Float(2.0)
            ]
        );
    }

    #[test]
    fn it_rejects_duplicate_labels_and_wrong_types() {
        let mut b = TableBuilder::new(GroupKey::empty(), Allocator::unlimited());
        let j = b.add_col(ColMeta::new("_value", DataType::Float)).unwrap();
        assert_eq!(
            b.add_col(ColMeta::new("_value", DataType::Int)),
            Err(ExecuteError::DuplicateColumn("_value".to_string()))
        );
        match b.append_int(j, 1) {
            Err(ExecuteError::InvalidColumnType { actual, .. }) => {
                assert_eq!(actual, DataType::Float)
            }
            other => panic!("Expected type error, got {:?}", other),
        }
    }

    #[test]
    fn it_releases_memory_when_dropped() {
        let alloc = Allocator::new(1024);
        {
            let mut b = TableBuilder::new(GroupKey::empty(), alloc.clone());
            let j = b.add_col(ColMeta::new("_value", DataType::Int)).unwrap();
            b.append_slice(j, &[1i64, 2, 3]).unwrap();
            assert_eq!(alloc.allocated(), 24);
            b.clear_data();
            assert_eq!(alloc.allocated(), 0);
            b.append_int(j, 4).unwrap();
            assert_eq!(alloc.allocated(), 8);
        }
        assert_eq!(alloc.allocated(), 0);
    }

    #[test]
    fn it_charges_nothing_for_a_rejected_append() {
        let alloc = Allocator::new(16);
        let mut b = TableBuilder::new(GroupKey::empty(), alloc.clone());
        let j = b.add_col(ColMeta::new("_value", DataType::Float)).unwrap();
        b.append_float(j, 1.0).unwrap();
        assert!(b.append_int(j, 1).is_err());
        assert!(b.append_slice(j, &["a".to_string()]).is_err());
        assert_eq!(
            b.append_float(j + 1, 1.0),
            Err(ExecuteError::ColumnIndexOutOfRange(j + 1))
        );
        assert_eq!(alloc.allocated(), 8);
        b.append_float(j, 2.0).unwrap();
        assert_eq!(alloc.allocated(), 16);
    }

    #[test]
    fn it_fails_when_quota_is_exceeded() {
        let alloc = Allocator::new(16);
        let mut b = TableBuilder::new(GroupKey::empty(), alloc.clone());
        let j = b.add_col(ColMeta::new("_value", DataType::UInt)).unwrap();
        b.append_uint(j, 1).unwrap();
        b.append_uint(j, 2).unwrap();
        assert_eq!(
            b.append_uint(j, 3),
            Err(ExecuteError::Alloc(AllocError::QuotaExceeded {
                requested: 8,
                allocated: 16,
                limit: 16,
            }))
        );
        assert_eq!(b.nrows(), 2);
    }
}
