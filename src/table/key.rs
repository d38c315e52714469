use crate::table::{col_idx, ColMeta, Value};
use crate::time::Time;
use std::fmt;
use std::sync::Arc;

/// The ordered (label, type, value) triples that are constant within one partition.
///
/// Keys are immutable and cheap to clone; two keys are equal iff they carry the same
/// labels and values in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    inner: Arc<KeyInner>,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct KeyInner {
    cols: Vec<ColMeta>,
    values: Vec<Value>,
}

impl GroupKey {
    /// Builds a key, returning `None` if the columns and values disagree in length or type.
    pub fn new(cols: Vec<ColMeta>, values: Vec<Value>) -> Option<GroupKey> {
        if cols.len() != values.len() {
            return None;
        }
        if cols
            .iter()
            .zip(values.iter())
            .any(|(c, v)| c.data_type != v.data_type())
        {
            return None;
        }
        Some(GroupKey {
            inner: Arc::new(KeyInner { cols, values }),
        })
    }

    pub fn empty() -> GroupKey {
        GroupKey {
            inner: Arc::new(KeyInner {
                cols: Vec::new(),
                values: Vec::new(),
            }),
        }
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.inner.cols
    }

    pub fn values(&self) -> &[Value] {
        &self.inner.values
    }

    pub fn len(&self) -> usize {
        self.inner.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cols.is_empty()
    }

    pub fn has_col(&self, label: &str) -> bool {
        self.index(label).is_some()
    }

    pub fn index(&self, label: &str) -> Option<usize> {
        col_idx(label, &self.inner.cols)
    }

    pub fn value(&self, j: usize) -> Option<&Value> {
        self.inner.values.get(j)
    }

    pub fn label_value(&self, label: &str) -> Option<&Value> {
        self.index(label).and_then(|j| self.value(j))
    }

    pub fn value_time(&self, j: usize) -> Option<Time> {
        self.value(j).and_then(|v| v.as_time())
    }

    /// A copy of this key with the value at `j` replaced; types must match.
    pub fn with_value(&self, j: usize, value: Value) -> Option<GroupKey> {
        let mut values = self.inner.values.clone();
        match values.get_mut(j) {
            Some(v) if v.data_type() == value.data_type() => *v = value,
            _ => return None,
        }
        GroupKey::new(self.inner.cols.clone(), values)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (j, (c, v)) in self.cols().iter().zip(self.values()).enumerate() {
            if j > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", c.label, v)?;
        }
        f.write_str("}")
    }
}
