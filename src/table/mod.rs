use crate::time::Time;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::str::FromStr;

/// Expands `$body` once per column type with `$T` bound to the matching Rust scalar type.
///
/// This is the single place where a runtime `DataType` is turned into a monomorphized
/// code path; callers pick the generic implementation once at setup time.
macro_rules! with_column_type {
    ($dt:expr, $T:ident => $body:expr) => {
        match $dt {
            $crate::table::DataType::Bool => {
                type $T = bool;
                $body
            }
            $crate::table::DataType::Int => {
                type $T = i64;
                $body
            }
            $crate::table::DataType::UInt => {
                type $T = u64;
                $body
            }
            $crate::table::DataType::Float => {
                type $T = f64;
                $body
            }
            $crate::table::DataType::String => {
                type $T = String;
                $body
            }
            $crate::table::DataType::Time => {
                type $T = $crate::time::Time;
                $body
            }
        }
    };
}

pub mod builder;
pub mod key;
pub mod reader;

pub use self::builder::TableBuilder;
pub use self::key::GroupKey;
pub use self::reader::{ColListBatch, ColListTable, ColReader, Table};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Time,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Time => "time",
        };
        f.write_str(s)
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<DataType, String> {
        match s {
            "bool" => Ok(DataType::Bool),
            "int" => Ok(DataType::Int),
            "uint" => Ok(DataType::UInt),
            "float" => Ok(DataType::Float),
            "string" => Ok(DataType::String),
            "time" => Ok(DataType::Time),
            _ => Err(format!("unknown column type {:?}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColMeta {
    pub label: String,
    pub data_type: DataType,
}

impl ColMeta {
    pub fn new(label: &str, data_type: DataType) -> ColMeta {
        ColMeta {
            label: label.to_string(),
            data_type,
        }
    }
}

/// Position of the column named `label`, if any.
pub fn col_idx(label: &str, cols: &[ColMeta]) -> Option<usize> {
    cols.iter().position(|c| c.label == label)
}

/// A single scalar, used for group key values and row-at-a-time access.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(Time),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::UInt(_) => DataType::UInt,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Time(_) => DataType::Time,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so a Value can be used as a hash key.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data_type().hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::UInt(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Time(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_value_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Value {
                Value::$variant(v)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(i64, Int);
impl_value_from!(u64, UInt);
impl_value_from!(f64, Float);
impl_value_from!(String, String);
impl_value_from!(Time, Time);

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Value {
        Value::String(v.to_string())
    }
}

/// Typed column storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    String(Vec<String>),
    Time(Vec<Time>),
}

impl Column {
    pub fn new(data_type: DataType) -> Column {
        with_column_type!(data_type, T => T::empty_column())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Column::Bool(_) => DataType::Bool,
            Column::Int(_) => DataType::Int,
            Column::UInt(_) => DataType::UInt,
            Column::Float(_) => DataType::Float,
            Column::String(_) => DataType::String,
            Column::Time(_) => DataType::Time,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::UInt(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::String(v) => v.len(),
            Column::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, i: usize) -> Option<Value> {
        match self {
            Column::Bool(v) => v.get(i).map(|x| Value::Bool(*x)),
            Column::Int(v) => v.get(i).map(|x| Value::Int(*x)),
            Column::UInt(v) => v.get(i).map(|x| Value::UInt(*x)),
            Column::Float(v) => v.get(i).map(|x| Value::Float(*x)),
            Column::String(v) => v.get(i).map(|x| Value::String(x.clone())),
            Column::Time(v) => v.get(i).map(|x| Value::Time(*x)),
        }
    }
}

/// A Rust scalar type that can back a column.
pub trait ColumnType: Clone + PartialEq + fmt::Debug + Send + 'static {
    /// Hashable identity of a value; floats use their bit pattern.
    type Key: Eq + Hash + Clone + Send;

    const DATA_TYPE: DataType;

    fn empty_column() -> Column;
    fn slice(col: &Column) -> Option<&[Self]>;
    fn vec_mut(col: &mut Column) -> Option<&mut Vec<Self>>;
    fn from_value(v: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
    fn key(&self) -> Self::Key;

    /// Bytes charged against the allocator for one value.
    fn size(&self) -> usize {
        size_of::<Self>()
    }
}

macro_rules! impl_column_type {
    ($type:ty, $variant:ident, $key:ty, $to_key:expr) => {
        impl ColumnType for $type {
            type Key = $key;

            const DATA_TYPE: DataType = DataType::$variant;

            fn empty_column() -> Column {
                Column::$variant(Vec::new())
            }

            fn slice(col: &Column) -> Option<&[$type]> {
                match col {
                    Column::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn vec_mut(col: &mut Column) -> Option<&mut Vec<$type>> {
                match col {
                    Column::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value(v: &Value) -> Option<$type> {
                match v {
                    Value::$variant(x) => Some(x.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn key(&self) -> $key {
                let f: fn(&$type) -> $key = $to_key;
                f(self)
            }
        }
    };
}

impl_column_type!(bool, Bool, bool, |v| *v);
impl_column_type!(i64, Int, i64, |v| *v);
impl_column_type!(u64, UInt, u64, |v| *v);
impl_column_type!(f64, Float, u64, |v| v.to_bits());
impl_column_type!(Time, Time, Time, |v| *v);

impl ColumnType for String {
    type Key = String;

    const DATA_TYPE: DataType = DataType::String;

    fn empty_column() -> Column {
        Column::String(Vec::new())
    }

    fn slice(col: &Column) -> Option<&[String]> {
        match col {
            Column::String(v) => Some(v),
            _ => None,
        }
    }

    fn vec_mut(col: &mut Column) -> Option<&mut Vec<String>> {
        match col {
            Column::String(v) => Some(v),
            _ => None,
        }
    }

    fn from_value(v: &Value) -> Option<String> {
        match v {
            Value::String(x) => Some(x.clone()),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn key(&self) -> String {
        self.clone()
    }

    fn size(&self) -> usize {
        size_of::<String>() + self.len()
    }
}
