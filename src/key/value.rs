//! Key column types and values

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Type of a primary key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    LargeInt,
    /// Days since the unix epoch
    Date,
    /// Microseconds since the unix epoch
    Datetime,
    Varchar,
}

impl KeyType {
    /// Encoded width in bytes, or None for variable-length types
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            KeyType::Boolean | KeyType::TinyInt => Some(1),
            KeyType::SmallInt => Some(2),
            KeyType::Int | KeyType::Date => Some(4),
            KeyType::BigInt | KeyType::Datetime => Some(8),
            KeyType::LargeInt => Some(16),
            KeyType::Varchar => None,
        }
    }
}

/// A single key column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    LargeInt(i128),
    Date(i32),
    Datetime(i64),
    Varchar(Vec<u8>),
}

impl KeyValue {
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValue::Boolean(_) => KeyType::Boolean,
            KeyValue::TinyInt(_) => KeyType::TinyInt,
            KeyValue::SmallInt(_) => KeyType::SmallInt,
            KeyValue::Int(_) => KeyType::Int,
            KeyValue::BigInt(_) => KeyType::BigInt,
            KeyValue::LargeInt(_) => KeyType::LargeInt,
            KeyValue::Date(_) => KeyType::Date,
            KeyValue::Datetime(_) => KeyType::Datetime,
            KeyValue::Varchar(_) => KeyType::Varchar,
        }
    }

    /// Convenience constructor for string keys
    pub fn varchar(s: impl AsRef<[u8]>) -> Self {
        KeyValue::Varchar(s.as_ref().to_vec())
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Boolean(v) => write!(f, "{}", v),
            KeyValue::TinyInt(v) => write!(f, "{}", v),
            KeyValue::SmallInt(v) => write!(f, "{}", v),
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::BigInt(v) => write!(f, "{}", v),
            KeyValue::LargeInt(v) => write!(f, "{}", v),
            KeyValue::Date(days) => write!(f, "date({})", days),
            KeyValue::Datetime(micros) => write!(f, "datetime({})", micros),
            KeyValue::Varchar(bytes) => write!(f, "'{}'", String::from_utf8_lossy(bytes)),
        }
    }
}

/// A named primary key column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyColumn {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }
}

/// Ordered list of primary key columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    columns: Vec<KeyColumn>,
}

impl KeySchema {
    /// Create a schema; at least one column is required
    pub fn new(columns: Vec<KeyColumn>) -> Result<Self> {
        if columns.is_empty() {
            return Err(IndexError::KeyEncoding(
                "primary key schema must have at least one column".to_string(),
            ));
        }
        Ok(Self { columns })
    }

    /// Single-column schema
    pub fn single(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            columns: vec![KeyColumn::new(name, key_type)],
        }
    }

    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Total encoded width if every column is fixed-width
    pub fn fixed_width(&self) -> Option<usize> {
        self.columns
            .iter()
            .map(|c| c.key_type.fixed_width())
            .sum()
    }
}
