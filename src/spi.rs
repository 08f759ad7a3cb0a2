//! Driver-facing connection abstraction.
//!
//! Drivers implement [`Connection`]; queries and clauses only ever talk to a
//! connection obtained from a [`ConnectionProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::bind::BindMarkers;
use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

/// Asynchronous stream of rows produced by a connection
pub type RowStream = BoxStream<'static, Result<Row>>;

/// SQL text with one or more sets of positional bindings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    sql: String,
    bindings: Vec<Vec<Value>>,
    current: Vec<Value>,
    current_bound: bool,
    generated_columns: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    /// Statement running once per entry of `bindings`, empty sets included
    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<Vec<Value>>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
            ..Self::default()
        }
    }

    /// Bind `value` at the 0-based `index` of the current binding set
    pub fn bind(&mut self, index: usize, value: Value) -> &mut Self {
        if self.current.len() <= index {
            self.current.resize(index + 1, Value::Null);
        }
        self.current[index] = value;
        self.current_bound = true;
        self
    }

    /// Bind every value of `values` in order
    pub fn bind_all(&mut self, values: Vec<Value>) -> &mut Self {
        for (index, value) in values.into_iter().enumerate() {
            self.bind(index, value);
        }
        self
    }

    /// Close the current binding set, even an empty one, and start the next
    pub fn add(&mut self) -> &mut Self {
        self.bindings.push(std::mem::take(&mut self.current));
        self.current_bound = false;
        self
    }

    /// Ask the driver to return the values generated for `columns`
    pub fn return_generated_values(&mut self, columns: &[&str]) -> &mut Self {
        self.generated_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Closed binding sets followed by the current one if anything was
    /// bound to it. A statement without any set runs once, unbound.
    pub fn bindings(&self) -> Vec<Vec<Value>> {
        let mut bindings = self.bindings.clone();
        if self.current_bound {
            bindings.push(self.current.clone());
        }
        if bindings.is_empty() {
            bindings.push(Vec::new());
        }
        bindings
    }

    pub fn generated_columns(&self) -> &[String] {
        &self.generated_columns
    }
}

/// A database session able to run statements
#[async_trait]
pub trait Connection: Send + Sync {
    fn bind_markers(&self) -> BindMarkers;

    /// Affected-row count of each binding set
    async fn execute(&self, statement: Statement) -> Result<Vec<u64>>;

    /// Rows produced by each binding set, in order. When the statement
    /// requests generated values, these are the rows returned.
    fn query(&self, statement: Statement) -> RowStream;

    async fn begin_transaction(&self) -> Result<()>;

    async fn commit_transaction(&self) -> Result<()>;

    async fn rollback_transaction(&self) -> Result<()>;
}

/// Source of the connection a query or clause executes on
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connection(&self) -> Result<Arc<dyn Connection>>;
}

/// Provider always yielding the same connection
#[derive(Clone)]
pub struct FixedConnectionProvider {
    connection: Arc<dyn Connection>,
}

impl FixedConnectionProvider {
    pub fn of(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ConnectionProvider for FixedConnectionProvider {
    async fn connection(&self) -> Result<Arc<dyn Connection>> {
        Ok(self.connection.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    name: String,
    declared_type: Option<String>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, declared_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            declared_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }
}

/// Column layout shared by every row of a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMetadata {
    columns: Vec<ColumnMetadata>,
}

impl RowMetadata {
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Position of the first column named `name`, ignoring ASCII case
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    metadata: Arc<RowMetadata>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(metadata: Arc<RowMetadata>, values: Vec<Value>) -> Self {
        Self { metadata, values }
    }

    pub fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| Error::NoSuchColumn(index.to_string()))
    }

    pub fn value_by_name(&self, name: &str) -> Result<&Value> {
        let index = self
            .metadata
            .index_of(name)
            .ok_or_else(|| Error::NoSuchColumn(name.to_string()))?;
        self.value(index)
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        T::from_value(self.value(index)?.clone())
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.value_by_name(name)?.clone())
    }

    /// Move the value at `index` out, leaving `Null` behind
    pub fn take(&mut self, index: usize) -> Result<Value> {
        self.values
            .get_mut(index)
            .map(std::mem::take)
            .ok_or_else(|| Error::NoSuchColumn(index.to_string()))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_sets_follow_add() {
        let mut statement = Statement::new("insert into t values (?, ?)");
        statement
            .bind(0, Value::Integer(1))
            .bind(1, Value::Text("a".into()))
            .add()
            .bind(1, Value::Text("b".into()))
            .bind(0, Value::Integer(2))
            .add();
        assert_eq!(
            statement.bindings(),
            vec![
                vec![Value::Integer(1), Value::Text("a".into())],
                vec![Value::Integer(2), Value::Text("b".into())],
            ]
        );
    }

    #[test]
    fn unbound_statement_runs_once() {
        assert_eq!(Statement::new("select 1").bindings(), vec![Vec::<Value>::new()]);
    }

    #[test]
    fn empty_binding_sets_are_kept() {
        let explicit = Statement::with_bindings("insert into t values (1)", vec![Vec::new(); 3]);
        assert_eq!(explicit.bindings().len(), 3);

        let mut added = Statement::new("insert into t values (1)");
        added.add().add().add();
        assert_eq!(added.bindings().len(), 3);
    }

    #[test]
    fn row_lookup_by_name_ignores_case() {
        let metadata = Arc::new(RowMetadata::new(vec![
            ColumnMetadata::new("Id", Some("INTEGER".into())),
            ColumnMetadata::new("PersonName", None),
        ]));
        let row = Row::new(metadata, vec![Value::Integer(1), Value::Text("Ann".into())]);
        assert_eq!(row.get_by_name::<String>("personname").unwrap(), "Ann");
        assert!(matches!(
            row.get_by_name::<i64>("Missing"),
            Err(Error::NoSuchColumn(_))
        ));
    }
}
