//! SQLite driver: schema bootstrap, a [`Connection`] over `rusqlite` and a
//! small round-robin pool.
//!
//! All `rusqlite` calls run on tokio's blocking pool. Rows are handed to the
//! async side through a bounded channel of `fetch_size` rows, so a slow
//! consumer pauses the producer and dropping the stream stops it.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::params_from_iter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::bind::BindMarkers;
use crate::error::{Error, Result};
use crate::spi::{ColumnMetadata, Connection, ConnectionProvider, Row, RowMetadata, RowStream, Statement};
use crate::templates::{SqlTemplates, SqliteTemplates};
use crate::value::Value;

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// `create table` statements followed by their `create index` statements
    pub fn to_sql(&self) -> Vec<String> {
        let mut statements: Vec<String> = self.tables.iter().map(TableDefinition::create_sql).collect();
        statements.extend(self.tables.iter().flat_map(TableDefinition::index_sql));
        statements
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("primary key ({})", quote_all(&self.primary_key)));
        }
        parts.extend(self.foreign_keys.iter().map(ForeignKey::sql));
        format!(
            "create table if not exists {} ({})",
            quote(&self.name),
            parts.join(", ")
        )
    }

    pub fn index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                format!(
                    "create {}index if not exists {} on {} ({})",
                    if index.unique { "unique " } else { "" },
                    quote(&index.name),
                    quote(&self.name),
                    quote_all(&index.columns)
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn default_value(mut self, default_value: DefaultValue) -> Self {
        self.default_value = Some(default_value);
        self
    }

    fn sql(&self) -> String {
        let mut sql = format!("{} {}", quote(&self.name), self.data_type.sql());
        for constraint in &self.constraints {
            sql.push_str(match constraint {
                ColumnConstraint::PrimaryKey => " primary key",
                ColumnConstraint::NotNull => " not null",
                ColumnConstraint::Unique => " unique",
            });
        }
        if let Some(default_value) = &self.default_value {
            sql.push_str(" default ");
            sql.push_str(&default_value.sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    fn sql(self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Text => "text",
            DataType::Real => "real",
            DataType::Blob => "blob",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
    CurrentTimestamp,
}

impl DefaultValue {
    fn sql(&self) -> String {
        match self {
            DefaultValue::Integer(v) => v.to_string(),
            DefaultValue::Text(v) => SqliteTemplates.literal(&Value::Text(v.clone())),
            DefaultValue::Real(v) => SqliteTemplates.literal(&Value::Real(*v)),
            DefaultValue::Null => "null".to_string(),
            DefaultValue::CurrentTimestamp => "current_timestamp".to_string(),
        }
    }
}

/// Foreign key over one or more columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub foreign_table: String,
    pub foreign_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    pub fn new(columns: &[&str], foreign_table: impl Into<String>, foreign_columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            foreign_table: foreign_table.into(),
            foreign_columns: foreign_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    fn sql(&self) -> String {
        format!(
            "foreign key ({}) references {} ({}) on delete {} on update {}",
            quote_all(&self.columns),
            quote(&self.foreign_table),
            quote_all(&self.foreign_columns),
            self.on_delete.sql(),
            self.on_update.sql()
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ForeignKeyAction {
    fn sql(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "no action",
            ForeignKeyAction::Cascade => "cascade",
            ForeignKeyAction::SetNull => "set null",
            ForeignKeyAction::SetDefault => "set default",
            ForeignKeyAction::Restrict => "restrict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

fn quote(identifier: &str) -> String {
    SqliteTemplates.quote_identifier(identifier)
}

fn quote_all(identifiers: &[String]) -> String {
    identifiers
        .iter()
        .map(|i| quote(i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_pool_size() -> usize {
    4
}

fn default_fetch_size() -> usize {
    64
}

/// SQLite connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// Schema created when the pool opens
    #[serde(default)]
    pub schema: Schema,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Rows buffered between the database and a slow consumer
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<String>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
            pool_size: default_pool_size(),
            fetch_size: default_fetch_size(),
        }
    }

    pub fn in_memory(schema: Schema) -> Self {
        Self::new(":memory:", schema)
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_empty() || self.db_path == ":memory:"
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }
        if self.fetch_size == 0 {
            return Err(Error::Config("fetch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Boolean(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

/// A single SQLite connection.
///
/// The connection runs one statement at a time: drain or drop a row stream
/// before starting another statement on the same connection.
#[derive(Clone)]
pub struct SqliteConnection {
    inner: Arc<Mutex<rusqlite::Connection>>,
    fetch_size: usize,
}

impl SqliteConnection {
    pub fn from_connection(connection: rusqlite::Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(connection)),
            fetch_size: default_fetch_size(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let connection = rusqlite::Connection::open(path)?;
        connection.execute_batch("pragma foreign_keys = on")?;
        Ok(Self::from_connection(connection))
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection = rusqlite::Connection::open_in_memory()?;
        connection.execute_batch("pragma foreign_keys = on")?;
        Ok(Self::from_connection(connection))
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    /// Run `f` against the raw connection on the blocking pool
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = inner.lock().map_err(|_| Error::LockPoisoned)?;
            f(&mut connection)
        })
        .await?
    }

    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
        let sql = sql.into();
        self.call(move |connection| Ok(connection.execute_batch(&sql)?))
            .await
    }

    pub async fn initialize_schema(&self, schema: &Schema) -> Result<()> {
        let statements = schema.to_sql();
        info!(tables = schema.tables.len(), "Initializing sqlite schema");
        self.call(move |connection| {
            let tx = connection.transaction()?;
            for sql in &statements {
                debug!(sql = %sql, "Creating schema object");
                tx.execute_batch(sql)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn returning_sql(statement: &Statement) -> String {
    if statement.generated_columns().is_empty() {
        return statement.sql().to_string();
    }
    format!(
        "{} returning {}",
        statement.sql(),
        quote_all(statement.generated_columns())
    )
}

fn produce_rows(
    inner: &Mutex<rusqlite::Connection>,
    statement: &Statement,
    tx: &mpsc::Sender<Result<Row>>,
) -> Result<()> {
    let connection = inner.lock().map_err(|_| Error::LockPoisoned)?;
    let sql = returning_sql(statement);
    let mut prepared = connection.prepare_cached(&sql)?;
    let metadata = Arc::new(RowMetadata::new(
        prepared
            .columns()
            .iter()
            .map(|column| ColumnMetadata::new(column.name(), column.decl_type().map(str::to_string)))
            .collect(),
    ));
    let width = metadata.columns().len();
    for values in statement.bindings() {
        let mut rows = prepared.query(params_from_iter(values.iter()))?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            trace!(columns = width, "Streaming row");
            if tx.blocking_send(Ok(Row::new(metadata.clone(), values))).is_err() {
                debug!("Row consumer dropped, stopping");
                return Ok(());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Connection for SqliteConnection {
    fn bind_markers(&self) -> BindMarkers {
        BindMarkers::SQLITE
    }

    async fn execute(&self, statement: Statement) -> Result<Vec<u64>> {
        debug!(sql = %statement.sql(), "Executing statement");
        self.call(move |connection| {
            let mut prepared = connection.prepare_cached(statement.sql())?;
            let mut counts = Vec::new();
            for values in statement.bindings() {
                let count = prepared.execute(params_from_iter(values.iter()))?;
                counts.push(count as u64);
            }
            Ok(counts)
        })
        .await
    }

    fn query(&self, statement: Statement) -> RowStream {
        let inner = self.inner.clone();
        let fetch_size = self.fetch_size;
        stream::once(async move {
            debug!(sql = %statement.sql(), "Querying");
            let (tx, rx) = mpsc::channel(fetch_size);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = produce_rows(&inner, &statement, &tx) {
                    let _ = tx.blocking_send(Err(e));
                }
            });
            stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
        })
        .flatten()
        .boxed()
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.execute_batch("begin").await
    }

    async fn commit_transaction(&self) -> Result<()> {
        self.execute_batch("commit").await
    }

    async fn rollback_transaction(&self) -> Result<()> {
        self.execute_batch("rollback").await
    }
}

/// Fixed set of connections handed out round-robin
pub struct SqlitePool {
    connections: Vec<SqliteConnection>,
    next: AtomicUsize,
}

impl SqlitePool {
    /// Open the configured connections and create the schema
    pub async fn open(config: &SqliteConfig) -> Result<Self> {
        config.validate()?;
        let mut size = config.pool_size;
        if config.is_in_memory() && size > 1 {
            warn!(
                requested = size,
                "In-memory databases are private to one connection, using a single connection"
            );
            size = 1;
        }

        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let path = config.db_path.clone();
            let in_memory = config.is_in_memory();
            let connection = tokio::task::spawn_blocking(move || {
                if in_memory {
                    SqliteConnection::open_in_memory()
                } else {
                    SqliteConnection::open(path)
                }
            })
            .await??;
            connections.push(connection.with_fetch_size(config.fetch_size));
        }

        if let Some(first) = connections.first() {
            first.initialize_schema(&config.schema).await?;
        }
        info!(path = %config.db_path, connections = size, "Opened sqlite pool");

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }

    pub fn connections(&self) -> &[SqliteConnection] {
        &self.connections
    }
}

#[async_trait]
impl ConnectionProvider for SqlitePool {
    async fn connection(&self) -> Result<Arc<dyn Connection>> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len().max(1);
        match self.connections.get(index) {
            Some(connection) => Ok(Arc::new(connection.clone())),
            None => Err(Error::NoConnection),
        }
    }
}
