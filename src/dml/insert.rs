use futures::stream::{BoxStream, TryStreamExt};

use crate::configuration::Configuration;
use crate::dml::clause::{column_of, ClauseBase};
use crate::error::{Error, Result};
use crate::execute::{self, Provider};
use crate::expr::{ColumnRef, Expr, IntoExpr, TypedExpr};
use crate::metadata::{Position, QueryFlag, QueryMetadata};
use crate::path::Table;
use crate::projection::Projection;
use crate::query::Query;
use crate::serializer::SerializedSql;
use crate::value::FromValue;

#[derive(Debug, Clone, PartialEq)]
struct InsertBatch {
    columns: Vec<ColumnRef>,
    values: Vec<Expr>,
    subquery: Option<QueryMetadata>,
}

/// `insert into` clause
#[derive(Clone)]
pub struct InsertClause {
    base: ClauseBase,
    columns: Vec<ColumnRef>,
    values: Vec<Expr>,
    subquery: Option<QueryMetadata>,
    batches: Vec<InsertBatch>,
    batch_to_bulk: bool,
}

impl InsertClause {
    pub(crate) fn new(entity: &Table, configuration: Configuration, provider: Provider) -> Self {
        Self {
            base: ClauseBase::new(entity, configuration, provider),
            columns: Vec::new(),
            values: Vec::new(),
            subquery: None,
            batches: Vec::new(),
            batch_to_bulk: false,
        }
    }

    pub fn set<T>(mut self, path: &TypedExpr<T>, value: impl IntoExpr) -> Self {
        if let Some(column) = self.base.target(path.as_expr()) {
            self.columns.push(column);
            self.values.push(value.into_expr());
        }
        self
    }

    pub fn set_null<T>(mut self, path: &TypedExpr<T>) -> Self {
        if let Some(column) = self.base.target(path.as_expr()) {
            self.columns.push(column);
            self.values.push(Expr::Null);
        }
        self
    }

    pub fn columns(mut self, columns: Vec<Expr>) -> Self {
        for column in &columns {
            if let Some(column) = self.base.target(column) {
                self.columns.push(column);
            }
        }
        self
    }

    pub fn values<I, E>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        self.values
            .extend(values.into_iter().map(IntoExpr::into_expr));
        self
    }

    /// Insert the rows of `subquery`; its parameter values are copied over
    pub fn select<P: Projection>(mut self, subquery: &Query<P>) -> Self {
        let metadata = subquery.to_metadata();
        for (name, value) in &metadata.params {
            self.base.params.insert(name.clone(), value.clone());
        }
        self.subquery = Some(metadata);
        self
    }

    /// Store the current columns and values as a batch item.
    ///
    /// Every item must list the same columns in the same order.
    pub fn add_batch(mut self) -> Self {
        self.batches.push(InsertBatch {
            columns: std::mem::take(&mut self.columns),
            values: std::mem::take(&mut self.values),
            subquery: self.subquery.take(),
        });
        self
    }

    /// Fold batches into one multi-row insert where the dialect allows it
    pub fn with_batch_to_bulk(mut self) -> Self {
        self.batch_to_bulk = self.base.configuration.templates().is_batch_to_bulk_supported();
        self
    }

    pub fn clear(&mut self) {
        self.base.clear_targets();
        self.batches.clear();
        self.columns.clear();
        self.values.clear();
        self.subquery = None;
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.batches.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn add_flag(mut self, position: Position, flag: Expr) -> Self {
        self.base.flags.push(QueryFlag::new(position, flag));
        self
    }

    pub fn add_flag_text(mut self, position: Position, flag: impl Into<String>) -> Self {
        self.base.flags.push(QueryFlag::text(position, flag));
        self
    }

    pub fn with_use_literals(mut self, use_literals: bool) -> Self {
        self.base.use_literals = use_literals;
        self
    }

    fn is_bulk(&self) -> bool {
        self.batch_to_bulk && self.batches.iter().all(|batch| batch.subquery.is_none())
    }

    /// Rendered statements: one per batch item, or a single one otherwise
    pub fn to_sql(&self) -> Result<Vec<SerializedSql>> {
        self.base.check_targets()?;
        let metadata = self.base.metadata();
        let entity = &self.base.entity;
        let first = match self.batches.first() {
            Some(first) => first,
            None => {
                if self.values.is_empty() && self.subquery.is_none() {
                    return Err(Error::EmptyClause("insert without values"));
                }
                let rendered = self.base.serializer().serialize_insert(
                    &metadata,
                    entity,
                    &self.columns,
                    &[self.values.clone()],
                    self.subquery.as_ref(),
                )?;
                return Ok(vec![rendered]);
            }
        };
        self.base.check_batch_literals(self.batches.len(), "inserts")?;

        if self.is_bulk() {
            let mut rows = Vec::with_capacity(self.batches.len());
            for (index, batch) in self.batches.iter().enumerate() {
                if batch.columns != first.columns {
                    return Err(Error::BatchMismatch { index });
                }
                rows.push(batch.values.clone());
            }
            let rendered =
                self.base
                    .serializer()
                    .serialize_insert(&metadata, entity, &first.columns, &rows, None)?;
            return Ok(vec![rendered]);
        }

        self.batches
            .iter()
            .map(|batch| {
                self.base.serializer().serialize_insert(
                    &metadata,
                    entity,
                    &batch.columns,
                    &[batch.values.clone()],
                    batch.subquery.as_ref(),
                )
            })
            .collect()
    }

    /// Number of inserted rows, summed over batch items
    pub async fn execute(&self) -> Result<u64> {
        execute::execute_batch(&self.base.provider, self.to_sql()?).await
    }

    /// Value generated for `path` in the first inserted row
    pub async fn execute_with_key<T>(&self, path: &TypedExpr<T>) -> Result<Option<T>>
    where
        T: FromValue + Send + 'static,
    {
        let keys: Vec<T> = self.execute_with_keys(path).try_collect().await?;
        Ok(keys.into_iter().next())
    }

    /// Values generated for `path`, one per inserted row
    pub fn execute_with_keys<T>(&self, path: &TypedExpr<T>) -> BoxStream<'static, Result<T>>
    where
        T: FromValue + Send + 'static,
    {
        execute::generated_keys(
            self.base.provider.clone(),
            self.to_sql(),
            column_of(path.as_expr()).map(|column| column.name),
        )
    }

    /// Value generated for the table's primary key in the first inserted row
    pub async fn execute_with_primary_key<T>(&self) -> Result<Option<T>>
    where
        T: FromValue + Send + 'static,
    {
        let keys: Vec<T> = self.execute_with_primary_keys().try_collect().await?;
        Ok(keys.into_iter().next())
    }

    /// Values generated for the table's primary key, one per inserted row.
    /// The table must declare a single-column primary key.
    pub fn execute_with_primary_keys<T>(&self) -> BoxStream<'static, Result<T>>
    where
        T: FromValue + Send + 'static,
    {
        execute::generated_keys(
            self.base.provider.clone(),
            self.to_sql(),
            self.base.key_column(),
        )
    }
}
