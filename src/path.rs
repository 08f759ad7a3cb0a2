use crate::expr::{ColumnRef, Expr, TableRef, TypedExpr};
use crate::projection::{EntityProjection, FromRow};

/// A table as seen by queries: its name, qualifier and declared columns.
///
/// Columns are registered through [`Table::column`], which returns the typed
/// handle used in predicates and projections. The alias must be chosen before
/// columns are registered, since each column captures it as its qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    schema: Option<String>,
    name: String,
    alias: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            schema: None,
            alias: name.clone(),
            name,
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Register a column and return its typed handle
    pub fn column<T>(&mut self, name: &str) -> TypedExpr<T> {
        self.columns.push(name.to_string());
        TypedExpr::column(&self.alias, name)
    }

    pub fn set_primary_key(&mut self, columns: &[&str]) {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// All declared columns, qualified, in declaration order
    pub fn columns(&self) -> Vec<Expr> {
        self.columns
            .iter()
            .map(|name| {
                Expr::Column(ColumnRef {
                    qualifier: Some(self.alias.clone()),
                    name: name.clone(),
                })
            })
            .collect()
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            name: self.name.clone(),
            alias: self.alias.clone(),
        }
    }

    pub fn expr(&self) -> Expr {
        Expr::Table(self.table_ref())
    }

    /// Projection of every declared column, materialized as `E`
    pub fn project<E: FromRow>(&self) -> EntityProjection<E> {
        EntityProjection::new(self.columns())
    }
}
