//! Result materialization: how a projection maps database rows back into
//! Rust values.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{Expr, OptionalExpr, TypedExpr};
use crate::spi::Row;
use crate::value::{FromValue, Value};

/// A select list together with the conversion of each row it yields
pub trait Projection: Clone + Send + Sync + 'static {
    type Output: Send + 'static;

    fn exprs(&self) -> Vec<Expr>;

    fn map_row(&self, row: Row) -> Result<Self::Output>;
}

/// Structs built from a row by column name
pub trait FromRow: Sized + Send + 'static {
    fn from_row(row: &Row) -> Result<Self>;
}

impl<T> Projection for TypedExpr<T>
where
    T: FromValue + Send + 'static,
{
    type Output = T;

    fn exprs(&self) -> Vec<Expr> {
        vec![self.expr()]
    }

    fn map_row(&self, mut row: Row) -> Result<T> {
        T::from_value(row.take(0)?)
    }
}

impl<T> Projection for OptionalExpr<T>
where
    T: FromValue + Send + 'static,
{
    type Output = Option<T>;

    fn exprs(&self) -> Vec<Expr> {
        vec![self.wrapped.expr()]
    }

    fn map_row(&self, mut row: Row) -> Result<Option<T>> {
        match row.take(0)? {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

impl Projection for Expr {
    type Output = Value;

    fn exprs(&self) -> Vec<Expr> {
        vec![self.clone()]
    }

    fn map_row(&self, mut row: Row) -> Result<Value> {
        row.take(0)
    }
}

/// `select *`, yielding every column of the row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wildcard;

impl Projection for Wildcard {
    type Output = Vec<Value>;

    fn exprs(&self) -> Vec<Expr> {
        vec![Expr::Wildcard]
    }

    fn map_row(&self, row: Row) -> Result<Vec<Value>> {
        Ok(row.into_values())
    }
}

/// Several expressions materialized into a [`Tuple`]
#[derive(Debug, Clone, PartialEq)]
pub struct TupleProjection {
    exprs: Arc<[Expr]>,
}

impl TupleProjection {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Self {
            exprs: exprs.into(),
        }
    }
}

impl Projection for TupleProjection {
    type Output = Tuple;

    fn exprs(&self) -> Vec<Expr> {
        self.exprs.to_vec()
    }

    fn map_row(&self, row: Row) -> Result<Tuple> {
        Ok(Tuple {
            exprs: self.exprs.clone(),
            values: row.into_values(),
        })
    }
}

/// One row of a tuple projection, addressed by the projected expressions
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    exprs: Arc<[Expr]>,
    values: Vec<Value>,
}

impl Tuple {
    /// Value of `expr`, matched by expression or, for an unqualified path,
    /// by alias name
    pub fn get<T: FromValue>(&self, expr: &TypedExpr<T>) -> Result<T> {
        let index = self
            .index_of(expr.as_expr())
            .ok_or_else(|| Error::NotInProjection(format!("{:?}", expr.as_expr())))?;
        self.get_index(index)
    }

    pub fn get_index<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self
            .values
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NoSuchColumn(index.to_string()))?;
        T::from_value(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn index_of(&self, expr: &Expr) -> Option<usize> {
        if let Some(index) = self.exprs.iter().position(|e| e == expr) {
            return Some(index);
        }
        match expr {
            Expr::Column(column) if column.qualifier.is_none() => self
                .exprs
                .iter()
                .position(|e| e.label() == Some(column.name.as_str())),
            _ => None,
        }
    }
}

/// Every declared column of a table, materialized through [`FromRow`]
pub struct EntityProjection<E> {
    columns: Arc<[Expr]>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> EntityProjection<E> {
    pub fn new(columns: Vec<Expr>) -> Self {
        Self {
            columns: columns.into(),
            _entity: PhantomData,
        }
    }
}

impl<E> Clone for EntityProjection<E> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: FromRow> Projection for EntityProjection<E> {
    type Output = E;

    fn exprs(&self) -> Vec<Expr> {
        self.columns.to_vec()
    }

    fn map_row(&self, row: Row) -> Result<E> {
        E::from_row(&row)
    }
}
