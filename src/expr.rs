//! Expression model for building queries.
//!
//! [`Expr`] is the untyped tree the serializer walks. [`TypedExpr`] wraps an
//! `Expr` with the Rust type its values materialize into, which is what
//! projections and tuples use to convert results.

use std::fmt;
use std::marker::PhantomData;

use crate::metadata::QueryMetadata;
use crate::value::Value;

/// Reference to a column, optionally qualified by its table alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

/// Reference to a table used as a query source or DML target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Goe,
    Lt,
    Loe,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Count,
    CountDistinct,
    CountAll,
    Sum,
    Avg,
    Min,
    Max,
    Coalesce,
    Lower,
    Upper,
    Exists,
}

impl Operator {
    pub(crate) fn is_arithmetic(self) -> bool {
        matches!(self, Operator::Add | Operator::Sub | Operator::Mul | Operator::Div)
    }
}

/// Untyped expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Table(TableRef),
    Constant(Value),
    /// Named parameter, resolved from the query's parameter values at bind time
    Param(String),
    Null,
    Operation { op: Operator, args: Vec<Expr> },
    /// Template text with `{n}` placeholders referring to `args`
    Template { template: String, args: Vec<Expr> },
    SubQuery(Box<QueryMetadata>),
    Union {
        all: bool,
        members: Vec<QueryMetadata>,
    },
    Alias { expr: Box<Expr>, alias: String },
    List(Vec<Expr>),
    Wildcard,
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn template(template: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Template {
            template: template.into(),
            args,
        }
    }

    pub fn operation(op: Operator, args: Vec<Expr>) -> Self {
        Expr::Operation { op, args }
    }

    fn binary(self, op: Operator, other: impl IntoExpr) -> Expr {
        Expr::Operation {
            op,
            args: vec![self, other.into_expr()],
        }
    }

    fn unary(self, op: Operator) -> Expr {
        Expr::Operation {
            op,
            args: vec![self],
        }
    }

    pub fn eq(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Eq, other)
    }

    pub fn ne(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Ne, other)
    }

    pub fn gt(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Gt, other)
    }

    pub fn goe(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Goe, other)
    }

    pub fn lt(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Lt, other)
    }

    pub fn loe(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Loe, other)
    }

    pub fn like(self, pattern: impl IntoExpr) -> Expr {
        self.binary(Operator::Like, pattern)
    }

    pub fn in_<I, E>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        let list = Expr::List(values.into_iter().map(IntoExpr::into_expr).collect());
        self.binary(Operator::In, list)
    }

    pub fn not_in<I, E>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        let list = Expr::List(values.into_iter().map(IntoExpr::into_expr).collect());
        self.binary(Operator::NotIn, list)
    }

    /// `self in (subquery)`
    pub fn in_subquery(self, subquery: impl IntoExpr) -> Expr {
        self.binary(Operator::In, subquery)
    }

    pub fn is_null(self) -> Expr {
        self.unary(Operator::IsNull)
    }

    pub fn is_not_null(self) -> Expr {
        self.unary(Operator::IsNotNull)
    }

    pub fn and(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::And, other)
    }

    pub fn or(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Or, other)
    }

    pub fn not(self) -> Expr {
        self.unary(Operator::Not)
    }

    pub fn add(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Add, other)
    }

    pub fn sub(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Sub, other)
    }

    pub fn mul(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Mul, other)
    }

    pub fn div(self, other: impl IntoExpr) -> Expr {
        self.binary(Operator::Div, other)
    }

    pub fn count(self) -> Expr {
        self.unary(Operator::Count)
    }

    pub fn count_distinct(self) -> Expr {
        self.unary(Operator::CountDistinct)
    }

    pub fn sum(self) -> Expr {
        self.unary(Operator::Sum)
    }

    pub fn avg(self) -> Expr {
        self.unary(Operator::Avg)
    }

    pub fn min(self) -> Expr {
        self.unary(Operator::Min)
    }

    pub fn max(self) -> Expr {
        self.unary(Operator::Max)
    }

    pub fn lower(self) -> Expr {
        self.unary(Operator::Lower)
    }

    pub fn upper(self) -> Expr {
        self.unary(Operator::Upper)
    }

    pub fn coalesce(self, fallback: impl IntoExpr) -> Expr {
        self.binary(Operator::Coalesce, fallback)
    }

    pub fn as_(self, alias: impl AliasName) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            alias: alias.alias_name(),
        }
    }

    pub fn asc(self) -> OrderSpecifier {
        OrderSpecifier::new(self, Order::Asc)
    }

    pub fn desc(self) -> OrderSpecifier {
        OrderSpecifier::new(self, Order::Desc)
    }

    /// Name this expression contributes to a result row, if any
    pub fn label(&self) -> Option<&str> {
        match self {
            Expr::Column(column) => Some(&column.name),
            Expr::Alias { alias, .. } => Some(alias),
            _ => None,
        }
    }
}

/// `count(*)`
pub fn count_all() -> TypedExpr<i64> {
    TypedExpr::from_expr(Expr::operation(Operator::CountAll, Vec::new()))
}

/// `exists (subquery)`
pub fn exists(subquery: impl IntoExpr) -> Expr {
    Expr::operation(Operator::Exists, vec![subquery.into_expr()])
}

/// Conversion into an expression operand.
///
/// Implemented for expressions and for plain values, which become constants.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl<T> IntoExpr for TypedExpr<T> {
    fn into_expr(self) -> Expr {
        self.expr
    }
}

impl<T> IntoExpr for &TypedExpr<T> {
    fn into_expr(self) -> Expr {
        self.expr.clone()
    }
}

macro_rules! constant_operand {
    ($($ty:ty),*) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Constant(Value::from(self))
                }
            }
        )*
    };
}

constant_operand!(i64, i32, u32, f64, bool, String, &str, Vec<u8>);

impl IntoExpr for &String {
    fn into_expr(self) -> Expr {
        Expr::Constant(Value::Text(self.clone()))
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        match self {
            Value::Null => Expr::Null,
            other => Expr::Constant(other),
        }
    }
}

impl<T: Into<Value>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        match self {
            Some(value) => Expr::Constant(value.into()),
            None => Expr::Null,
        }
    }
}

/// Anything that can name an alias: a string or an unqualified path
pub trait AliasName {
    fn alias_name(self) -> String;
}

impl AliasName for &str {
    fn alias_name(self) -> String {
        self.to_string()
    }
}

impl AliasName for String {
    fn alias_name(self) -> String {
        self
    }
}

/// Only paths name an alias; any other expression yields an empty name,
/// which fails when the aliased expression is rendered.
impl<T> AliasName for &TypedExpr<T> {
    fn alias_name(self) -> String {
        match &self.expr {
            Expr::Column(column) => column.name.clone(),
            Expr::Alias { alias, .. } => alias.clone(),
            _ => String::new(),
        }
    }
}

/// An expression whose values materialize into `T`
pub struct TypedExpr<T> {
    expr: Expr,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedExpr<T> {
    fn clone(&self) -> Self {
        Self::from_expr(self.expr.clone())
    }
}

impl<T> fmt::Debug for TypedExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)
    }
}

impl<T> PartialEq for TypedExpr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl<T> From<TypedExpr<T>> for Expr {
    fn from(typed: TypedExpr<T>) -> Self {
        typed.expr
    }
}

macro_rules! delegate {
    ($($name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            pub fn $name(&self, $($arg: $ty),*) -> $ret {
                self.expr.clone().$name($($arg),*)
            }
        )*
    };
}

impl<T> TypedExpr<T> {
    pub fn from_expr(expr: Expr) -> Self {
        Self {
            expr,
            _type: PhantomData,
        }
    }

    /// Column of the table aliased `qualifier`
    pub fn column(qualifier: &str, name: &str) -> Self {
        Self::from_expr(Expr::Column(ColumnRef {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
        }))
    }

    /// Unqualified path, typically the target of an `as_` alias
    pub fn path(name: &str) -> Self {
        Self::from_expr(Expr::Column(ColumnRef {
            qualifier: None,
            name: name.to_string(),
        }))
    }

    /// Named parameter bound later with `set_param`
    pub fn param(name: &str) -> Self {
        Self::from_expr(Expr::Param(name.to_string()))
    }

    pub fn null() -> Self {
        Self::from_expr(Expr::Null)
    }

    pub fn template(template: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::from_expr(Expr::template(template, args))
    }

    pub fn expr(&self) -> Expr {
        self.expr.clone()
    }

    pub fn as_expr(&self) -> &Expr {
        &self.expr
    }

    pub fn column_ref(&self) -> Option<&ColumnRef> {
        match &self.expr {
            Expr::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn optional(&self) -> OptionalExpr<T> {
        OptionalExpr {
            wrapped: self.clone(),
        }
    }

    pub fn add(&self, other: impl IntoExpr) -> TypedExpr<T> {
        TypedExpr::from_expr(self.expr.clone().add(other))
    }

    pub fn sub(&self, other: impl IntoExpr) -> TypedExpr<T> {
        TypedExpr::from_expr(self.expr.clone().sub(other))
    }

    pub fn mul(&self, other: impl IntoExpr) -> TypedExpr<T> {
        TypedExpr::from_expr(self.expr.clone().mul(other))
    }

    pub fn div(&self, other: impl IntoExpr) -> TypedExpr<T> {
        TypedExpr::from_expr(self.expr.clone().div(other))
    }

    pub fn as_(&self, alias: impl AliasName) -> TypedExpr<T> {
        TypedExpr::from_expr(self.expr.clone().as_(alias))
    }

    pub fn count(&self) -> TypedExpr<i64> {
        TypedExpr::from_expr(self.expr.clone().count())
    }

    pub fn max(&self) -> TypedExpr<Option<T>> {
        TypedExpr::from_expr(self.expr.clone().max())
    }

    pub fn min(&self) -> TypedExpr<Option<T>> {
        TypedExpr::from_expr(self.expr.clone().min())
    }

    delegate! {
        eq(other: impl IntoExpr) -> Expr;
        ne(other: impl IntoExpr) -> Expr;
        gt(other: impl IntoExpr) -> Expr;
        goe(other: impl IntoExpr) -> Expr;
        lt(other: impl IntoExpr) -> Expr;
        loe(other: impl IntoExpr) -> Expr;
        like(pattern: impl IntoExpr) -> Expr;
        is_null() -> Expr;
        is_not_null() -> Expr;
        asc() -> OrderSpecifier;
        desc() -> OrderSpecifier;
    }

    pub fn in_<I, E>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        self.expr.clone().in_(values)
    }

    pub fn not_in<I, E>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        self.expr.clone().not_in(values)
    }

    pub fn in_subquery(&self, subquery: impl IntoExpr) -> Expr {
        self.expr.clone().in_subquery(subquery)
    }
}

/// Typed constant expression
pub fn constant<T: Into<Value>>(value: T) -> TypedExpr<T> {
    TypedExpr::from_expr(Expr::Constant(value.into()))
}

/// Projection wrapper that tolerates SQL NULL, yielding `Option<T>`
pub struct OptionalExpr<T> {
    pub(crate) wrapped: TypedExpr<T>,
}

impl<T> OptionalExpr<T> {
    pub fn of(expr: TypedExpr<T>) -> Self {
        Self { wrapped: expr }
    }
}

impl<T> Clone for OptionalExpr<T> {
    fn clone(&self) -> Self {
        Self {
            wrapped: self.wrapped.clone(),
        }
    }
}

impl<T> fmt::Debug for OptionalExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Optional").field(&self.wrapped).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullHandling {
    Default,
    NullsFirst,
    NullsLast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpecifier {
    pub target: Expr,
    pub order: Order,
    pub null_handling: NullHandling,
}

impl OrderSpecifier {
    pub fn new(target: Expr, order: Order) -> Self {
        Self {
            target,
            order,
            null_handling: NullHandling::Default,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.null_handling = NullHandling::NullsFirst;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.null_handling = NullHandling::NullsLast;
        self
    }
}
