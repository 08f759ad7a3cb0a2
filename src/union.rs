use futures::stream::{BoxStream, TryStreamExt};

use crate::configuration::Configuration;
use crate::error::Result;
use crate::execute::{self, Provider};
use crate::expr::{AliasName, ColumnRef, Expr, IntoExpr, OrderSpecifier};
use crate::metadata::QueryMetadata;
use crate::projection::Projection;
use crate::query::{single_or_none, Query};
use crate::serializer::{SerializedSql, SqlSerializer};

/// `union` / `union all` over queries sharing one projection
#[derive(Clone)]
pub struct Union<P> {
    members: Vec<QueryMetadata>,
    all: bool,
    outer: QueryMetadata,
    configuration: Configuration,
    provider: Provider,
    use_literals: bool,
    projection: P,
}

impl<P: Projection> Union<P> {
    /// Union of `members`, executed through the first member's connection.
    ///
    /// Returns `None` when `members` is empty.
    pub fn new(members: Vec<Query<P>>, all: bool) -> Option<Self> {
        let first = members.first()?;
        let configuration = first.configuration.clone();
        let provider = first.provider.clone();
        let use_literals = first.use_literals;
        let projection = first.projection.clone();
        Some(Self {
            members: members.iter().map(Query::to_metadata).collect(),
            all,
            outer: QueryMetadata::default(),
            configuration,
            provider,
            use_literals,
            projection,
        })
    }

    pub fn group_by(mut self, expr: impl IntoExpr) -> Self {
        self.outer.group_by.push(expr.into_expr());
        self
    }

    pub fn having(mut self, predicate: impl IntoExpr) -> Self {
        self.outer.add_having(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderSpecifier) -> Self {
        self.outer.order_by.push(order);
        self
    }

    pub fn to_sql(&self) -> Result<SerializedSql> {
        let mut outer = self.outer.clone();
        outer.projection = self.projection.exprs().into_iter().map(outer_column).collect();
        SqlSerializer::new(&self.configuration)
            .with_use_literals(self.use_literals)
            .serialize_union(&self.members, self.all, &outer)
    }

    pub fn fetch(&self) -> BoxStream<'static, Result<P::Output>> {
        execute::fetch(self.provider.clone(), self.projection.clone(), self.to_sql())
    }

    pub async fn fetch_all(&self) -> Result<Vec<P::Output>> {
        self.fetch().try_collect().await
    }

    pub async fn fetch_first(&self) -> Result<Option<P::Output>> {
        let mut limited = self.clone();
        limited.outer.modifiers.limit = Some(1);
        limited.fetch_one().await
    }

    pub async fn fetch_one(&self) -> Result<Option<P::Output>> {
        single_or_none(self.fetch()).await
    }

    /// The union as an expression, e.g. a source of an outer query
    pub fn expr(&self) -> Expr {
        Expr::Union {
            all: self.all,
            members: self.members.clone(),
        }
    }

    pub fn as_(&self, alias: impl AliasName) -> Expr {
        self.expr().as_(alias)
    }
}

/// Member projections seen from outside the union: by label, unqualified
fn outer_column(expr: Expr) -> Expr {
    match expr.label().map(str::to_string) {
        Some(name) => Expr::Column(ColumnRef {
            qualifier: None,
            name,
        }),
        None => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::TypedExpr;
    use crate::path::Table;
    use crate::templates::{PostgresTemplates, SqliteTemplates};

    #[test]
    fn grouped_union_is_wrapped() {
        let mut user = Table::new("User");
        let name = user.column::<String>("PersonName");
        let configuration = Configuration::new(PostgresTemplates);
        let first = Query::new(configuration.clone(), None).select(name.clone()).from(&user);
        let second = first.clone();
        let grouped = TypedExpr::<String>::path("PersonName");
        let union = Union::new(vec![first, second], true)
            .unwrap()
            .group_by(&grouped);
        assert_eq!(
            union.to_sql().unwrap().sql,
            "select \"PersonName\" from ((select \"User\".\"PersonName\" from \"User\") \
             union all (select \"User\".\"PersonName\" from \"User\")) as \"union\" \
             group by \"PersonName\""
        );
    }

    #[test]
    fn union_as_source_of_outer_query() {
        let mut user = Table::new("User");
        let id = user.column::<i64>("Id");
        let configuration = Configuration::new(SqliteTemplates);
        let first = Query::new(configuration.clone(), None).select(id.clone()).from(&user);
        let union = Union::new(vec![first.clone(), first], false).unwrap();
        let outer = Query::new(configuration, None).from_expr(union.as_("u"));
        assert_eq!(
            outer.to_sql().unwrap().sql,
            "select * from (select \"User\".\"Id\" from \"User\" union select \"User\".\"Id\" from \"User\") as \"u\""
        );
    }

    #[test]
    fn empty_union_is_none() {
        assert!(Union::<TypedExpr<i64>>::new(Vec::new(), false).is_none());
    }
}
