//! Select queries.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::execute::{self, Provider};
use crate::expr::{AliasName, Expr, IntoExpr, OrderSpecifier, TypedExpr};
use crate::metadata::{JoinType, Position, QueryFlag, QueryMetadata};
use crate::path::Table;
use crate::projection::{EntityProjection, FromRow, Projection, TupleProjection, Wildcard};
use crate::serializer::{SerializedSql, SqlSerializer};
use crate::spi::ConnectionProvider;
use crate::value::Value;

/// A select query projecting rows through `P`.
///
/// Builder methods consume and return the query. Nothing touches the
/// database until one of the `fetch` methods is awaited or polled.
#[derive(Clone)]
pub struct Query<P = Wildcard> {
    pub(crate) metadata: QueryMetadata,
    pub(crate) configuration: Configuration,
    pub(crate) provider: Provider,
    pub(crate) use_literals: bool,
    pub(crate) projection: P,
}

impl Query<Wildcard> {
    pub fn new(configuration: Configuration, provider: Option<Arc<dyn ConnectionProvider>>) -> Self {
        Self {
            metadata: QueryMetadata::default(),
            use_literals: configuration.use_literals(),
            configuration,
            provider,
            projection: Wildcard,
        }
    }
}

impl<P: Projection> Query<P> {
    /// Replace the projection
    pub fn select<Q: Projection>(self, projection: Q) -> Query<Q> {
        Query {
            metadata: self.metadata,
            configuration: self.configuration,
            provider: self.provider,
            use_literals: self.use_literals,
            projection,
        }
    }

    pub fn select_tuple(self, exprs: Vec<Expr>) -> Query<TupleProjection> {
        self.select(TupleProjection::new(exprs))
    }

    /// Every declared column of `table`, materialized as `E`
    pub fn select_entity<E: FromRow>(self, table: &Table) -> Query<EntityProjection<E>> {
        self.select(table.project())
    }

    pub fn from(mut self, table: &Table) -> Self {
        self.metadata.add_join(JoinType::Default, table.expr());
        self
    }

    /// Add an arbitrary source, such as an aliased subquery
    pub fn from_expr(mut self, source: impl IntoExpr) -> Self {
        self.metadata.add_join(JoinType::Default, source.into_expr());
        self
    }

    pub fn inner_join(mut self, table: &Table) -> Self {
        self.metadata.add_join(JoinType::Inner, table.expr());
        self
    }

    pub fn join(self, table: &Table) -> Self {
        self.inner_join(table)
    }

    pub fn left_join(mut self, table: &Table) -> Self {
        self.metadata.add_join(JoinType::Left, table.expr());
        self
    }

    pub fn right_join(mut self, table: &Table) -> Self {
        self.metadata.add_join(JoinType::Right, table.expr());
        self
    }

    pub fn full_join(mut self, table: &Table) -> Self {
        self.metadata.add_join(JoinType::Full, table.expr());
        self
    }

    pub fn join_expr(mut self, join_type: JoinType, target: impl IntoExpr) -> Self {
        self.metadata.add_join(join_type, target.into_expr());
        self
    }

    /// Condition of the most recent join
    pub fn on(mut self, condition: impl IntoExpr) -> Self {
        self.metadata.add_join_condition(condition);
        self
    }

    pub fn where_(mut self, predicate: impl IntoExpr) -> Self {
        self.metadata.add_where(predicate);
        self
    }

    pub fn group_by(mut self, expr: impl IntoExpr) -> Self {
        self.metadata.group_by.push(expr.into_expr());
        self
    }

    pub fn having(mut self, predicate: impl IntoExpr) -> Self {
        self.metadata.add_having(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderSpecifier) -> Self {
        self.metadata.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.metadata.modifiers.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.metadata.modifiers.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.metadata.distinct = true;
        self
    }

    pub fn add_flag(mut self, flag: QueryFlag) -> Self {
        self.metadata.add_flag(flag);
        self
    }

    pub fn add_flag_text(self, position: Position, text: impl Into<String>) -> Self {
        self.add_flag(QueryFlag::text(position, text))
    }

    pub fn set_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.set_param(name, value);
        self
    }

    /// Render constants inline instead of binding them
    pub fn with_use_literals(mut self, use_literals: bool) -> Self {
        self.use_literals = use_literals;
        self
    }

    /// Lock selected rows for update; fails on dialects without row locks
    pub fn for_update(self) -> Result<Self> {
        match self.configuration.templates().for_update_flag() {
            Some(flag) => Ok(self.add_flag(flag)),
            None => Err(Error::Unsupported(
                "Using forUpdate() is not supported".to_string(),
            )),
        }
    }

    /// Lock selected rows in share mode, optionally falling back to
    /// `for update` where the dialect has no shared lock
    pub fn for_share(self, fallback_to_for_update: bool) -> Result<Self> {
        match self.configuration.templates().for_share_flag() {
            Some(flag) => Ok(self.add_flag(flag)),
            None if fallback_to_for_update => self.for_update(),
            None => Err(Error::Unsupported(
                "Using forShare() is not supported".to_string(),
            )),
        }
    }

    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Metadata with the projection filled in, as rendered
    pub fn to_metadata(&self) -> QueryMetadata {
        let mut metadata = self.metadata.clone();
        metadata.projection = self.projection.exprs();
        metadata
    }

    pub fn to_sql(&self) -> Result<SerializedSql> {
        SqlSerializer::new(&self.configuration)
            .with_use_literals(self.use_literals)
            .serialize_query(&self.to_metadata())
    }

    /// This query as a subquery expression
    pub fn subquery(&self) -> Expr {
        Expr::SubQuery(Box::new(self.to_metadata()))
    }

    /// This query as an aliased subquery, usable as a source or a projection
    pub fn as_(&self, alias: impl AliasName) -> Expr {
        self.subquery().as_(alias)
    }

    /// Scalar subquery expression typed by this query's output
    pub fn typed_subquery(&self) -> TypedExpr<P::Output> {
        TypedExpr::from_expr(self.subquery())
    }

    pub fn fetch(&self) -> BoxStream<'static, Result<P::Output>> {
        execute::fetch(self.provider.clone(), self.projection.clone(), self.to_sql())
    }

    pub async fn fetch_all(&self) -> Result<Vec<P::Output>> {
        self.fetch().try_collect().await
    }

    /// First row, rendered with `limit 1`
    pub async fn fetch_first(&self) -> Result<Option<P::Output>> {
        self.clone().limit(1).fetch_one().await
    }

    /// The single row of the result, if any; more than one row is an error
    pub async fn fetch_one(&self) -> Result<Option<P::Output>> {
        single_or_none(self.fetch()).await
    }
}

pub(crate) async fn single_or_none<T>(mut rows: BoxStream<'static, Result<T>>) -> Result<Option<T>> {
    let first = match rows.next().await {
        Some(row) => row?,
        None => return Ok(None),
    };
    match rows.next().await {
        Some(Ok(_)) => Err(Error::NonUniqueResult),
        Some(Err(e)) => Err(e),
        None => Ok(Some(first)),
    }
}

impl<P: Projection> IntoExpr for Query<P> {
    fn into_expr(self) -> Expr {
        self.subquery()
    }
}

impl<P: Projection> IntoExpr for &Query<P> {
    fn into_expr(self) -> Expr {
        self.subquery()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::count_all;
    use crate::templates::{PostgresTemplates, SqliteTemplates};

    fn user() -> (Table, TypedExpr<i64>, TypedExpr<String>) {
        let mut table = Table::new("User");
        let id = table.column("Id");
        let name = table.column("PersonName");
        (table, id, name)
    }

    #[test]
    fn builds_join_with_condition() {
        let (user, id, name) = user();
        let mut locale = Table::new("Locale");
        let locale_id = locale.column::<i64>("Id");
        let query = Query::new(Configuration::new(PostgresTemplates), None)
            .select(name.clone())
            .from(&user)
            .left_join(&locale)
            .on(locale_id.eq(&id))
            .where_(id.gt(1i64));
        assert_eq!(
            query.to_sql().unwrap().sql,
            "select \"User\".\"PersonName\" from \"User\" left join \"Locale\" \
             on \"Locale\".\"Id\" = \"User\".\"Id\" where \"User\".\"Id\" > ?"
        );
    }

    #[test]
    fn grouped_aggregate() {
        let (user, _, name) = user();
        let query = Query::new(Configuration::new(SqliteTemplates), None)
            .select_tuple(vec![name.expr(), count_all().expr()])
            .from(&user)
            .group_by(&name)
            .having(count_all().gt(1i64));
        assert_eq!(
            query.to_sql().unwrap().sql,
            "select \"User\".\"PersonName\", count(*) from \"User\" \
             group by \"User\".\"PersonName\" having count(*) > ?"
        );
    }

    #[test]
    fn lock_flags_follow_dialect() {
        let (user, id, _) = user();
        let postgres = Query::new(Configuration::new(PostgresTemplates), None)
            .select(id.clone())
            .from(&user);
        assert!(postgres
            .clone()
            .for_share(false)
            .unwrap()
            .to_sql()
            .unwrap()
            .sql
            .ends_with(" for share"));

        let sqlite = Query::new(Configuration::new(SqliteTemplates), None)
            .select(id)
            .from(&user);
        let err = sqlite.clone().for_share(false).err().unwrap();
        assert_eq!(err.to_string(), "Using forShare() is not supported");
        assert!(matches!(sqlite.for_share(true), Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn fetch_without_connection_fails() {
        let (user, id, _) = user();
        let query = Query::new(Configuration::new(SqliteTemplates), None)
            .select(id)
            .from(&user);
        assert!(matches!(query.fetch_all().await, Err(Error::NoConnection)));
    }
}
