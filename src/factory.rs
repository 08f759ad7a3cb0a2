use std::sync::Arc;

use crate::configuration::Configuration;
use crate::dml::{DeleteClause, InsertClause, UpdateClause};
use crate::expr::{constant, Expr, TypedExpr};
use crate::path::Table;
use crate::projection::{EntityProjection, FromRow, Projection, TupleProjection, Wildcard};
use crate::query::Query;
use crate::spi::ConnectionProvider;
use crate::union::Union;

/// Entry point creating queries and clauses bound to one configuration and
/// connection provider
#[derive(Clone)]
pub struct QueryFactory {
    configuration: Configuration,
    provider: Option<Arc<dyn ConnectionProvider>>,
}

impl QueryFactory {
    pub fn new(configuration: Configuration, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            configuration,
            provider: Some(provider),
        }
    }

    /// Factory that can render SQL but not execute it
    pub fn detached(configuration: Configuration) -> Self {
        Self {
            configuration,
            provider: None,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn query(&self) -> Query<Wildcard> {
        Query::new(self.configuration.clone(), self.provider.clone())
    }

    pub fn from(&self, table: &Table) -> Query<Wildcard> {
        self.query().from(table)
    }

    pub fn select<P: Projection>(&self, projection: P) -> Query<P> {
        self.query().select(projection)
    }

    pub fn select_tuple(&self, exprs: Vec<Expr>) -> Query<TupleProjection> {
        self.query().select_tuple(exprs)
    }

    pub fn select_distinct<P: Projection>(&self, projection: P) -> Query<P> {
        self.select(projection).distinct()
    }

    pub fn select_distinct_tuple(&self, exprs: Vec<Expr>) -> Query<TupleProjection> {
        self.select_tuple(exprs).distinct()
    }

    /// `select 0`
    pub fn select_zero(&self) -> Query<TypedExpr<i64>> {
        self.select(constant(0i64))
    }

    /// `select 1`
    pub fn select_one(&self) -> Query<TypedExpr<i64>> {
        self.select(constant(1i64))
    }

    /// Every column of `table`, materialized as `E`
    pub fn select_from<E: FromRow>(&self, table: &Table) -> Query<EntityProjection<E>> {
        self.query().select_entity(table).from(table)
    }

    /// `union` of queries; `None` without members
    pub fn union<P: Projection>(&self, members: Vec<Query<P>>) -> Option<Union<P>> {
        Union::new(members, false)
    }

    pub fn union_all<P: Projection>(&self, members: Vec<Query<P>>) -> Option<Union<P>> {
        Union::new(members, true)
    }

    pub fn insert(&self, table: &Table) -> InsertClause {
        InsertClause::new(table, self.configuration.clone(), self.provider.clone())
    }

    pub fn update(&self, table: &Table) -> UpdateClause {
        UpdateClause::new(table, self.configuration.clone(), self.provider.clone())
    }

    pub fn delete(&self, table: &Table) -> DeleteClause {
        DeleteClause::new(table, self.configuration.clone(), self.provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::PostgresTemplates;

    #[test]
    fn select_one_has_no_source() {
        let factory = QueryFactory::detached(Configuration::new(PostgresTemplates));
        assert_eq!(factory.select_one().to_sql().unwrap().sql, "select ?");
        assert_eq!(
            factory
                .select_zero()
                .with_use_literals(true)
                .to_sql()
                .unwrap()
                .sql,
            "select 0"
        );
    }

    #[test]
    fn select_distinct_sets_flag() {
        let mut user = Table::new("User");
        let name = user.column::<String>("PersonName");
        let factory = QueryFactory::detached(Configuration::new(PostgresTemplates));
        assert_eq!(
            factory.select_distinct(name).from(&user).to_sql().unwrap().sql,
            "select distinct \"User\".\"PersonName\" from \"User\""
        );
    }
}
