//! PostgreSQL specific query extensions.

use std::ops::Deref;
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::factory::QueryFactory;
use crate::metadata::{Position, QueryFlag};
use crate::path::Table;
use crate::projection::Projection;
use crate::query::Query;
use crate::spi::ConnectionProvider;
use crate::templates::PostgresTemplates;

pub trait PostgresQueryExt: Sized {
    /// Fail instead of waiting when a selected row is locked
    fn no_wait(self) -> Result<Self>;

    /// Restrict `for update` / `for share` to `tables`
    fn of(self, tables: &[&Table]) -> Self;

    /// `select distinct on (exprs)`
    fn distinct_on(self, exprs: Vec<Expr>) -> Self;
}

impl<P: Projection> PostgresQueryExt for Query<P> {
    fn no_wait(self) -> Result<Self> {
        match self.configuration().templates().no_wait_flag() {
            Some(flag) => Ok(self.add_flag(flag)),
            None => Err(Error::Unsupported(
                "Using noWait() is not supported".to_string(),
            )),
        }
    }

    fn of(self, tables: &[&Table]) -> Self {
        let templates = self.configuration().templates();
        let names: Vec<String> = tables
            .iter()
            .map(|table| templates.quote_identifier(table.name()))
            .collect();
        let flag = format!(" of {}", names.join(", "));
        self.add_flag_text(Position::End, flag)
    }

    fn distinct_on(self, exprs: Vec<Expr>) -> Self {
        self.add_flag(QueryFlag::new(
            Position::AfterSelect,
            Expr::template("distinct on({0}) ", vec![Expr::List(exprs)]),
        ))
    }
}

/// [`QueryFactory`] rendering PostgreSQL
#[derive(Clone)]
pub struct PostgresQueryFactory(QueryFactory);

impl PostgresQueryFactory {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self(QueryFactory::new(
            Configuration::new(PostgresTemplates),
            provider,
        ))
    }

    pub fn with_configuration(configuration: Configuration, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self(QueryFactory::new(configuration, provider))
    }

    pub fn detached() -> Self {
        Self(QueryFactory::detached(Configuration::new(PostgresTemplates)))
    }
}

impl Deref for PostgresQueryFactory {
    type Target = QueryFactory;

    fn deref(&self) -> &QueryFactory {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::TypedExpr;

    fn user() -> (Table, TypedExpr<i64>, TypedExpr<String>) {
        let mut table = Table::new("User");
        let id = table.column("Id");
        let name = table.column("PersonName");
        (table, id, name)
    }

    #[test]
    fn locking_clause_with_tables() {
        let (user, id, _) = user();
        let factory = PostgresQueryFactory::detached();
        let query = factory
            .select(id)
            .from(&user)
            .for_update()
            .unwrap()
            .of(&[&user])
            .no_wait()
            .unwrap();
        assert_eq!(
            query.to_sql().unwrap().sql,
            "select \"User\".\"Id\" from \"User\" for update of \"User\" nowait"
        );
    }

    #[test]
    fn distinct_on_renders_after_select() {
        let (user, id, name) = user();
        let factory = PostgresQueryFactory::detached();
        let query = factory
            .select(name.clone())
            .from(&user)
            .distinct_on(vec![name.expr(), id.expr()]);
        assert_eq!(
            query.to_sql().unwrap().sql,
            "select distinct on(\"User\".\"PersonName\", \"User\".\"Id\") \"User\".\"PersonName\" from \"User\""
        );
    }
}
