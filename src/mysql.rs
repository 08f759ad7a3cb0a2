//! MySQL specific query flags and insert variants.

use std::ops::Deref;
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::dml::InsertClause;
use crate::expr::Expr;
use crate::factory::QueryFactory;
use crate::metadata::Position;
use crate::path::Table;
use crate::projection::Projection;
use crate::query::Query;
use crate::spi::ConnectionProvider;
use crate::templates::MySqlTemplates;

pub trait MySqlQueryExt: Sized {
    fn big_result(self) -> Self;
    fn buffer_result(self) -> Self;
    fn cache(self) -> Self;
    fn no_cache(self) -> Self;
    fn calc_found_rows(self) -> Self;
    fn high_priority(self) -> Self;
    fn small_result(self) -> Self;
    fn straight_join(self) -> Self;
    fn lock_in_share_mode(self) -> Self;
    fn with_rollup(self) -> Self;
}

impl<P: Projection> MySqlQueryExt for Query<P> {
    fn big_result(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "sql_big_result ")
    }

    fn buffer_result(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "sql_buffer_result ")
    }

    fn cache(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "sql_cache ")
    }

    fn no_cache(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "sql_no_cache ")
    }

    fn calc_found_rows(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "sql_calc_found_rows ")
    }

    fn high_priority(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "high_priority ")
    }

    fn small_result(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "sql_small_result ")
    }

    fn straight_join(self) -> Self {
        self.add_flag_text(Position::AfterSelect, "straight_join ")
    }

    fn lock_in_share_mode(self) -> Self {
        self.add_flag_text(Position::End, " lock in share mode")
    }

    fn with_rollup(self) -> Self {
        self.add_flag_text(Position::AfterGroupBy, " with rollup")
    }
}

/// [`QueryFactory`] rendering MySQL, with its insert variants
#[derive(Clone)]
pub struct MySqlQueryFactory(QueryFactory);

impl MySqlQueryFactory {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self(QueryFactory::new(Configuration::new(MySqlTemplates), provider))
    }

    pub fn with_configuration(configuration: Configuration, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self(QueryFactory::new(configuration, provider))
    }

    pub fn detached() -> Self {
        Self(QueryFactory::detached(Configuration::new(MySqlTemplates)))
    }

    /// `insert ignore into`
    pub fn insert_ignore(&self, table: &Table) -> InsertClause {
        self.insert(table)
            .add_flag_text(Position::StartOverride, "insert ignore into ")
    }

    /// `insert ... on duplicate key update <clause>` with a raw clause
    pub fn insert_on_duplicate_key_update(&self, table: &Table, clause: &str) -> InsertClause {
        self.insert(table)
            .add_flag_text(Position::End, format!(" on duplicate key update {}", clause))
    }

    /// `insert ... on duplicate key update` with one expression per
    /// assignment, e.g. `col.eq(value)`
    pub fn insert_on_duplicate_key_update_exprs(
        &self,
        table: &Table,
        clauses: Vec<Expr>,
    ) -> InsertClause {
        let placeholders: Vec<String> = (0..clauses.len()).map(|i| format!("{{{}}}", i)).collect();
        let template = format!(" on duplicate key update {}", placeholders.join(", "));
        self.insert(table)
            .add_flag(Position::End, Expr::template(template, clauses))
    }

    /// `replace into`
    pub fn replace(&self, table: &Table) -> InsertClause {
        self.insert(table)
            .add_flag_text(Position::StartOverride, "replace into ")
    }
}

impl Deref for MySqlQueryFactory {
    type Target = QueryFactory;

    fn deref(&self) -> &QueryFactory {
        &self.0
    }
}
