use std::collections::HashMap;

use crate::expr::{Expr, IntoExpr, OrderSpecifier, TableRef};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Plain comma separated source
    Default,
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpression {
    pub join_type: JoinType,
    pub target: Expr,
    pub condition: Option<Expr>,
}

/// Where a flag is rendered inside the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Start,
    /// Replaces the leading keyword (`select `, `insert into `, ...)
    StartOverride,
    AfterSelect,
    AfterProjection,
    BeforeFilters,
    AfterFilters,
    BeforeGroupBy,
    AfterGroupBy,
    BeforeHaving,
    AfterHaving,
    BeforeOrder,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFlag {
    pub position: Position,
    pub flag: Expr,
}

impl QueryFlag {
    pub fn new(position: Position, flag: Expr) -> Self {
        Self { position, flag }
    }

    /// Flag rendered verbatim
    pub fn text(position: Position, text: impl Into<String>) -> Self {
        Self {
            position,
            flag: Expr::template(text, Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryModifiers {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Everything a statement is rendered from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMetadata {
    pub projection: Vec<Expr>,
    pub distinct: bool,
    pub joins: Vec<JoinExpression>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderSpecifier>,
    pub modifiers: QueryModifiers,
    pub flags: Vec<QueryFlag>,
    pub params: HashMap<String, Value>,
}

impl QueryMetadata {
    /// Metadata with `table` as its only source, as DML statements use
    pub fn for_target(table: TableRef) -> Self {
        let mut metadata = Self::default();
        metadata.add_join(JoinType::Default, Expr::Table(table));
        metadata
    }

    pub fn add_join(&mut self, join_type: JoinType, target: Expr) {
        self.joins.push(JoinExpression {
            join_type,
            target,
            condition: None,
        });
    }

    /// Attach a condition to the most recent join
    pub fn add_join_condition(&mut self, condition: impl IntoExpr) {
        if let Some(last) = self.joins.last_mut() {
            last.condition = Some(match last.condition.take() {
                Some(existing) => existing.and(condition),
                None => condition.into_expr(),
            });
        }
    }

    pub fn add_where(&mut self, predicate: impl IntoExpr) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate.into_expr(),
        });
    }

    pub fn add_having(&mut self, predicate: impl IntoExpr) {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(predicate),
            None => predicate.into_expr(),
        });
    }

    pub fn add_flag(&mut self, flag: QueryFlag) {
        self.flags.push(flag);
    }

    pub fn has_flag_at(&self, position: Position) -> bool {
        self.flags.iter().any(|f| f.position == position)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn flags_at(&self, position: Position) -> impl Iterator<Item = &QueryFlag> {
        self.flags.iter().filter(move |f| f.position == position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::TypedExpr;

    #[test]
    fn where_predicates_are_conjoined() {
        let code = TypedExpr::<String>::column("Locale", "CountryCode");
        let mut metadata = QueryMetadata::default();
        metadata.add_where(code.eq("US"));
        metadata.add_where(code.ne("UK"));
        assert_eq!(metadata.filter, Some(code.eq("US").and(code.ne("UK"))));
    }

    #[test]
    fn join_condition_applies_to_last_join() {
        let mut metadata = QueryMetadata::default();
        metadata.add_join(
            JoinType::Default,
            Expr::Table(TableRef {
                schema: None,
                name: "User".into(),
                alias: "User".into(),
            }),
        );
        metadata.add_join(
            JoinType::Left,
            Expr::Table(TableRef {
                schema: None,
                name: "Locale".into(),
                alias: "Locale".into(),
            }),
        );
        metadata.add_join_condition(Expr::constant(true));
        assert!(metadata.joins[0].condition.is_none());
        assert!(metadata.joins[1].condition.is_some());
    }
}
