use crate::configuration::Configuration;
use crate::dml::clause::ClauseBase;
use crate::error::{Error, Result};
use crate::execute::{self, Provider};
use crate::expr::{ColumnRef, Expr, IntoExpr, TypedExpr};
use crate::metadata::{Position, QueryFlag, QueryMetadata};
use crate::path::Table;
use crate::serializer::SerializedSql;

#[derive(Debug, Clone, PartialEq)]
struct UpdateBatch {
    metadata: QueryMetadata,
    updates: Vec<(ColumnRef, Expr)>,
}

/// `update` clause
#[derive(Clone)]
pub struct UpdateClause {
    base: ClauseBase,
    metadata: QueryMetadata,
    updates: Vec<(ColumnRef, Expr)>,
    batches: Vec<UpdateBatch>,
}

impl UpdateClause {
    pub(crate) fn new(entity: &Table, configuration: Configuration, provider: Provider) -> Self {
        let base = ClauseBase::new(entity, configuration, provider);
        Self {
            metadata: base.metadata(),
            base,
            updates: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// Assign `value` to `path`; assigning the same column again replaces
    /// the earlier value in place
    pub fn set<T>(mut self, path: &TypedExpr<T>, value: impl IntoExpr) -> Self {
        self.put(path.as_expr(), value.into_expr());
        self
    }

    pub fn set_null<T>(mut self, path: &TypedExpr<T>) -> Self {
        self.put(path.as_expr(), Expr::Null);
        self
    }

    pub fn set_all<I, E>(mut self, assignments: I) -> Self
    where
        I: IntoIterator<Item = (Expr, E)>,
        E: IntoExpr,
    {
        for (path, value) in assignments {
            self.put(&path, value.into_expr());
        }
        self
    }

    fn put(&mut self, path: &Expr, value: Expr) {
        let Some(column) = self.base.target(path) else {
            return;
        };
        match self.updates.iter_mut().find(|(existing, _)| *existing == column) {
            Some((_, slot)) => *slot = value,
            None => self.updates.push((column, value)),
        }
    }

    pub fn where_(mut self, predicate: impl IntoExpr) -> Self {
        self.metadata.add_where(predicate);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.metadata.modifiers.limit = Some(limit);
        self
    }

    /// Store the current assignments and filter as a batch item
    pub fn add_batch(mut self) -> Self {
        let metadata = std::mem::replace(&mut self.metadata, self.base.metadata());
        self.batches.push(UpdateBatch {
            metadata,
            updates: std::mem::take(&mut self.updates),
        });
        self
    }

    pub fn clear(&mut self) {
        self.base.clear_targets();
        self.batches.clear();
        self.updates.clear();
        self.metadata = self.base.metadata();
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.batches.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn add_flag(mut self, position: Position, flag: Expr) -> Self {
        let flag = QueryFlag::new(position, flag);
        self.metadata.add_flag(flag.clone());
        self.base.flags.push(flag);
        self
    }

    pub fn add_flag_text(self, position: Position, flag: impl Into<String>) -> Self {
        let flag = QueryFlag::text(position, flag);
        self.add_flag(flag.position, flag.flag)
    }

    pub fn with_use_literals(mut self, use_literals: bool) -> Self {
        self.base.use_literals = use_literals;
        self
    }

    pub fn to_sql(&self) -> Result<Vec<SerializedSql>> {
        self.base.check_targets()?;
        let entity = &self.base.entity;
        if self.batches.is_empty() {
            if self.updates.is_empty() {
                return Err(Error::EmptyClause("update without assignments"));
            }
            let rendered =
                self.base
                    .serializer()
                    .serialize_update(&self.metadata, entity, &self.updates)?;
            return Ok(vec![rendered]);
        }
        self.base.check_batch_literals(self.batches.len(), "updates")?;
        self.batches
            .iter()
            .map(|batch| {
                self.base
                    .serializer()
                    .serialize_update(&batch.metadata, entity, &batch.updates)
            })
            .collect()
    }

    /// Number of updated rows, summed over batch items
    pub async fn execute(&self) -> Result<u64> {
        execute::execute_batch(&self.base.provider, self.to_sql()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{MySqlTemplates, SqliteTemplates};
    use crate::value::Value;

    fn user() -> (Table, TypedExpr<i64>, TypedExpr<String>) {
        let mut table = Table::new("User");
        let id = table.column("Id");
        let name = table.column("PersonName");
        (table, id, name)
    }

    #[test]
    fn repeated_set_replaces_in_place() {
        let (table, id, name) = user();
        let update = UpdateClause::new(&table, Configuration::new(SqliteTemplates), None)
            .set(&name, "a")
            .set(&id, 7i64)
            .set(&name, "b")
            .where_(id.eq(1i64));
        let rendered = update.to_sql().unwrap();
        assert_eq!(
            rendered[0].sql,
            "update \"User\" set \"PersonName\" = ?, \"Id\" = ? where \"Id\" = ?"
        );
        assert_eq!(
            rendered[0].resolve().unwrap(),
            vec![Value::Text("b".into()), Value::Integer(7), Value::Integer(1)]
        );
    }

    #[test]
    fn limit_renders_on_mysql() {
        let (table, id, name) = user();
        let update = UpdateClause::new(&table, Configuration::new(MySqlTemplates), None)
            .set_null(&name)
            .where_(id.gt(1i64))
            .limit(2);
        assert_eq!(
            update.to_sql().unwrap()[0].sql,
            "update `User` set `PersonName` = null where `Id` > ? limit 2"
        );
    }

    #[test]
    fn batches_keep_their_own_filters() {
        let (table, id, name) = user();
        let update = UpdateClause::new(&table, Configuration::new(SqliteTemplates), None)
            .set(&name, "a")
            .where_(id.eq(1i64))
            .add_batch()
            .set(&name, "b")
            .where_(id.eq(2i64))
            .add_batch();
        let rendered = update.to_sql().unwrap();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].sql, rendered[1].sql);
        assert_eq!(
            rendered[1].resolve().unwrap(),
            vec![Value::Text("b".into()), Value::Integer(2)]
        );
    }

    #[test]
    fn non_path_targets_fail_until_cleared() {
        let (table, id, name) = user();
        let mut update = UpdateClause::new(&table, Configuration::new(SqliteTemplates), None)
            .set(&name.as_(&TypedExpr::<String>::path("Alias")), "a")
            .set(&id.add(1i64), 2i64);
        assert!(matches!(update.to_sql(), Err(Error::InvalidExpression(_))));

        update.clear();
        let update = update.set(&name, "b");
        assert_eq!(
            update.to_sql().unwrap()[0].sql,
            "update \"User\" set \"PersonName\" = ?"
        );
    }

    #[test]
    fn empty_update_is_rejected() {
        let (table, _, _) = user();
        let update = UpdateClause::new(&table, Configuration::new(SqliteTemplates), None);
        assert!(update.is_empty());
        assert!(matches!(update.to_sql(), Err(Error::EmptyClause(_))));
    }
}
