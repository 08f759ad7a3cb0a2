use crate::configuration::Configuration;
use crate::dml::clause::ClauseBase;
use crate::error::{Error, Result};
use crate::execute::{self, Provider};
use crate::expr::{Expr, IntoExpr};
use crate::metadata::{Position, QueryFlag, QueryMetadata};
use crate::path::Table;
use crate::serializer::SerializedSql;

/// `delete from` clause.
///
/// Filters may only reference columns of the target table; correlate other
/// tables through a subquery (`exists (...)`) instead.
#[derive(Clone)]
pub struct DeleteClause {
    base: ClauseBase,
    metadata: QueryMetadata,
    batches: Vec<QueryMetadata>,
}

impl DeleteClause {
    pub(crate) fn new(entity: &Table, configuration: Configuration, provider: Provider) -> Self {
        let base = ClauseBase::new(entity, configuration, provider);
        Self {
            metadata: base.metadata(),
            base,
            batches: Vec::new(),
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

    /// Store the current filter as a batch item
    pub fn add_batch(mut self) -> Self {
        let metadata = std::mem::replace(&mut self.metadata, self.base.metadata());
        self.batches.push(metadata);
        self
    }

    pub fn clear(&mut self) {
        self.batches.clear();
        self.metadata = self.base.metadata();
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
        if self.batches.is_empty() {
            return Ok(vec![self.render(&self.metadata)?]);
        }
        self.base.check_batch_literals(self.batches.len(), "deletes")?;
        self.batches.iter().map(|batch| self.render(batch)).collect()
    }

    fn render(&self, metadata: &QueryMetadata) -> Result<SerializedSql> {
        if let Some(filter) = &metadata.filter {
            validate_paths(filter, &self.base.entity.alias)?;
        }
        self.base
            .serializer()
            .serialize_delete(metadata, &self.base.entity)
    }

    /// Number of deleted rows, summed over batch items
    pub async fn execute(&self) -> Result<u64> {
        execute::execute_batch(&self.base.provider, self.to_sql()?).await
    }
}

/// Reject columns qualified by anything but the target table. Subqueries
/// carry their own sources and are not inspected.
fn validate_paths(expr: &Expr, alias: &str) -> Result<()> {
    match expr {
        Expr::Column(column) => match &column.qualifier {
            Some(qualifier) if qualifier != alias => Err(Error::UndeclaredPath(format!(
                "{}.{}",
                qualifier, column.name
            ))),
            _ => Ok(()),
        },
        Expr::Operation { args, .. } | Expr::Template { args, .. } | Expr::List(args) => args
            .iter()
            .try_for_each(|arg| validate_paths(arg, alias)),
        Expr::Alias { expr, .. } => validate_paths(expr, alias),
        Expr::SubQuery(_)
        | Expr::Union { .. }
        | Expr::Table(_)
        | Expr::Constant(_)
        | Expr::Param(_)
        | Expr::Null
        | Expr::Wildcard => Ok(()),
    }
}
