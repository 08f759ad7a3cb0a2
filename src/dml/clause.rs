use std::collections::HashMap;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::execute::Provider;
use crate::expr::{ColumnRef, Expr, TableRef};
use crate::metadata::{QueryFlag, QueryMetadata};
use crate::path::Table;
use crate::serializer::SqlSerializer;
use crate::value::Value;

/// State every DML clause carries besides its own payload
#[derive(Clone)]
pub(crate) struct ClauseBase {
    pub(crate) entity: TableRef,
    pub(crate) configuration: Configuration,
    pub(crate) provider: Provider,
    pub(crate) use_literals: bool,
    pub(crate) primary_key: Vec<String>,
    pub(crate) flags: Vec<QueryFlag>,
    pub(crate) params: HashMap<String, Value>,
    invalid_target: Option<String>,
}

impl ClauseBase {
    pub(crate) fn new(entity: &Table, configuration: Configuration, provider: Provider) -> Self {
        Self {
            entity: entity.table_ref(),
            primary_key: entity.primary_key().to_vec(),
            use_literals: configuration.use_literals(),
            configuration,
            provider,
            flags: Vec::new(),
            params: HashMap::new(),
            invalid_target: None,
        }
    }

    /// Column an assignment targets. A non-path target is remembered and
    /// fails the clause when it is rendered.
    pub(crate) fn target(&mut self, expr: &Expr) -> Option<ColumnRef> {
        match column_of(expr) {
            Ok(column) => Some(column),
            Err(e) => {
                if self.invalid_target.is_none() {
                    self.invalid_target = Some(match e {
                        Error::InvalidExpression(message) => message,
                        other => other.to_string(),
                    });
                }
                None
            }
        }
    }

    pub(crate) fn clear_targets(&mut self) {
        self.invalid_target = None;
    }

    pub(crate) fn check_targets(&self) -> Result<()> {
        match &self.invalid_target {
            Some(message) => Err(Error::InvalidExpression(message.clone())),
            None => Ok(()),
        }
    }

    /// The single primary key column, used as the default generated key
    pub(crate) fn key_column(&self) -> Result<String> {
        match self.primary_key.as_slice() {
            [column] => Ok(column.clone()),
            [] => Err(Error::Unsupported(format!(
                "{} has no primary key to return",
                self.entity.name
            ))),
            _ => Err(Error::Unsupported(format!(
                "{} has a composite primary key, name the key column",
                self.entity.name
            ))),
        }
    }

    pub(crate) fn serializer(&self) -> SqlSerializer<'_> {
        SqlSerializer::new(&self.configuration).with_use_literals(self.use_literals)
    }

    /// Metadata targeting the entity, with the clause's flags and params
    pub(crate) fn metadata(&self) -> QueryMetadata {
        let mut metadata = QueryMetadata::for_target(self.entity.clone());
        metadata.flags = self.flags.clone();
        metadata.params = self.params.clone();
        metadata
    }

    pub(crate) fn check_batch_literals(&self, batches: usize, statement: &str) -> Result<()> {
        if batches > 0 && self.use_literals {
            return Err(Error::Unsupported(format!(
                "Batch {} are not supported with literals",
                statement
            )));
        }
        Ok(())
    }
}

/// Column targeted by an assignment: a column path or an alias name
pub(crate) fn column_of(expr: &Expr) -> Result<ColumnRef> {
    match expr {
        Expr::Column(column) => Ok(column.clone()),
        Expr::Alias { alias, .. } => Ok(ColumnRef {
            qualifier: None,
            name: alias.clone(),
        }),
        other => Err(Error::InvalidExpression(format!(
            "{:?} is not a column path",
            other
        ))),
    }
}
