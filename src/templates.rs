//! Dialect specific rendering rules.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metadata::{Position, QueryFlag};
use crate::value::Value;

/// Rendering rules of one SQL dialect
pub trait SqlTemplates: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn for_update_flag(&self) -> Option<QueryFlag> {
        Some(QueryFlag::text(Position::End, " for update"))
    }

    /// `None` when the dialect has no shared row lock
    fn for_share_flag(&self) -> Option<QueryFlag> {
        None
    }

    fn no_wait_flag(&self) -> Option<QueryFlag> {
        None
    }

    /// Whether insert batches may be folded into one multi-row insert
    fn is_batch_to_bulk_supported(&self) -> bool {
        true
    }

    /// Whether `update` and `delete` accept a `limit`
    fn supports_dml_limit(&self) -> bool {
        false
    }

    /// Whether union members are wrapped in parentheses
    fn wrap_union_members(&self) -> bool {
        true
    }

    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }

    fn blob_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex(bytes))
    }

    /// Trailing `limit` / `offset` text, with a leading space
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" limit {} offset {}", limit, offset),
            (Some(limit), None) => format!(" limit {}", limit),
            (None, Some(offset)) => format!(" offset {}", offset),
            (None, None) => String::new(),
        }
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => {
                let text = v.to_string();
                if text.contains(['.', 'e', 'E']) || !v.is_finite() {
                    text
                } else {
                    format!("{}.0", text)
                }
            }
            Value::Text(v) => format!("'{}'", v.replace('\'', "''")),
            Value::Blob(v) => self.blob_literal(v),
            Value::Boolean(v) => self.boolean_literal(*v).to_string(),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresTemplates;

impl SqlTemplates for PostgresTemplates {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn for_share_flag(&self) -> Option<QueryFlag> {
        Some(QueryFlag::text(Position::End, " for share"))
    }

    fn no_wait_flag(&self) -> Option<QueryFlag> {
        Some(QueryFlag::text(Position::End, " nowait"))
    }

    fn blob_literal(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'::bytea", hex(bytes))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTemplates;

impl SqlTemplates for MySqlTemplates {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn for_share_flag(&self) -> Option<QueryFlag> {
        Some(QueryFlag::text(Position::End, " lock in share mode"))
    }

    fn no_wait_flag(&self) -> Option<QueryFlag> {
        Some(QueryFlag::text(Position::End, " nowait"))
    }

    fn supports_dml_limit(&self) -> bool {
        true
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, Some(offset)) => format!(" limit {} offset {}", u64::MAX, offset),
            (limit, offset) => PostgresTemplates.limit_offset(limit, offset),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTemplates;

impl SqlTemplates for SqliteTemplates {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn for_update_flag(&self) -> Option<QueryFlag> {
        None
    }

    fn wrap_union_members(&self) -> bool {
        false
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, Some(offset)) => format!(" limit -1 offset {}", offset),
            (limit, offset) => PostgresTemplates.limit_offset(limit, offset),
        }
    }
}

/// Dialect selector used by serialized settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn templates(self) -> Arc<dyn SqlTemplates> {
        match self {
            Dialect::Postgres => Arc::new(PostgresTemplates),
            Dialect::MySql => Arc::new(MySqlTemplates),
            Dialect::Sqlite => Arc::new(SqliteTemplates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_literals_double_quotes() {
        assert_eq!(
            SqliteTemplates.literal(&Value::Text("it's".into())),
            "'it''s'"
        );
    }

    #[test]
    fn boolean_literals_follow_dialect() {
        assert_eq!(PostgresTemplates.literal(&Value::Boolean(true)), "true");
        assert_eq!(SqliteTemplates.literal(&Value::Boolean(true)), "1");
        assert_eq!(MySqlTemplates.literal(&Value::Boolean(false)), "0");
    }

    #[test]
    fn reals_keep_a_fraction() {
        assert_eq!(SqliteTemplates.literal(&Value::Real(2.0)), "2.0");
        assert_eq!(SqliteTemplates.literal(&Value::Real(2.5)), "2.5");
    }

    #[test]
    fn blob_literals() {
        assert_eq!(SqliteTemplates.literal(&Value::Blob(vec![0xAB, 0x01])), "X'AB01'");
        assert_eq!(
            PostgresTemplates.literal(&Value::Blob(vec![0xAB])),
            "'\\xAB'::bytea"
        );
    }

    #[test]
    fn offset_without_limit() {
        assert_eq!(SqliteTemplates.limit_offset(None, Some(5)), " limit -1 offset 5");
        assert_eq!(PostgresTemplates.limit_offset(None, Some(5)), " offset 5");
        assert_eq!(
            MySqlTemplates.limit_offset(None, Some(5)),
            format!(" limit {} offset 5", u64::MAX)
        );
    }

    #[test]
    fn identifier_quoting() {
        assert_eq!(PostgresTemplates.quote_identifier("User"), "\"User\"");
        assert_eq!(MySqlTemplates.quote_identifier("User"), "`User`");
    }

    #[test]
    fn dialect_names_deserialize_lowercase() {
        let dialect: Dialect = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(dialect, Dialect::MySql);
        assert_eq!(dialect.templates().name(), "mysql");
    }
}
