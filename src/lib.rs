//! Typed SQL query construction with non-blocking, stream-based execution.
//!
//! # Intention
//!
//! - Build `select`, `union`, `insert`, `update` and `delete` statements from
//!   typed column paths instead of strings.
//! - Render them per dialect (PostgreSQL, MySQL, SQLite) with `?` markers and
//!   an ordered list of bindings, or with inline literals.
//! - Execute through a small asynchronous connection interface whose results
//!   arrive as `futures` streams.
//!
//! # Architectural Boundaries
//!
//! - Query building and rendering never touch a database.
//! - Drivers only see fully rendered [`spi::Statement`]s.
//! - The bundled SQLite driver lives in [`sqlite`]; other databases plug in
//!   by implementing [`spi::Connection`].

pub mod bind;
pub mod configuration;
pub mod dml;
pub mod error;
mod execute;
pub mod expr;
pub mod factory;
pub mod metadata;
pub mod mysql;
pub mod path;
pub mod postgres;
pub mod projection;
pub mod query;
pub mod serializer;
pub mod spi;
pub mod sqlite;
pub mod templates;
pub mod union;
pub mod value;

pub use configuration::{Configuration, Settings};
pub use dml::{DeleteClause, InsertClause, UpdateClause};
pub use error::{Error, Result};
pub use expr::{constant, count_all, exists, Expr, IntoExpr, OrderSpecifier, TypedExpr};
pub use factory::QueryFactory;
pub use metadata::{JoinType, Position, QueryFlag, QueryMetadata};
pub use path::Table;
pub use projection::{FromRow, Projection, Tuple, TupleProjection, Wildcard};
pub use query::Query;
pub use spi::{Connection, ConnectionProvider, FixedConnectionProvider, Row, Statement};
pub use templates::{Dialect, MySqlTemplates, PostgresTemplates, SqlTemplates, SqliteTemplates};
pub use union::Union;
pub use value::{FromValue, Value};
