#![allow(dead_code)]

use std::sync::Arc;

use rust_sqldsl::sqlite::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, ForeignKey, ForeignKeyAction,
    Schema, SqliteConnection, TableDefinition,
};
use rust_sqldsl::{
    Configuration, FixedConnectionProvider, FromRow, QueryFactory, Row, SqliteTemplates, Table,
    TypedExpr,
};
use tracing_subscriber::EnvFilter;

pub struct LocaleTable {
    pub table: Table,
    pub id: TypedExpr<i64>,
    pub code: TypedExpr<String>,
}

pub struct UserTable {
    pub table: Table,
    pub id: TypedExpr<i64>,
    pub name: TypedExpr<String>,
    pub locale_id: TypedExpr<i64>,
    pub active: TypedExpr<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub locale_id: Option<i64>,
    pub active: bool,
}

impl FromRow for User {
    fn from_row(row: &Row) -> rust_sqldsl::Result<Self> {
        Ok(Self {
            id: row.get_by_name("Id")?,
            name: row.get_by_name("PersonName")?,
            locale_id: row.get_by_name("LocaleId")?,
            active: row.get_by_name("Active")?,
        })
    }
}

pub fn locale_table() -> LocaleTable {
    let mut table = Table::new("Locale");
    let id = table.column("Id");
    let code = table.column("CountryCode");
    table.set_primary_key(&["Id"]);
    LocaleTable { table, id, code }
}

pub fn user_table() -> UserTable {
    let mut table = Table::new("User");
    let id = table.column("Id");
    let name = table.column("PersonName");
    let locale_id = table.column("LocaleId");
    let active = table.column("Active");
    table.set_primary_key(&["Id"]);
    UserTable {
        table,
        id,
        name,
        locale_id,
        active,
    }
}

pub fn schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new("Locale")
                .column(
                    ColumnDefinition::new("Id", DataType::Integer)
                        .constraint(ColumnConstraint::PrimaryKey),
                )
                .column(
                    ColumnDefinition::new("CountryCode", DataType::Text)
                        .constraint(ColumnConstraint::NotNull),
                ),
        )
        .add_table(
            TableDefinition::new("User")
                .column(
                    ColumnDefinition::new("Id", DataType::Integer)
                        .constraint(ColumnConstraint::PrimaryKey),
                )
                .column(
                    ColumnDefinition::new("PersonName", DataType::Text)
                        .constraint(ColumnConstraint::NotNull),
                )
                .column(ColumnDefinition::new("LocaleId", DataType::Integer))
                .column(
                    ColumnDefinition::new("Active", DataType::Integer)
                        .constraint(ColumnConstraint::NotNull)
                        .default_value(DefaultValue::Integer(1)),
                )
                .foreign_key(
                    ForeignKey::new(&["LocaleId"], "Locale", &["Id"])
                        .on_delete(ForeignKeyAction::SetNull),
                ),
        )
}

const SEED: &str = r#"
    insert into "Locale" ("Id", "CountryCode") values (1, 'US'), (2, 'UK');
    insert into "User" ("Id", "PersonName", "LocaleId", "Active") values
        (1, 'Ann', 1, 1),
        (2, 'Bob', 2, 1),
        (3, 'Cid', null, 0);
"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory database with the `Locale` / `User` schema and three users
pub struct Fixture {
    pub connection: SqliteConnection,
    pub factory: QueryFactory,
    pub locale: LocaleTable,
    pub user: UserTable,
}

impl Fixture {
    pub async fn new() -> anyhow::Result<Self> {
        init_tracing();
        let connection = SqliteConnection::open_in_memory()?;
        connection.initialize_schema(&schema()).await?;
        connection.execute_batch(SEED).await?;
        let provider = Arc::new(FixedConnectionProvider::of(Arc::new(connection.clone())));
        let factory = QueryFactory::new(Configuration::new(SqliteTemplates), provider);
        Ok(Self {
            connection,
            factory,
            locale: locale_table(),
            user: user_table(),
        })
    }

    pub async fn user_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .factory
            .select(self.user.name.clone())
            .from(&self.user.table)
            .order_by(self.user.id.asc())
            .fetch_all()
            .await?)
    }
}
