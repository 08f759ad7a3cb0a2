//! Glue between rendered SQL and a [`Connection`]: marker rewriting,
//! binding and stream plumbing shared by queries and clauses.

use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::bind::replace_binding_arguments;
use crate::error::{Error, Result};
use crate::projection::Projection;
use crate::serializer::SerializedSql;
use crate::spi::{Connection, ConnectionProvider, Statement};
use crate::value::{FromValue, Value};

pub(crate) type Provider = Option<Arc<dyn ConnectionProvider>>;

async fn connect(provider: &Provider) -> Result<Arc<dyn Connection>> {
    match provider {
        Some(provider) => provider.connection().await,
        None => Err(Error::NoConnection),
    }
}

fn prepare(connection: &dyn Connection, sql: &str, bindings: Vec<Vec<Value>>) -> Statement {
    let sql = replace_binding_arguments(sql, connection.bind_markers());
    debug!(sql = %sql, binding_sets = bindings.len(), "Preparing statement");
    Statement::with_bindings(sql, bindings)
}

/// Lazily run a rendered query and map each row through `projection`
pub(crate) fn fetch<P: Projection>(
    provider: Provider,
    projection: P,
    rendered: Result<SerializedSql>,
) -> BoxStream<'static, Result<P::Output>> {
    stream::once(async move {
        let rendered = rendered?;
        let bindings = rendered.resolve()?;
        let connection = connect(&provider).await?;
        let statement = prepare(connection.as_ref(), &rendered.sql, vec![bindings]);
        Ok::<_, Error>(connection.query(statement))
    })
    .try_flatten()
    .and_then(move |row| future::ready(projection.map_row(row)))
    .boxed()
}

/// SQL shared by every rendered item, with one binding set per item
fn batch_bindings(rendered: &[SerializedSql]) -> Result<(String, Vec<Vec<Value>>)> {
    let statement_sql = match rendered.first() {
        Some(first) => first.sql.clone(),
        None => return Err(Error::EmptyClause("no statement to execute")),
    };
    let mut bindings = Vec::with_capacity(rendered.len());
    for (index, item) in rendered.iter().enumerate() {
        if item.sql != statement_sql {
            return Err(Error::BatchMismatch { index });
        }
        bindings.push(item.resolve()?);
    }
    Ok((statement_sql, bindings))
}

/// Execute statements that must all share the SQL of the first one, as one
/// statement with a binding set each. Returns the summed row count.
pub(crate) async fn execute_batch(provider: &Provider, rendered: Vec<SerializedSql>) -> Result<u64> {
    let (sql, bindings) = batch_bindings(&rendered)?;
    let connection = connect(provider).await?;
    let statement = prepare(connection.as_ref(), &sql, bindings);
    let counts = connection.execute(statement).await?;
    Ok(counts.iter().sum())
}

/// Execute rendered statements and stream back the values generated for
/// `column`, one per inserted row
pub(crate) fn generated_keys<T>(
    provider: Provider,
    rendered: Result<Vec<SerializedSql>>,
    column: Result<String>,
) -> BoxStream<'static, Result<T>>
where
    T: FromValue + Send + 'static,
{
    stream::once(async move {
        let (sql, bindings) = batch_bindings(&rendered?)?;
        let column = column?;
        let connection = connect(&provider).await?;
        let mut statement = prepare(connection.as_ref(), &sql, bindings);
        statement.return_generated_values(&[column.as_str()]);
        Ok::<_, Error>(connection.query(statement))
    })
    .try_flatten()
    .and_then(|row| future::ready(row.get::<T>(0)))
    .boxed()
}
