mod common;

use common::Fixture;
use futures::TryStreamExt;
use rust_sqldsl::{Error, Expr, TypedExpr, Value};

#[tokio::test]
async fn single_row_insert() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let inserted = f
        .factory
        .insert(&f.locale.table)
        .set(&f.locale.id, 3i64)
        .set(&f.locale.code, "DE")
        .execute()
        .await?;
    assert_eq!(inserted, 1);

    let code = f
        .factory
        .select(f.locale.code.clone())
        .from(&f.locale.table)
        .where_(f.locale.id.eq(3i64))
        .fetch_one()
        .await?;
    assert_eq!(code, Some("DE".into()));
    Ok(())
}

#[tokio::test]
async fn columns_and_values_form() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let inserted = f
        .factory
        .insert(&f.locale.table)
        .columns(vec![f.locale.id.expr(), f.locale.code.expr()])
        .values(vec![Expr::constant(5i64), Expr::constant("FR")])
        .execute()
        .await?;
    assert_eq!(inserted, 1);
    Ok(())
}

#[tokio::test]
async fn batch_insert_runs_one_statement_per_item() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let insert = f
        .factory
        .insert(&f.locale.table)
        .set(&f.locale.id, 3i64)
        .set(&f.locale.code, "DE")
        .add_batch()
        .set(&f.locale.id, 4i64)
        .set(&f.locale.code, "FR")
        .add_batch();
    assert_eq!(insert.to_sql()?.len(), 2);
    assert_eq!(insert.execute().await?, 2);

    let count = f
        .factory
        .select(f.locale.id.count())
        .from(&f.locale.table)
        .fetch_one()
        .await?;
    assert_eq!(count, Some(4));
    Ok(())
}

#[tokio::test]
async fn batch_to_bulk_renders_multi_row_values() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let insert = f
        .factory
        .insert(&f.locale.table)
        .set(&f.locale.id, 3i64)
        .set(&f.locale.code, "DE")
        .add_batch()
        .set(&f.locale.id, 4i64)
        .set(&f.locale.code, "FR")
        .add_batch()
        .with_batch_to_bulk();
    let rendered = insert.to_sql()?;
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].sql.ends_with("values (?, ?), (?, ?)"));
    assert_eq!(insert.execute().await?, 2);
    Ok(())
}

#[tokio::test]
async fn batch_items_must_share_columns() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let insert = f
        .factory
        .insert(&f.locale.table)
        .set(&f.locale.id, 3i64)
        .set(&f.locale.code, "DE")
        .add_batch()
        .set(&f.locale.code, "FR")
        .add_batch();
    assert!(matches!(
        insert.execute().await,
        Err(Error::BatchMismatch { index: 1 })
    ));
    Ok(())
}

#[tokio::test]
async fn generated_key_of_a_single_insert() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let key = f
        .factory
        .insert(&f.user.table)
        .set(&f.user.name, "Dan")
        .set_null(&f.user.locale_id)
        .execute_with_key(&f.user.id)
        .await?;
    assert_eq!(key, Some(4));
    Ok(())
}

#[tokio::test]
async fn generated_keys_of_a_batch() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let keys: Vec<i64> = f
        .factory
        .insert(&f.user.table)
        .set(&f.user.name, "Dan")
        .add_batch()
        .set(&f.user.name, "Eve")
        .add_batch()
        .execute_with_keys(&f.user.id)
        .try_collect()
        .await?;
    assert_eq!(keys, vec![4, 5]);
    assert_eq!(f.user_names().await?, vec!["Ann", "Bob", "Cid", "Dan", "Eve"]);
    Ok(())
}

#[tokio::test]
async fn insert_from_subquery() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let source = f
        .factory
        .select_tuple(vec![f.locale.id.add(10i64).expr(), f.locale.code.expr()])
        .from(&f.locale.table);
    let inserted = f
        .factory
        .insert(&f.locale.table)
        .columns(vec![f.locale.id.expr(), f.locale.code.expr()])
        .select(&source)
        .execute()
        .await?;
    assert_eq!(inserted, 2);

    let ids = f
        .factory
        .select(f.locale.id.clone())
        .from(&f.locale.table)
        .order_by(f.locale.id.asc())
        .fetch_all()
        .await?;
    assert_eq!(ids, vec![1, 2, 11, 12]);
    Ok(())
}

#[tokio::test]
async fn empty_insert_is_rejected() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let insert = f.factory.insert(&f.locale.table);
    assert!(insert.is_empty());
    assert!(matches!(insert.execute().await, Err(Error::EmptyClause(_))));
    Ok(())
}

#[tokio::test]
async fn constraint_violations_surface_as_driver_errors() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let result = f
        .factory
        .insert(&f.locale.table)
        .set(&f.locale.id, 1i64)
        .set(&f.locale.code, Value::Text("US".into()))
        .execute()
        .await;
    assert!(matches!(result, Err(Error::Sqlite(_))));
    Ok(())
}

#[tokio::test]
async fn constant_free_batch_runs_every_item() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let zed = || TypedExpr::<String>::template("'Zed'", vec![]);
    let insert = f
        .factory
        .insert(&f.user.table)
        .set(&f.user.name, zed())
        .add_batch()
        .set(&f.user.name, zed())
        .add_batch()
        .set(&f.user.name, zed())
        .add_batch();
    assert!(insert.to_sql()?.iter().all(|item| item.constants.is_empty()));
    assert_eq!(insert.execute().await?, 3);

    let keys: Vec<i64> = insert.execute_with_keys(&f.user.id).try_collect().await?;
    assert_eq!(keys, vec![7, 8, 9]);
    assert_eq!(
        f.user_names().await?,
        vec!["Ann", "Bob", "Cid", "Zed", "Zed", "Zed", "Zed", "Zed", "Zed"]
    );
    Ok(())
}

#[tokio::test]
async fn primary_key_is_returned_without_naming_it() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let key = f
        .factory
        .insert(&f.user.table)
        .set(&f.user.name, "Dan")
        .execute_with_primary_key::<i64>()
        .await?;
    assert_eq!(key, Some(4));
    Ok(())
}
