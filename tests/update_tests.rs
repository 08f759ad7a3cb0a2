mod common;

use common::Fixture;
use rust_sqldsl::{Error, Expr};

#[tokio::test]
async fn update_with_filter() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let updated = f
        .factory
        .update(&f.user.table)
        .set(&f.user.name, "Bea")
        .where_(f.user.id.eq(2i64))
        .execute()
        .await?;
    assert_eq!(updated, 1);
    assert_eq!(f.user_names().await?, vec!["Ann", "Bea", "Cid"]);
    Ok(())
}

#[tokio::test]
async fn update_without_filter_touches_every_row() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let updated = f
        .factory
        .update(&f.user.table)
        .set(&f.user.active, true)
        .execute()
        .await?;
    assert_eq!(updated, 3);
    Ok(())
}

#[tokio::test]
async fn set_null_and_expression_values() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    f.factory
        .update(&f.user.table)
        .set_null(&f.user.locale_id)
        .set(&f.user.id, f.user.id.add(100i64))
        .where_(f.user.id.eq(1i64))
        .execute()
        .await?;

    let ids = f
        .factory
        .select(f.user.id.clone())
        .from(&f.user.table)
        .where_(f.user.locale_id.is_null())
        .order_by(f.user.id.asc())
        .fetch_all()
        .await?;
    assert_eq!(ids, vec![3, 101]);
    Ok(())
}

#[tokio::test]
async fn set_all_assigns_several_columns() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let updated = f
        .factory
        .update(&f.user.table)
        .set_all(vec![
            (f.user.name.expr(), Expr::constant("Cyd")),
            (f.user.active.expr(), Expr::constant(true)),
        ])
        .where_(f.user.id.eq(3i64))
        .execute()
        .await?;
    assert_eq!(updated, 1);

    let active = f
        .factory
        .select(f.user.active.clone())
        .from(&f.user.table)
        .where_(f.user.name.eq("Cyd"))
        .fetch_one()
        .await?;
    assert_eq!(active, Some(true));
    Ok(())
}

#[tokio::test]
async fn batch_update_sums_counts() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let update = f
        .factory
        .update(&f.user.table)
        .set(&f.user.name, "Ana")
        .where_(f.user.id.eq(1i64))
        .add_batch()
        .set(&f.user.name, "Bo")
        .where_(f.user.id.eq(2i64))
        .add_batch();
    assert_eq!(update.batch_count(), 2);
    assert_eq!(update.execute().await?, 2);
    assert_eq!(f.user_names().await?, vec!["Ana", "Bo", "Cid"]);
    Ok(())
}

#[tokio::test]
async fn update_limit_is_rejected_by_sqlite() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let result = f
        .factory
        .update(&f.user.table)
        .set(&f.user.active, false)
        .limit(1)
        .execute()
        .await;
    assert!(matches!(result, Err(Error::Unsupported(_))));
    Ok(())
}
