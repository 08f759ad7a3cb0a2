mod common;

use common::Fixture;
use rust_sqldsl::{exists, Error};

#[tokio::test]
async fn delete_with_filter() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let deleted = f
        .factory
        .delete(&f.user.table)
        .where_(f.user.active.eq(false))
        .execute()
        .await?;
    assert_eq!(deleted, 1);
    assert_eq!(f.user_names().await?, vec!["Ann", "Bob"]);
    Ok(())
}

#[tokio::test]
async fn delete_without_filter_empties_the_table() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    assert_eq!(f.factory.delete(&f.user.table).execute().await?, 3);
    assert!(f.user_names().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn foreign_paths_need_a_subquery() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let direct = f
        .factory
        .delete(&f.user.table)
        .where_(f.locale.code.eq("UK"));
    assert!(matches!(
        direct.execute().await,
        Err(Error::UndeclaredPath(path)) if path == "Locale.CountryCode"
    ));

    let uk = f
        .factory
        .select(f.locale.id.clone())
        .from(&f.locale.table)
        .where_(f.locale.id.eq(&f.user.locale_id).and(f.locale.code.eq("UK")));
    let deleted = f
        .factory
        .delete(&f.user.table)
        .where_(exists(&uk))
        .execute()
        .await?;
    assert_eq!(deleted, 1);
    assert_eq!(f.user_names().await?, vec!["Ann", "Cid"]);
    Ok(())
}

#[tokio::test]
async fn batch_delete_sums_counts() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    let delete = f
        .factory
        .delete(&f.user.table)
        .where_(f.user.id.eq(1i64))
        .add_batch()
        .where_(f.user.id.eq(3i64))
        .add_batch();
    assert_eq!(delete.execute().await?, 2);
    assert_eq!(f.user_names().await?, vec!["Bob"]);
    Ok(())
}

#[tokio::test]
async fn deleting_a_locale_clears_user_references() -> anyhow::Result<()> {
    let f = Fixture::new().await?;
    f.factory
        .delete(&f.locale.table)
        .where_(f.locale.id.eq(1i64))
        .execute()
        .await?;
    let locale = f
        .factory
        .select(f.user.locale_id.optional())
        .from(&f.user.table)
        .where_(f.user.id.eq(1i64))
        .fetch_one()
        .await?;
    assert_eq!(locale, Some(None));
    Ok(())
}
