use std::future::Future;

use contractwatch::{Migratable, PostgresRepo};
use tokio::sync::OnceCell;

use crate::db;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Runs `test_fn` against a migrated Postgres repo.
/// Without `TEST_DATABASE_URL` the test is skipped.
pub async fn run_test<TestFn, Fut>(test_fn: TestFn)
where
    TestFn: FnOnce(PostgresRepo) -> Fut,
    Fut: Future<Output = ()>,
{
    let Some(database_url) = db::database_url() else {
        eprintln!("TEST_DATABASE_URL is not set; skipping");
        return;
    };

    MIGRATED
        .get_or_init(|| async {
            db::setup(&database_url);

            let repo = PostgresRepo::new(&database_url).await.unwrap();
            repo.migrate().await.unwrap();
        })
        .await;

    let repo = PostgresRepo::with_max_pool_size(&database_url, 2).await.unwrap();

    test_fn(repo).await;
}
