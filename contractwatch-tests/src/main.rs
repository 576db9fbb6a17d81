use contractwatch::{Migratable, PostgresRepo};
use contractwatch_tests::db;

#[tokio::main]
async fn main() {
    let Some(database_url) = db::database_url() else {
        eprintln!("TEST_DATABASE_URL is not set; nothing to set up");
        return;
    };

    db::setup(&database_url);

    let repo = PostgresRepo::new(&database_url).await.unwrap();
    if std::env::var("RESET_TEST_DB").is_ok() {
        repo.reset().await.unwrap();
    }
    repo.migrate().await.unwrap();
}
