use crate::repos::repo::{
    ExecutesWithRawQuery, HasRawQueryClient, Migratable, RepoError, RepoMigrations,
    SQLikeMigrations,
};
use crate::PostgresRepo;

impl RepoMigrations for PostgresRepo {
    fn create_contracts_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_contracts()
    }

    fn create_applications_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_applications()
    }

    fn create_events_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_events()
    }

    fn create_chunks_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_chunks()
    }

    fn create_backfills_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_backfills()
    }

    fn drop_all_migration() -> &'static [&'static str] {
        SQLikeMigrations::drop_all()
    }
}

#[async_trait::async_trait]
impl Migratable for PostgresRepo {
    async fn migrate(&self) -> Result<(), RepoError> {
        let client = self.get_raw_query_client().await?;

        for migration in Self::get_internal_migrations() {
            Self::execute_raw_query(&client, migration).await?;
        }

        Ok(())
    }
}

impl PostgresRepo {
    /// Drops every table. Meant for test databases.
    pub async fn reset(&self) -> Result<(), RepoError> {
        let client = self.get_raw_query_client().await?;

        for migration in Self::get_reset_internal_migrations() {
            Self::execute_raw_query(&client, migration).await?;
        }

        Ok(())
    }
}
