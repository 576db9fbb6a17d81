//! Applications: an account's subscription to some events of a contract.
//!
//! Registering the first application of an address starts tracking the
//! contract; deleting its last application stops tracking it and drops
//! everything indexed for it.

use chrono::{DateTime, Utc};
use derive_more::Display;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::abi_sources::{AbiSource, AbiSourceError};
use crate::backfills::Backfill;
use crate::checkpoints::CheckpointError;
use crate::contracts::{self, ContractAbi, CreationInfo, UnsavedTrackedContract};
use crate::diesel::schema::contractwatch_applications;
use crate::planner::BlockRange;
use crate::{Repo, RepoError};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EVENT_NAMES: usize = 10;

const ID_PREFIX: &str = "apps";

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ApplicationError {
    #[display("invalid contract address: {_0}")]
    InvalidAddress(String),
    #[display("application name must be at most 100 characters")]
    NameTooLong,
    #[display("between 1 and 10 event names are required, got {_0}")]
    InvalidEventCount(usize),
    #[display("event {_0} is not present in the ABI")]
    UnknownEvent(String),
    #[display("invalid contract ABI: {_0}")]
    InvalidAbi(String),
    #[display("application {_0} does not exist")]
    NotFound(String),
    #[display("{_0}")]
    AbiSource(AbiSourceError),
    #[display("{_0}")]
    Repo(RepoError),
}

impl std::error::Error for ApplicationError {}

impl From<RepoError> for ApplicationError {
    fn from(value: RepoError) -> Self {
        ApplicationError::Repo(value)
    }
}

impl From<AbiSourceError> for ApplicationError {
    fn from(value: AbiSourceError) -> Self {
        ApplicationError::AbiSource(value)
    }
}

impl From<CheckpointError> for ApplicationError {
    fn from(value: CheckpointError) -> Self {
        match value {
            CheckpointError::Repo(error) => ApplicationError::Repo(error),
            other_error => ApplicationError::Repo(RepoError::Unknown(other_error.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = contractwatch_applications)]
pub struct Application {
    pub id: String,
    pub account_id: String,
    pub contract_address: String,
    pub name: String,
    pub start_block: i64,
    pub event_names: serde_json::Value,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        account_id: &str,
        contract_address: &str,
        name: &str,
        start_block: u64,
        event_names: &[String],
    ) -> Self {
        let now = Utc::now();

        Self {
            id: new_id(),
            account_id: account_id.to_string(),
            contract_address: contract_address.to_lowercase(),
            name: name.to_string(),
            start_block: start_block as i64,
            event_names: serde_json::json!(event_names),
            inserted_at: now,
            updated_at: now,
        }
    }

    pub fn get_event_names(&self) -> Vec<String> {
        serde_json::from_value(self.event_names.clone()).unwrap_or_default()
    }

    pub fn get_start_block(&self) -> u64 {
        self.start_block as u64
    }
}

/// `apps_` followed by 32 random hex digits.
pub fn new_id() -> String {
    format!("{ID_PREFIX}_{}", Uuid::new_v4().simple())
}

/// A registration request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewApplication {
    pub account_id: String,
    pub address: String,
    pub name: String,
    pub event_names: Vec<String>,
    pub start_block: Option<u64>,
    pub abi: Option<serde_json::Value>,
    pub creation_info: Option<CreationInfo>,
}

impl NewApplication {
    pub fn new<S: AsRef<str>>(
        account_id: &str,
        address: &str,
        name: &str,
        event_names: &[S],
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            address: address.to_string(),
            name: name.to_string(),
            event_names: event_names.iter().map(|name| name.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_start_block(mut self, start_block: u64) -> Self {
        self.start_block = Some(start_block);

        self
    }

    pub fn with_abi(mut self, abi: serde_json::Value) -> Self {
        self.abi = Some(abi);

        self
    }

    pub fn with_creation_info(mut self, creation_info: CreationInfo) -> Self {
        self.creation_info = Some(creation_info);

        self
    }

    fn validate(&self) -> Result<String, ApplicationError> {
        let address = contracts::normalize_address(&self.address)
            .map_err(|_| ApplicationError::InvalidAddress(self.address.clone()))?;

        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(ApplicationError::NameTooLong);
        }

        let event_count = self.event_names.len();
        if event_count == 0 || event_count > MAX_EVENT_NAMES {
            return Err(ApplicationError::InvalidEventCount(event_count));
        }

        Ok(address)
    }
}

/// Registers an application, tracking its contract if nobody did yet.
///
/// A tracked contract keeps its ABI. Otherwise the supplied ABI and creation
/// info are used, and whatever is missing is fetched from `abi_source`.
/// When the contract is already indexed past the application's start, the
/// blocks it missed are queued as a backfill.
pub async fn register<R: Repo>(
    repo: &R,
    abi_source: Option<&dyn AbiSource>,
    new_application: &NewApplication,
) -> Result<Application, ApplicationError> {
    let address = new_application.validate()?;
    let tracked_contract = repo.get_contract(&address).await?;

    let abi = match (&tracked_contract, &new_application.abi) {
        (Some(contract), _) => contract.get_abi(),
        (None, Some(abi)) => ContractAbi::from_json(abi.clone()),
        (None, None) => Ok(require(abi_source)?.fetch_abi(&address).await?),
    }
    .map_err(|error| ApplicationError::InvalidAbi(error.to_string()))?;

    if let Some(event_name) =
        new_application.event_names.iter().find(|event_name| !abi.has_event(event_name))
    {
        return Err(ApplicationError::UnknownEvent(event_name.clone()));
    }

    let (contract, newly_tracked) = match tracked_contract {
        Some(contract) => (contract, false),
        None => {
            let creation_info = match &new_application.creation_info {
                Some(creation_info) => creation_info.clone(),
                None => require(abi_source)?.fetch_creation_info(&address).await?,
            };
            let contract = UnsavedTrackedContract::new(&address, &abi, &creation_info);

            (repo.create_contract(&contract).await?, true)
        }
    };

    let start_block = new_application.start_block.unwrap_or(contract.get_creation_block());
    let application = Application::new(
        &new_application.account_id,
        &address,
        &new_application.name,
        start_block,
        &new_application.event_names,
    );
    repo.create_application(&application).await?;

    if !newly_tracked {
        maybe_backfill(repo, &application).await?;
    }

    info!(application = %application.id, contract = %address, "registered application");

    Ok(application)
}

fn require(abi_source: Option<&dyn AbiSource>) -> Result<&dyn AbiSource, ApplicationError> {
    abi_source.ok_or(ApplicationError::AbiSource(AbiSourceError::NotConfigured))
}

/// Blocks at or below the contract's marks were (or are being) indexed for
/// the subscriptions that existed back then only.
///
/// The marks are read after the application is stored: a tick moves the
/// dispatch mark before reading subscriptions, so every block it dispatched
/// without this application lies at or below what is read here.
async fn maybe_backfill<R: Repo>(
    repo: &R,
    application: &Application,
) -> Result<(), ApplicationError> {
    let Some(contract) = repo.get_contract(&application.contract_address).await? else {
        return Ok(());
    };

    let checkpoint = repo.get_checkpoint(&contract.address).await?;
    let indexed_up_to = checkpoint.max(contract.last_dispatched_block);
    let from_block = application.get_start_block().max(contract.get_creation_block());

    if indexed_up_to >= 0 && indexed_up_to as u64 >= from_block {
        let range = BlockRange::new(from_block, indexed_up_to as u64);
        repo.create_backfill(&Backfill::new(application, range)).await?;

        info!(application = %application.id, %range, "queued backfill");
    }

    Ok(())
}

pub async fn list<R: Repo>(
    repo: &R,
    account_id: &str,
) -> Result<Vec<Application>, ApplicationError> {
    Ok(repo.get_applications(account_id).await?)
}

pub async fn get<R: Repo>(
    repo: &R,
    account_id: &str,
    id: &str,
) -> Result<Application, ApplicationError> {
    repo.get_application(account_id, id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(id.to_string()))
}

/// Deletes the application. The contract goes with its last application.
pub async fn delete<R: Repo>(repo: &R, account_id: &str, id: &str) -> Result<(), ApplicationError> {
    let application = get(repo, account_id, id).await?;
    repo.delete_application(&application.id).await?;

    let remaining = repo.get_applications_by_contract(&application.contract_address).await?;
    if remaining.is_empty() {
        repo.delete_contract(&application.contract_address).await?;

        info!(contract = %application.contract_address, "stopped tracking contract");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{bayc_abi, indexed_transfers, MockAbiSource, BAYC_CONTRACT_ADDRESS};
    use crate::{CheckpointStore, MemoryRepo};

    fn new_application(event_names: &[&str]) -> NewApplication {
        NewApplication::new("account", BAYC_CONTRACT_ADDRESS, "Apes", event_names)
    }

    #[tokio::test]
    async fn tracks_the_contract_on_first_registration() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(12_287_507, "0xabc"));

        let application =
            register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();

        assert!(application.id.starts_with("apps_"));
        assert_eq!(application.contract_address, BAYC_CONTRACT_ADDRESS.to_lowercase());
        assert_eq!(application.start_block, 12_287_507);
        assert_eq!(application.get_event_names(), vec!["Transfer".to_string()]);

        let contract = repo.get_contract(BAYC_CONTRACT_ADDRESS).await.unwrap().unwrap();
        assert_eq!(contract.creation_block, 12_287_507);
        assert_eq!(contract.last_queried_block, -1);
    }

    #[tokio::test]
    async fn uses_the_supplied_abi_and_creation_info() {
        let repo = MemoryRepo::new();
        let request = new_application(&["Transfer"])
            .with_abi(bayc_abi().as_json().clone())
            .with_creation_info(CreationInfo::new(100, "0xabc"))
            .with_start_block(150);

        let application = register(&repo, None, &request).await.unwrap();

        assert_eq!(application.start_block, 150);
        assert!(repo.get_contract(BAYC_CONTRACT_ADDRESS).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn requires_an_abi_source_for_missing_details() {
        let repo = MemoryRepo::new();

        assert_eq!(
            register(&repo, None, &new_application(&["Transfer"])).await,
            Err(ApplicationError::AbiSource(AbiSourceError::NotConfigured))
        );
    }

    #[tokio::test]
    async fn validates_the_request() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(100, "0xabc"));
        let abi_source = Some(&abi_source as &dyn AbiSource);

        let mut request = new_application(&["Transfer"]);
        request.address = "0x1234".to_string();
        assert!(matches!(
            register(&repo, abi_source, &request).await,
            Err(ApplicationError::InvalidAddress(_))
        ));

        let mut request = new_application(&["Transfer"]);
        request.name = "a".repeat(101);
        assert_eq!(register(&repo, abi_source, &request).await, Err(ApplicationError::NameTooLong));

        assert_eq!(
            register(&repo, abi_source, &new_application(&[])).await,
            Err(ApplicationError::InvalidEventCount(0))
        );
        assert_eq!(
            register(&repo, abi_source, &new_application(&["Transfer"; 11])).await,
            Err(ApplicationError::InvalidEventCount(11))
        );
        assert_eq!(
            register(&repo, abi_source, &new_application(&["Mint"])).await,
            Err(ApplicationError::UnknownEvent("Mint".to_string()))
        );
        assert!(repo.get_all_contracts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn backfills_applications_joining_an_indexed_contract() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(100, "0xabc"));
        register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();
        repo.set_checkpoint(BAYC_CONTRACT_ADDRESS, 5_000).await.unwrap();

        let application = register(
            &repo,
            Some(&abi_source),
            &new_application(&["ApprovalForAll"]).with_start_block(50),
        )
        .await
        .unwrap();

        let backfills = repo.get_pending_backfills().await.unwrap();
        assert_eq!(backfills.len(), 1);
        assert_eq!(backfills[0].application_id, application.id);
        assert_eq!(backfills[0].get_range(), BlockRange::new(100, 5_000));
        assert_eq!(backfills[0].get_event_names(), vec!["ApprovalForAll".to_string()]);
    }

    #[tokio::test]
    async fn backfills_up_to_the_dispatch_mark_read_after_storing_the_application() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(100, "0xabc"));
        register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();
        repo.advance_dispatched_block(BAYC_CONTRACT_ADDRESS, 1_000).await.unwrap();

        let application = Application::new(
            "account",
            &BAYC_CONTRACT_ADDRESS.to_lowercase(),
            "Late",
            100,
            &["ApprovalForAll".to_string()],
        );
        repo.create_application(&application).await.unwrap();
        // a tick that read subscriptions earlier dispatches up to a new head
        repo.advance_dispatched_block(BAYC_CONTRACT_ADDRESS, 4_000).await.unwrap();

        maybe_backfill(&repo, &application).await.unwrap();

        let backfills = repo.get_pending_backfills().await.unwrap();
        assert_eq!(backfills.len(), 1);
        assert_eq!(backfills[0].get_range(), BlockRange::new(100, 4_000));
    }

    #[tokio::test]
    async fn does_not_backfill_ahead_of_the_contract() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(100, "0xabc"));
        register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();
        repo.set_checkpoint(BAYC_CONTRACT_ADDRESS, 5_000).await.unwrap();

        register(
            &repo,
            Some(&abi_source),
            &new_application(&["Transfer"]).with_start_block(6_000),
        )
        .await
        .unwrap();

        assert!(repo.get_pending_backfills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_and_gets_applications_per_account() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(100, "0xabc"));
        let application =
            register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();

        assert_eq!(list(&repo, "account").await.unwrap(), vec![application.clone()]);
        assert!(list(&repo, "someone-else").await.unwrap().is_empty());
        assert_eq!(get(&repo, "account", &application.id).await, Ok(application.clone()));
        assert_eq!(
            get(&repo, "someone-else", &application.id).await,
            Err(ApplicationError::NotFound(application.id.clone()))
        );
    }

    #[tokio::test]
    async fn deleting_the_last_application_stops_tracking_the_contract() {
        let repo = MemoryRepo::new();
        let abi_source = MockAbiSource::new(bayc_abi(), CreationInfo::new(100, "0xabc"));
        let first =
            register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();
        let second =
            register(&repo, Some(&abi_source), &new_application(&["Transfer"])).await.unwrap();
        repo.upsert_events(&indexed_transfers(3)).await.unwrap();

        delete(&repo, "account", &first.id).await.unwrap();
        assert!(repo.get_contract(BAYC_CONTRACT_ADDRESS).await.unwrap().is_some());

        delete(&repo, "account", &second.id).await.unwrap();
        assert!(repo.get_contract(BAYC_CONTRACT_ADDRESS).await.unwrap().is_none());
        assert_eq!(repo.event_count(), 0);
    }
}
