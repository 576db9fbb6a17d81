#[cfg(test)]
mod contracts {
    use contractwatch::{CheckpointError, CheckpointStore, Repo};

    use crate::factory::{bayc_abi, random_address, unsaved_contract};
    use crate::test_runner;

    #[tokio::test]
    pub async fn creating_a_contract_twice_keeps_the_first() {
        test_runner::run_test(|repo| async move {
            let address = random_address();

            let first = repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let second = repo.create_contract(&unsaved_contract(&address, 200)).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(second.creation_block, 100);
            assert_eq!(second.last_queried_block, -1);
            assert_eq!(second.last_dispatched_block, -1);
        })
        .await;
    }

    #[tokio::test]
    pub async fn checkpoints_never_move_backwards() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();

            repo.set_checkpoint(&address, 500).await.unwrap();

            assert!(matches!(
                repo.set_checkpoint(&address, 499).await,
                Err(CheckpointError::Regression { current: 500, attempted: 499, .. })
            ));
            assert_eq!(repo.set_checkpoint(&address, 500).await, Ok(()));
            assert_eq!(repo.get_checkpoint(&address).await, Ok(500));
        })
        .await;
    }

    #[tokio::test]
    pub async fn reports_untracked_checkpoints() {
        test_runner::run_test(|repo| async move {
            assert!(matches!(
                repo.get_checkpoint(&random_address()).await,
                Err(CheckpointError::NotTracked(_))
            ));
        })
        .await;
    }

    #[tokio::test]
    pub async fn dispatch_mark_only_moves_forward() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();

            repo.advance_dispatched_block(&address, 900).await.unwrap();
            repo.advance_dispatched_block(&address, 800).await.unwrap();

            let contract = repo.get_contract(&address).await.unwrap().unwrap();
            assert_eq!(contract.last_dispatched_block, 900);
        })
        .await;
    }

    #[tokio::test]
    pub async fn blocking_shows_in_the_status_until_the_abi_is_replaced() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            repo.upsert_pending_chunks(&address, &[contractwatch::BlockRange::new(100, 199)])
                .await
                .unwrap();

            repo.block_contract(&address, "log does not fit Transfer").await.unwrap();

            let statuses = repo.load_contract_statuses().await.unwrap();
            let status = statuses.iter().find(|status| status.address == address).unwrap();
            assert!(status.is_blocked());
            assert_eq!(status.indexing_error.as_deref(), Some("log does not fit Transfer"));
            assert_eq!(status.pending_chunks, 1);

            repo.update_contract_abi(&address, &bayc_abi()).await.unwrap();
            assert!(!repo.get_contract(&address).await.unwrap().unwrap().is_blocked());
        })
        .await;
    }
}

#[cfg(test)]
mod events {
    use contractwatch::{EventsQuery, Repo};

    use crate::factory::{indexed_transfers, random_address, unsaved_contract};
    use crate::test_runner;

    #[tokio::test]
    pub async fn upserting_the_same_events_twice_stores_them_once() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let events = indexed_transfers(&address, 5);

            assert_eq!(repo.upsert_events(&events).await, Ok(5));
            assert_eq!(repo.upsert_events(&events).await, Ok(0));

            let stored = repo.get_events(&EventsQuery::new(&address)).await.unwrap();
            assert_eq!(stored.len(), 5);
        })
        .await;
    }

    #[tokio::test]
    pub async fn concurrent_upserts_store_each_event_once() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let events = indexed_transfers(&address, 5);

            let (first, second) = tokio::join!(repo.upsert_events(&events), repo.upsert_events(&events));

            assert_eq!(first.unwrap() + second.unwrap(), 5);
            assert_eq!(repo.get_events(&EventsQuery::new(&address)).await.unwrap().len(), 5);
        })
        .await;
    }

    #[tokio::test]
    pub async fn queries_events_in_chain_order() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let mut events = indexed_transfers(&address, 5);
            events.reverse();
            repo.upsert_events(&events).await.unwrap();

            let query = EventsQuery::new(&address)
                .with_name("Transfer")
                .with_block_range(18_115_959, 18_115_962)
                .with_limit(2)
                .with_offset(1);
            let blocks: Vec<_> = repo
                .get_events(&query)
                .await
                .unwrap()
                .iter()
                .map(|event| event.block_number)
                .collect();

            assert_eq!(blocks, vec![18_115_960, 18_115_961]);
        })
        .await;
    }

    #[tokio::test]
    pub async fn deleting_a_contract_removes_its_events() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            repo.upsert_events(&indexed_transfers(&address, 3)).await.unwrap();

            repo.delete_contract(&address).await.unwrap();

            assert!(repo.get_contract(&address).await.unwrap().is_none());
            assert!(repo.get_events(&EventsQuery::new(&address)).await.unwrap().is_empty());
        })
        .await;
    }
}

#[cfg(test)]
mod chunks {
    use contractwatch::scheduler::ChunkStatus;
    use contractwatch::{BlockRange, Repo};

    use crate::factory::{random_address, unsaved_contract};
    use crate::test_runner;

    #[tokio::test]
    pub async fn tracks_the_chunk_lifecycle() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let ranges = [BlockRange::new(100, 199), BlockRange::new(200, 299)];

            repo.upsert_pending_chunks(&address, &ranges).await.unwrap();
            repo.complete_chunk(&address, &ranges[0]).await.unwrap();
            repo.fail_chunk(&address, &ranges[1], "timeout").await.unwrap();
            repo.fail_chunk(&address, &ranges[0], "late failure").await.unwrap();
            repo.upsert_pending_chunks(&address, &ranges[1..]).await.unwrap();

            let chunks = repo.get_chunks(&address).await.unwrap();
            assert_eq!(chunks[0].get_status(), ChunkStatus::Completed);
            assert_eq!(chunks[1].get_status(), ChunkStatus::Pending);
            assert_eq!(chunks[1].attempts, 2);

            repo.prune_chunks(&address, 199).await.unwrap();
            assert_eq!(repo.get_chunks(&address).await.unwrap().len(), 1);
        })
        .await;
    }
}

#[cfg(test)]
mod applications {
    use contractwatch::backfills::{Backfill, BackfillStatus};
    use contractwatch::{Application, BlockRange, Repo};

    use crate::factory::{random_address, unsaved_contract};
    use crate::test_runner;

    fn application(account_id: &str, address: &str) -> Application {
        Application::new(account_id, address, "Apes", 100, &["Transfer".to_string()])
    }

    #[tokio::test]
    pub async fn scopes_applications_to_their_account() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            let account_id = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let application = application(&account_id, &address);

            repo.create_application(&application).await.unwrap();

            let ids = |applications: Vec<Application>| -> Vec<String> {
                applications.into_iter().map(|application| application.id).collect()
            };
            assert_eq!(ids(repo.get_applications(&account_id).await.unwrap()), vec![
                application.id.clone()
            ]);
            assert_eq!(
                repo.get_application(&account_id, &application.id).await.unwrap().map(|a| a.id),
                Some(application.id.clone())
            );
            assert!(repo.get_application("someone-else", &application.id).await.unwrap().is_none());
            assert_eq!(repo.get_applications_by_contract(&address).await.unwrap().len(), 1);

            repo.delete_application(&application.id).await.unwrap();
            assert!(repo.get_applications(&account_id).await.unwrap().is_empty());
        })
        .await;
    }

    #[tokio::test]
    pub async fn tracks_backfill_outcomes() {
        test_runner::run_test(|repo| async move {
            let address = random_address();
            repo.create_contract(&unsaved_contract(&address, 100)).await.unwrap();
            let application = application("account", &address);
            repo.create_application(&application).await.unwrap();

            let backfill = Backfill::new(&application, BlockRange::new(100, 5_000));
            repo.create_backfill(&backfill).await.unwrap();
            repo.create_backfill(&backfill).await.unwrap();

            let pending = |backfills: Vec<Backfill>| {
                backfills.into_iter().filter(|b| b.application_id == application.id).count()
            };
            assert_eq!(pending(repo.get_pending_backfills().await.unwrap()), 1);

            repo.update_backfill_status(
                &application.id,
                BackfillStatus::Pending,
                Some("upstream unavailable: 503"),
            )
            .await
            .unwrap();
            assert_eq!(pending(repo.get_pending_backfills().await.unwrap()), 1);

            let statuses = repo.load_contract_statuses().await.unwrap();
            let status = statuses.iter().find(|status| status.address == address).unwrap();
            assert_eq!(status.pending_backfills, 1);
            assert_eq!(status.backfill_error.as_deref(), Some("upstream unavailable: 503"));

            repo.update_backfill_status(&application.id, BackfillStatus::Completed, None)
                .await
                .unwrap();
            assert_eq!(pending(repo.get_pending_backfills().await.unwrap()), 0);
        })
        .await;
    }
}
