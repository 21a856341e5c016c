//! Property tests across the ledger, the hierarchy sorter and the store.

use std::collections::HashMap;

use proptest::prelude::*;

use signflow_core::{
    apply_signed, check_transition, derive_document_status, replay_log, sort_signers,
    DocumentStatus, LedgerError, RankTable, TaskStatus, UserId,
};
use signflow_store::{MemoryStore, Outcome, Resolution, Store, StoreError};
use signflow_testkit::fixtures::{png_signature, ORG};
use signflow_testkit::generators::{
    arbitrary_task_set, reachable_task_set, stored_embed, SignerParams,
};

fn org_ranks() -> impl Fn(&UserId) -> u32 {
    let table = RankTable::default();
    let titles: HashMap<UserId, &'static str> = ORG
        .iter()
        .map(|(user, title)| (UserId::new(*user), *title))
        .collect();
    move |id| table.rank_of(titles.get(id).copied())
}

proptest! {
    #[test]
    fn status_follows_the_task_set(tasks in arbitrary_task_set(8)) {
        let status = derive_document_status(&tasks);
        let any_rejected = tasks.iter().any(|t| t.status == TaskStatus::Rejected);
        let all_signed = tasks.iter().all(|t| t.status == TaskStatus::Signed);
        let any_signed = tasks.iter().any(|t| t.status == TaskStatus::Signed);

        let expected = if tasks.is_empty() {
            DocumentStatus::Draft
        } else if any_rejected {
            DocumentStatus::Rejected
        } else if all_signed {
            DocumentStatus::Completed
        } else if any_signed {
            DocumentStatus::Signed
        } else {
            DocumentStatus::Pending
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn resolved_tasks_never_move(tasks in arbitrary_task_set(6)) {
        for task in tasks.iter().filter(|t| !t.is_pending()) {
            prop_assert!(matches!(
                check_transition(task, &tasks),
                Err(LedgerError::AlreadyResolved(_))
            ));
            let mut copy = task.clone();
            prop_assert!(apply_signed(&mut copy, None, 1).is_err());
            prop_assert_eq!(&copy, task);
        }
    }

    #[test]
    fn gate_opens_only_behind_signed_prefix(tasks in reachable_task_set(8)) {
        for task in &tasks {
            let lower_all_signed = tasks
                .iter()
                .filter(|t| t.order < task.order)
                .all(|t| t.status == TaskStatus::Signed);
            let allowed = check_transition(task, &tasks).is_ok();
            if allowed {
                prop_assert!(task.is_pending() && lower_all_signed);
            }
            if task.is_pending() && !lower_all_signed && !derive_document_status(&tasks).is_terminal() {
                let blocked = matches!(
                    check_transition(task, &tasks),
                    Err(LedgerError::OutOfOrder { .. })
                );
                prop_assert!(blocked);
            }
        }
    }

    #[test]
    fn replay_log_follows_chain_order(
        tasks in arbitrary_task_set(8),
        embeds in prop::collection::vec(stored_embed(3, png_signature(4, 2, 255)), 8),
        skip in any::<Option<prop::sample::Index>>(),
    ) {
        // Attach embeds to signed tasks, listed in reverse chain order.
        let mut tasks: Vec<_> = tasks
            .into_iter()
            .zip(embeds)
            .map(|(mut task, embed)| {
                if task.status == TaskStatus::Signed {
                    task.embed = Some(embed);
                }
                task
            })
            .collect();
        tasks.reverse();
        let exclude = skip
            .filter(|_| !tasks.is_empty())
            .map(|i| tasks[i.index(tasks.len())].clone());

        let log = replay_log(&tasks, exclude.as_ref());
        let orders: Vec<u32> = log
            .iter()
            .filter_map(|embed| {
                tasks
                    .iter()
                    .find(|t| t.embed.as_ref().is_some_and(|own| std::ptr::eq(own, *embed)))
                    .map(|t| t.order)
            })
            .collect();
        prop_assert_eq!(orders.len(), log.len());
        prop_assert!(orders.windows(2).all(|w| w[0] < w[1]));

        let replayable = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Signed)
            .filter(|t| exclude.as_ref().map_or(true, |e| e.id != t.id))
            .count();
        prop_assert_eq!(log.len(), replayable);
    }

    #[test]
    fn ranked_signers_precede_unranked(params: SignerParams) {
        let rank_of = org_ranks();
        let chain = sort_signers(&params.requests, &rank_of);

        prop_assert_eq!(chain.len(), params.requests.len());
        let orders: Vec<u32> = chain.iter().map(|s| s.order).collect();
        prop_assert_eq!(orders, (1..=chain.len() as u32).collect::<Vec<_>>());

        let ranks: Vec<u32> = chain.iter().map(|s| rank_of(&s.signer_id)).collect();
        prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn store_commits_follow_the_gate_for_any_signing_order() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut runner = proptest::test_runner::TestRunner::default();
    let strategy = (2usize..6).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle());

    runner
        .run(&strategy, |attempt_order| {
            runtime.block_on(async {
                let store = MemoryStore::new();
                let doc_id = signflow_core::DocumentId::generate();
                let tasks: Vec<_> = (0..attempt_order.len())
                    .map(|i| {
                        signflow_core::SigningTask::new(
                            doc_id,
                            UserId::new(format!("u{i}")),
                            i as u32 + 1,
                            0,
                        )
                    })
                    .collect();
                let document = signflow_core::Document {
                    id: doc_id,
                    title: "t".into(),
                    description: None,
                    original_blob: signflow_core::BlobLocator::new("o"),
                    composite_blob: None,
                    file_name: "t.pdf".into(),
                    file_size: 1,
                    status: DocumentStatus::Pending,
                    created_by: UserId::new("owner"),
                    created_at: 0,
                    updated_at: 0,
                };
                store.insert_document(&document, &tasks).await.unwrap();

                // Attempt every task in a shuffled order; only the next in
                // line may succeed, and the rest must leave state untouched.
                let mut signed = 0usize;
                for _ in 0..attempt_order.len() {
                    for &i in &attempt_order {
                        let result = store
                            .commit_resolution(&Resolution {
                                task_id: tasks[i].id,
                                outcome: Outcome::Signed { embed: None },
                                composite: None,
                                at: 10,
                            })
                            .await;
                        match result {
                            Ok(resolved) => {
                                prop_assert_eq!(i, signed);
                                prop_assert_eq!(resolved.task.order as usize, i + 1);
                                signed += 1;
                            }
                            Err(StoreError::Ledger(LedgerError::OutOfOrder { .. }))
                            | Err(StoreError::Ledger(LedgerError::AlreadyResolved(_))) => {}
                            Err(other) => {
                                return Err(TestCaseError::fail(other.to_string()));
                            }
                        }
                    }
                }
                prop_assert_eq!(signed, attempt_order.len());
                let document = store.get_document(&doc_id).await.unwrap().unwrap();
                prop_assert_eq!(document.status, DocumentStatus::Completed);
                Ok(())
            })
        })
        .unwrap();
}
