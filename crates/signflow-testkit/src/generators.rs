//! Proptest generators for property-based testing.

use proptest::prelude::*;

use signflow_core::{
    DocumentId, Placement, SignerRequest, SigningTask, StoredEmbed, TaskStatus, UserId,
};

use crate::fixtures::{ORG, PAGE_HEIGHT, PAGE_WIDTH};

/// Generate a TaskStatus.
pub fn task_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::Signed),
        Just(TaskStatus::Rejected),
    ]
}

/// Tasks `1..=N` with arbitrary statuses, including states the gate could
/// never produce.
pub fn arbitrary_task_set(max: usize) -> impl Strategy<Value = Vec<SigningTask>> {
    prop::collection::vec(task_status(), 0..=max).prop_map(|statuses| {
        let doc = DocumentId::from_bytes([1; 16]);
        statuses
            .into_iter()
            .enumerate()
            .map(|(i, status)| {
                let mut task = SigningTask::new(doc, UserId::new(format!("s{i}")), i as u32 + 1, 0);
                task.status = status;
                task
            })
            .collect()
    })
}

/// Task sets the sequential gate can actually reach: a signed prefix,
/// optionally one rejection, then pending tasks.
pub fn reachable_task_set(max: usize) -> impl Strategy<Value = Vec<SigningTask>> {
    (1..=max.max(1))
        .prop_flat_map(|n| (Just(n), 0..=n, any::<bool>()))
        .prop_map(|(n, signed, rejected)| {
            let doc = DocumentId::from_bytes([2; 16]);
            (0..n)
                .map(|i| {
                    let mut task =
                        SigningTask::new(doc, UserId::new(format!("s{i}")), i as u32 + 1, 0);
                    task.status = if i < signed {
                        TaskStatus::Signed
                    } else if i == signed && rejected {
                        TaskStatus::Rejected
                    } else {
                        TaskStatus::Pending
                    };
                    task
                })
                .collect()
        })
}

/// A placement that fits on a Letter page.
pub fn placement(max_page: u32) -> impl Strategy<Value = Placement> {
    (1..=max_page.max(1), 1.0f32..200.0, 1.0f32..100.0).prop_flat_map(
        |(page, width, height)| {
            (0.0..PAGE_WIDTH - width, 0.0..PAGE_HEIGHT - height).prop_map(move |(x, y)| {
                Placement {
                    page,
                    x,
                    y,
                    width,
                    height,
                }
            })
        },
    )
}

/// A stored embed with a given image payload.
pub fn stored_embed(max_page: u32, image: String) -> impl Strategy<Value = StoredEmbed> {
    (placement(max_page), 0i64..=1_700_000_000_000i64).prop_map(move |(position, applied_at)| {
        StoredEmbed {
            position,
            image: image.clone(),
            applied_at,
        }
    })
}

/// Parameters for a signer list drawn from the sample organisation.
#[derive(Debug, Clone)]
pub struct SignerParams {
    /// Users from `ORG` plus unranked outsiders, each at most once.
    pub requests: Vec<SignerRequest>,
}

impl Arbitrary for SignerParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let pool: Vec<String> = ORG
            .iter()
            .map(|(user, _)| user.to_string())
            .chain((0..4).map(|i| format!("guest{i}")))
            .collect();
        let size = pool.len();
        (
            Just(pool).prop_shuffle(),
            1..=size,
            prop::collection::vec(0u32..5, size),
        )
            .prop_map(|(pool, take, requested)| SignerParams {
                requests: pool
                    .into_iter()
                    .take(take)
                    .zip(requested)
                    .map(|(user, order)| SignerRequest::new(user, order))
                    .collect(),
            })
            .boxed()
    }
}
