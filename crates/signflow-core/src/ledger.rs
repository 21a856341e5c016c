//! The signature ledger: per-task state machine and document status derivation.
//!
//! A task moves `Pending → Signed` or `Pending → Rejected` exactly once, and
//! only when every task with a smaller `order` on the same document is
//! already `Signed`. Document status is a pure function of the task set.

use crate::document::DocumentStatus;
use crate::error::LedgerError;
use crate::task::{SigningTask, StoredEmbed, TaskStatus};

/// Whether `task` may leave `Pending` given its document's full task set.
pub fn can_transition(task: &SigningTask, all: &[SigningTask]) -> bool {
    check_transition(task, all).is_ok()
}

/// Check the sequential gate, naming the reason on failure.
///
/// A terminal document blocks every remaining task, independent of the
/// per-task order check.
pub fn check_transition(task: &SigningTask, all: &[SigningTask]) -> Result<(), LedgerError> {
    if !task.is_pending() {
        return Err(LedgerError::AlreadyResolved(task.id));
    }

    let status = derive_document_status(all);
    if status.is_terminal() {
        return Err(LedgerError::DocumentClosed(status));
    }

    let blocking = all
        .iter()
        .filter(|t| t.document_id == task.document_id && t.order < task.order)
        .filter(|t| t.status != TaskStatus::Signed)
        .map(|t| t.order)
        .min();

    match blocking {
        Some(blocking) => Err(LedgerError::OutOfOrder {
            order: task.order,
            blocking,
        }),
        None => Ok(()),
    }
}

/// Mark a task signed, optionally with its visual embed.
pub fn apply_signed(
    task: &mut SigningTask,
    embed: Option<StoredEmbed>,
    now: i64,
) -> Result<(), LedgerError> {
    if !task.status.can_become(TaskStatus::Signed) {
        return Err(LedgerError::AlreadyResolved(task.id));
    }
    task.status = TaskStatus::Signed;
    task.signed_at = Some(now);
    task.embed = embed;
    task.updated_at = now;
    Ok(())
}

/// Mark a task rejected.
pub fn apply_rejected(task: &mut SigningTask, now: i64) -> Result<(), LedgerError> {
    if !task.status.can_become(TaskStatus::Rejected) {
        return Err(LedgerError::AlreadyResolved(task.id));
    }
    task.status = TaskStatus::Rejected;
    task.updated_at = now;
    Ok(())
}

/// Derive a document's status from its task set.
///
/// `Rejected` if any task is rejected; else `Completed` if all are signed;
/// else `Signed` if some are; else `Pending`. No tasks means `Draft`.
pub fn derive_document_status(all: &[SigningTask]) -> DocumentStatus {
    if all.is_empty() {
        return DocumentStatus::Draft;
    }
    if all.iter().any(|t| t.status == TaskStatus::Rejected) {
        return DocumentStatus::Rejected;
    }
    let signed = all.iter().filter(|t| t.status == TaskStatus::Signed).count();
    if signed == all.len() {
        DocumentStatus::Completed
    } else if signed > 0 {
        DocumentStatus::Signed
    } else {
        DocumentStatus::Pending
    }
}

/// Check that task orders are exactly `1..=N`.
pub fn orders_are_contiguous(all: &[SigningTask]) -> bool {
    let mut orders: Vec<u32> = all.iter().map(|t| t.order).collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(i, &o)| o as usize == i + 1)
}

/// Embeds of signed tasks other than `exclude`, in chain order.
///
/// This is the replay log handed to the compositing engine.
pub fn replay_log<'a>(
    all: &'a [SigningTask],
    exclude: Option<&SigningTask>,
) -> Vec<&'a StoredEmbed> {
    let mut signed: Vec<&SigningTask> = all
        .iter()
        .filter(|t| t.status == TaskStatus::Signed)
        .filter(|t| exclude.map_or(true, |e| e.id != t.id))
        .collect();
    signed.sort_by_key(|t| t.order);
    signed.iter().filter_map(|t| t.embed.as_ref()).collect()
}
