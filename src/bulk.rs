//! Delete/move over a set of messages with per-item failure accounting.
//!
//! Every target is processed in order with exactly one gateway call. A
//! failure is recorded and the batch continues; only messages the gateway
//! confirmed are removed from the sender index.

use tracing::{debug, info, warn};

use crate::email::{MessageRecord, is_usable_identifier};
use crate::gateway::{GatewayError, MailGateway};
use crate::index::{RemoveOutcome, SenderIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Delete,
    Move,
}

/// A fully specified action. Moves carry a destination chosen beforehand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    Delete,
    Move {
        folder_id: String,
        folder_name: String,
    },
}

impl BulkAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            BulkAction::Delete => ActionKind::Delete,
            BulkAction::Move { .. } => ActionKind::Move,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            BulkAction::Delete => "Delete",
            BulkAction::Move { .. } => "Move",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            BulkAction::Delete => "Deleted",
            BulkAction::Move { .. } => "Moved",
        }
    }

    fn destination_suffix(&self) -> String {
        match self {
            BulkAction::Delete => String::new(),
            BulkAction::Move { folder_name, .. } => format!(" to {folder_name}"),
        }
    }

    fn apply(&self, gateway: &mut dyn MailGateway, id: &str) -> Result<(), GatewayError> {
        match self {
            BulkAction::Delete => gateway.delete_message(id),
            BulkAction::Move { folder_id, .. } => gateway.move_message(id, folder_id),
        }
    }
}

/// The parts of a message the executor needs: what to call, what to show,
/// and which bucket to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
    pub subject: Option<String>,
    pub domain_key: String,
}

impl MessageRef {
    pub fn from_record(record: &MessageRecord) -> Self {
        Self {
            id: record.id.clone(),
            subject: record.subject.clone(),
            domain_key: record.domain_key(),
        }
    }
}

/// A confirmed-to-be set of targets plus the action to run on them.
/// Consumed by [`BulkExecutor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkActionRequest {
    targets: Vec<MessageRef>,
    action: BulkAction,
}

impl BulkActionRequest {
    /// Returns None when there is nothing to act on
    pub fn new(targets: Vec<MessageRef>, action: BulkAction) -> Option<Self> {
        (!targets.is_empty()).then_some(Self { targets, action })
    }

    pub fn prompt(&self) -> ConfirmPrompt {
        let question = match self.targets.as_slice() {
            [single] => format!(
                "{} \"{}\"{}?",
                self.action.verb(),
                display_subject(single.subject.as_deref()),
                self.action.destination_suffix()
            ),
            targets => format!(
                "{} {} message(s){}?",
                self.action.verb(),
                targets.len(),
                self.action.destination_suffix()
            ),
        };

        ConfirmPrompt {
            title: format!(" {} ", self.action.verb()),
            lines: vec![question, "(y/n)".to_string()],
        }
    }
}

/// Text for a yes/no dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub lines: Vec<String>,
}

/// Asks the operator a yes/no question before anything remote happens
#[cfg_attr(test, mockall::automock)]
pub trait Confirm {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: String,
    pub subject: Option<String>,
    pub reason: String,
}

/// Counts and failures of one finished batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkReport {
    pub kind: ActionKind,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
    pub warnings: Vec<String>,
}

impl BulkReport {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.warnings.is_empty()
    }

    /// Lines for the report modal: totals, then every failed message
    pub fn summary_lines(&self) -> Vec<String> {
        let verb = match self.kind {
            ActionKind::Delete => "Deleted",
            ActionKind::Move => "Moved",
        };
        let mut lines = vec![format!(
            "{verb} {} of {} message(s), {} failed",
            self.succeeded, self.attempted, self.failed
        )];

        if !self.failures.is_empty() {
            lines.push(String::new());
            lines.push("Failed:".to_string());
            lines.extend(self.failures.iter().map(|f| {
                format!(
                    "  {} ({}): {}",
                    display_subject(f.subject.as_deref()),
                    if f.id.is_empty() { "no id" } else { &f.id },
                    f.reason
                )
            }));
        }

        if !self.warnings.is_empty() {
            lines.push(String::new());
            lines.extend(self.warnings.iter().cloned());
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// The operator declined; nothing was sent to the gateway
    Cancelled,
    /// The requested domains hold no indexed messages
    NoTargets,
    Completed(BulkReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorPhase {
    #[default]
    Idle,
    Confirming,
    Executing,
    Reporting,
}

/// Runs confirmed bulk actions and reconciles the index with their outcome
#[derive(Debug, Default)]
pub struct BulkExecutor {
    phase: ExecutorPhase,
}

impl BulkExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ExecutorPhase {
        self.phase
    }

    /// Called once the report has been shown
    pub fn acknowledge(&mut self) {
        self.phase = ExecutorPhase::Idle;
    }

    /// Confirms, then applies the action to each target in order. Each
    /// success is removed from the index right away under the message's
    /// own domain key.
    pub fn run(
        &mut self,
        request: BulkActionRequest,
        confirm: &mut dyn Confirm,
        gateway: &mut dyn MailGateway,
        index: &mut SenderIndex,
    ) -> BulkOutcome {
        if !self.confirmed(confirm, &request.prompt()) {
            return BulkOutcome::Cancelled;
        }

        let BulkActionRequest { targets, action } = request;
        let report = self.execute(&targets, &action, gateway, |target| {
            let outcome = index.remove_message(&target.domain_key, &target.id);
            debug!(id = %target.id, ?outcome, "reconciled index");
        });
        self.finish(report)
    }

    /// Applies the action to every indexed message of the given domains
    /// after a single confirmation.
    ///
    /// A domain whose messages all succeed is dropped in one call. A
    /// partially processed domain keeps its failed messages and gains a
    /// warning in the report.
    pub fn run_domains(
        &mut self,
        domain_keys: &[String],
        action: BulkAction,
        confirm: &mut dyn Confirm,
        gateway: &mut dyn MailGateway,
        index: &mut SenderIndex,
    ) -> BulkOutcome {
        let batches: Vec<(String, Vec<MessageRef>)> = domain_keys
            .iter()
            .filter_map(|key| index.bucket(key))
            .map(|bucket| {
                let refs = bucket.messages().iter().map(MessageRef::from_record).collect();
                (bucket.key().to_string(), refs)
            })
            .collect();

        let total: usize = batches.iter().map(|(_, refs)| refs.len()).sum();
        if total == 0 {
            return BulkOutcome::NoTargets;
        }

        let question = match batches.as_slice() {
            [(key, refs)] => format!(
                "{} all {} message(s) from {}{}?",
                action.verb(),
                refs.len(),
                key,
                action.destination_suffix()
            ),
            _ => format!(
                "{} all {} message(s) from {} domains{}?",
                action.verb(),
                total,
                batches.len(),
                action.destination_suffix()
            ),
        };
        let prompt = ConfirmPrompt {
            title: format!(" {} ", action.verb()),
            lines: vec![question, "(y/n)".to_string()],
        };
        if !self.confirmed(confirm, &prompt) {
            return BulkOutcome::Cancelled;
        }

        let mut report = BulkReport::new(action.kind());
        for (key, refs) in batches {
            let mut done: Vec<String> = Vec::new();
            let part = self.execute(&refs, &action, gateway, |target| {
                done.push(target.id.clone())
            });

            if part.failed == 0 {
                index.remove_domain(&key);
            } else if !done.is_empty() {
                let outcome = index.remove_messages(&key, &done);
                let remaining = match outcome {
                    RemoveOutcome::Removed { remaining } => remaining,
                    _ => 0,
                };
                report.warnings.push(format!(
                    "{} {} of {} message(s) from {}; {} remain indexed",
                    action.past_tense(),
                    part.succeeded,
                    part.attempted,
                    key,
                    remaining
                ));
            } else {
                report
                    .warnings
                    .push(format!("Nothing from {key} could be processed"));
            }

            report.attempted += part.attempted;
            report.succeeded += part.succeeded;
            report.failed += part.failed;
            report.failures.extend(part.failures);
        }
        self.finish(report)
    }

    fn confirmed(&mut self, confirm: &mut dyn Confirm, prompt: &ConfirmPrompt) -> bool {
        self.phase = ExecutorPhase::Confirming;
        if confirm.confirm(prompt) {
            self.phase = ExecutorPhase::Executing;
            true
        } else {
            debug!("bulk action cancelled");
            self.phase = ExecutorPhase::Idle;
            false
        }
    }

    fn execute(
        &self,
        targets: &[MessageRef],
        action: &BulkAction,
        gateway: &mut dyn MailGateway,
        mut on_success: impl FnMut(&MessageRef),
    ) -> BulkReport {
        let mut report = BulkReport::new(action.kind());

        for target in targets {
            report.attempted += 1;

            if !is_usable_identifier(&target.id) {
                warn!(subject = ?target.subject, "skipping message without identifier");
                report.record_failure(target, "message has no usable identifier".to_string());
                continue;
            }

            match action.apply(gateway, &target.id) {
                Ok(()) => {
                    report.succeeded += 1;
                    on_success(target);
                }
                Err(e) => {
                    warn!(id = %target.id, error = %e, "bulk action failed for message");
                    report.record_failure(target, e.to_string());
                }
            }
        }
        report
    }

    fn finish(&mut self, report: BulkReport) -> BulkOutcome {
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "bulk action finished"
        );
        self.phase = ExecutorPhase::Reporting;
        BulkOutcome::Completed(report)
    }
}

impl BulkReport {
    fn record_failure(&mut self, target: &MessageRef, reason: String) {
        self.failed += 1;
        self.failures.push(BulkFailure {
            id: target.id.clone(),
            subject: target.subject.clone(),
            reason,
        });
    }
}

fn display_subject(subject: Option<&str>) -> &str {
    match subject {
        Some(s) if !s.trim().is_empty() => s,
        _ => "(no subject)",
    }
}
