//! Turning an approved draft into a tracker write.
//!
//! Whether a draft becomes a create or an update is decided by the pure
//! [`plan_commit`]; committers only execute the resulting request. Every
//! committer takes an [`ApprovedDraft`], so a rejected draft cannot reach one.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::core::evaluator::ApprovedDraft;
use crate::core::types::Draft;
use crate::io::trello::{Card, CardFields, CommitError, TrelloClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitAction {
    Create,
    Update,
}

impl CommitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitAction::Create => "create",
            CommitAction::Update => "update",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The write a draft maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRequest {
    /// New card at the top of `list_id`.
    Create { list_id: String, fields: CardFields },
    /// Overwrite name and description of `card_id`.
    Update { card_id: String, fields: CardFields },
}

impl CommitRequest {
    pub fn action(&self) -> CommitAction {
        match self {
            CommitRequest::Create { .. } => CommitAction::Create,
            CommitRequest::Update { .. } => CommitAction::Update,
        }
    }

    pub fn fields(&self) -> &CardFields {
        match self {
            CommitRequest::Create { fields, .. } | CommitRequest::Update { fields, .. } => fields,
        }
    }
}

/// A successful tracker write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub action: CommitAction,
    pub card_id: Option<String>,
    pub short_url: Option<String>,
    /// Human-readable confirmation; becomes the run's final result.
    pub message: String,
}

/// Executes one tracker write per call.
pub trait Committer {
    fn commit(&self, approved: &ApprovedDraft) -> Result<CommitReceipt, CommitError>;
}

/// Map a draft to its create-or-update request. A present `existing_id`
/// always means update; otherwise the card is created in `list_id`.
pub fn plan_commit(draft: &Draft, list_id: &str) -> CommitRequest {
    let fields = CardFields {
        name: draft.card_name(),
        desc: draft.description.clone(),
    };
    match draft.existing_id.as_deref() {
        Some(card_id) => CommitRequest::Update {
            card_id: card_id.to_string(),
            fields,
        },
        None => CommitRequest::Create {
            list_id: list_id.to_string(),
            fields,
        },
    }
}

pub struct TrelloCommitter {
    client: TrelloClient,
    list_id: String,
}

impl TrelloCommitter {
    pub fn new(client: TrelloClient, list_id: impl Into<String>) -> Self {
        Self {
            client,
            list_id: list_id.into(),
        }
    }
}

impl Committer for TrelloCommitter {
    fn commit(&self, approved: &ApprovedDraft) -> Result<CommitReceipt, CommitError> {
        let request = plan_commit(approved.draft(), &self.list_id);
        let card = match &request {
            CommitRequest::Create { list_id, fields } => self.client.create_card(list_id, fields)?,
            CommitRequest::Update { card_id, fields } => self.client.update_card(card_id, fields)?,
        };
        info!(action = %request.action(), card_id = %card.id, "card written");
        Ok(receipt(request.action(), card))
    }
}

fn receipt(action: CommitAction, card: Card) -> CommitReceipt {
    let verb = match action {
        CommitAction::Create => "Created",
        CommitAction::Update => "Updated",
    };
    let reference = card.short_url.as_deref().unwrap_or(&card.id);
    CommitReceipt {
        action,
        message: format!("SUCCESS: {verb} card {reference}"),
        card_id: Some(card.id.clone()),
        short_url: card.short_url,
    }
}

/// Reports the write it would make without touching the tracker.
#[derive(Debug, Clone)]
pub struct DryRunCommitter {
    list_id: String,
}

impl DryRunCommitter {
    pub fn new(list_id: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
        }
    }
}

impl Committer for DryRunCommitter {
    fn commit(&self, approved: &ApprovedDraft) -> Result<CommitReceipt, CommitError> {
        let request = plan_commit(approved.draft(), &self.list_id);
        let name = &request.fields().name;
        let (message, card_id) = match &request {
            CommitRequest::Create { list_id, .. } => (
                format!("DRY RUN: would create card '{name}' in list {list_id}"),
                None,
            ),
            CommitRequest::Update { card_id, .. } => (
                format!("DRY RUN: would update card {card_id} to '{name}'"),
                Some(card_id.clone()),
            ),
        };
        Ok(CommitReceipt {
            action: request.action(),
            card_id,
            short_url: None,
            message,
        })
    }
}
