//! The request/response boundary for embedding hosts.
//!
//! Commands and queries arrive as tagged JSON messages and every outcome,
//! including failure, goes back as a message. Hosts that link the crate
//! directly can skip this layer and call [`ConsentLedger`] methods; the
//! message layer exists for IPC and scripting surfaces that speak JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use consent_ledger_core::{ConsentAction, ConsentActionType, ConsentId};
use consent_ledger_store::LedgerBackend;

use crate::error::LedgerError;
use crate::ledger::ConsentLedger;
use crate::projection::{ConsentRecord, RecordFilter};
use crate::vault::VaultSnapshot;

/// An incoming message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ApiRequest {
    /// Record a consent request for an action.
    Request {
        action: ConsentAction,
        user_id: String,
    },
    /// Approve a pending consent.
    Approve { consent_id: ConsentId },
    /// Revoke a pending or approved consent.
    Revoke { consent_id: ConsentId },
    /// Fetch one record by id.
    Get { consent_id: ConsentId },
    /// List records, newest first, optionally filtered.
    List {
        #[serde(default)]
        filter: RecordFilter,
    },
    /// All non-revoked consents for a user.
    UserConsents { user_id: String },
    /// Whether the user's latest decision grants an action type.
    IsGranted {
        user_id: String,
        action_type: ConsentActionType,
    },
    /// Re-verify the whole hash chain.
    VerifyChain,
    /// Export the ledger as a versioned JSON document.
    Export,
    /// Export the ledger as a structured vault snapshot.
    VaultExport,
    /// Import a vault snapshot.
    Import { snapshot: VaultSnapshot },
}

/// The reply to an [`ApiRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApiResponse {
    /// A new consent was recorded.
    Requested { consent_id: ConsentId },
    /// A single record.
    Record { record: ConsentRecord },
    /// Zero or more records.
    Records { records: Vec<ConsentRecord> },
    /// Answer to `IsGranted`.
    Granted { granted: bool },
    /// Command or verification completed with nothing to return.
    Done,
    /// Snapshot appended; how many entries were new here.
    Imported { appended: u64 },
    /// The exported JSON ledger document.
    Document { document: String },
    /// The exported snapshot.
    Snapshot { snapshot: VaultSnapshot },
    /// Any failure, with a stable machine-readable code.
    Error { code: ErrorCode, message: String },
}

/// Stable error codes for message consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidTransition,
    Conflict,
    Integrity,
    UnsupportedSchema,
    Storage,
    Signature,
    Document,
}

impl From<&LedgerError> for ErrorCode {
    fn from(err: &LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => Self::NotFound,
            LedgerError::InvalidTransition { .. } => Self::InvalidTransition,
            LedgerError::Conflict { .. } => Self::Conflict,
            LedgerError::Integrity(_) => Self::Integrity,
            LedgerError::UnsupportedSchema(_) => Self::UnsupportedSchema,
            LedgerError::Storage(_) => Self::Storage,
            LedgerError::Signature(_) => Self::Signature,
            LedgerError::Document(_) => Self::Document,
        }
    }
}

impl ApiResponse {
    fn error(err: LedgerError) -> Self {
        Self::Error {
            code: ErrorCode::from(&err),
            message: err.to_string(),
        }
    }

    fn records(records: Vec<ConsentRecord>) -> Self {
        Self::Records { records }
    }
}

/// Message-level front end over a ledger.
pub struct ConsentApi<B: LedgerBackend> {
    ledger: Arc<ConsentLedger<B>>,
}

impl<B: LedgerBackend> ConsentApi<B> {
    pub fn new(ledger: Arc<ConsentLedger<B>>) -> Self {
        Self { ledger }
    }

    /// The ledger behind this front end.
    pub fn ledger(&self) -> &Arc<ConsentLedger<B>> {
        &self.ledger
    }

    /// Handle one message. Never returns `Err`; failures become
    /// [`ApiResponse::Error`].
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        debug!(?request, "handling api request");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => ApiResponse::error(err),
        }
    }

    async fn dispatch(&self, request: ApiRequest) -> crate::error::Result<ApiResponse> {
        Ok(match request {
            ApiRequest::Request { action, user_id } => {
                let consent_id = self.ledger.request_consent(action, user_id).await?;
                ApiResponse::Requested { consent_id }
            }
            ApiRequest::Approve { consent_id } => {
                self.ledger.approve(consent_id).await?;
                ApiResponse::Done
            }
            ApiRequest::Revoke { consent_id } => {
                self.ledger.revoke(consent_id).await?;
                ApiResponse::Done
            }
            ApiRequest::Get { consent_id } => ApiResponse::Record {
                record: self.ledger.get(&consent_id)?,
            },
            ApiRequest::List { filter } => ApiResponse::records(self.ledger.query(&filter)),
            ApiRequest::UserConsents { user_id } => {
                ApiResponse::records(self.ledger.user_consents(&user_id))
            }
            ApiRequest::IsGranted {
                user_id,
                action_type,
            } => ApiResponse::Granted {
                granted: self.ledger.is_granted(&user_id, action_type),
            },
            ApiRequest::VerifyChain => {
                self.ledger.verify_chain(0).await?;
                ApiResponse::Done
            }
            ApiRequest::Export => ApiResponse::Document {
                document: self.ledger.export_document().await?,
            },
            ApiRequest::VaultExport => ApiResponse::Snapshot {
                snapshot: self.ledger.export_snapshot().await?,
            },
            ApiRequest::Import { snapshot } => ApiResponse::Imported {
                appended: self.ledger.import_snapshot(&snapshot).await?,
            },
        })
    }
}
