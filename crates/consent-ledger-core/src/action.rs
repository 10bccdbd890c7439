//! The consent action model: what the agent wants to do, and how risky it is.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// The closed set of agent actions that require user consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentActionType {
    Download,
    FormSubmit,
    Login,
    Scrape,
    ExportData,
    AccessClipboard,
    AccessCamera,
    AccessMicrophone,
    AccessFilesystem,
    AiCloud,
}

impl ConsentActionType {
    /// Compact code used in the canonical entry encoding.
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Download => 0,
            Self::FormSubmit => 1,
            Self::Login => 2,
            Self::Scrape => 3,
            Self::ExportData => 4,
            Self::AccessClipboard => 5,
            Self::AccessCamera => 6,
            Self::AccessMicrophone => 7,
            Self::AccessFilesystem => 8,
            Self::AiCloud => 9,
        }
    }

    /// Try to parse from a wire code.
    pub fn from_wire_code(code: u8) -> Result<Self, CoreError> {
        match code {
            0 => Ok(Self::Download),
            1 => Ok(Self::FormSubmit),
            2 => Ok(Self::Login),
            3 => Ok(Self::Scrape),
            4 => Ok(Self::ExportData),
            5 => Ok(Self::AccessClipboard),
            6 => Ok(Self::AccessCamera),
            7 => Ok(Self::AccessMicrophone),
            8 => Ok(Self::AccessFilesystem),
            9 => Ok(Self::AiCloud),
            other => Err(CoreError::UnknownActionType(other)),
        }
    }

    /// The snake_case name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::FormSubmit => "form_submit",
            Self::Login => "login",
            Self::Scrape => "scrape",
            Self::ExportData => "export_data",
            Self::AccessClipboard => "access_clipboard",
            Self::AccessCamera => "access_camera",
            Self::AccessMicrophone => "access_microphone",
            Self::AccessFilesystem => "access_filesystem",
            Self::AiCloud => "ai_cloud",
        }
    }

    /// All action types, for iteration in tests and UIs.
    pub const ALL: [ConsentActionType; 10] = [
        Self::Download,
        Self::FormSubmit,
        Self::Login,
        Self::Scrape,
        Self::ExportData,
        Self::AccessClipboard,
        Self::AccessCamera,
        Self::AccessMicrophone,
        Self::AccessFilesystem,
        Self::AiCloud,
    ];
}

impl fmt::Display for ConsentActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How risky an action is, as presented to the user at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Compact code used in the canonical entry encoding.
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Try to parse from a wire code.
    pub fn from_wire_code(code: u8) -> Result<Self, CoreError> {
        match code {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            other => Err(CoreError::UnknownRiskLevel(other)),
        }
    }
}

/// A sensitive action the agent asks permission for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentAction {
    /// Which kind of action.
    #[serde(rename = "type")]
    pub action_type: ConsentActionType,

    /// Risk presented to the user.
    pub risk: RiskLevel,

    /// Human-readable description shown at decision time.
    pub description: String,

    /// Optional target (URL, file path, device name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ConsentAction {
    /// Build an action without a target.
    pub fn new(
        action_type: ConsentActionType,
        risk: RiskLevel,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            risk,
            description: description.into(),
            target: None,
        }
    }

    /// Attach a target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}
