//! Wire DTOs for the pack service.
//!
//! # Design
//! Payloads stay as `serde_json::Value`: the client forwards what the service
//! returns and leaves modelling packs, versions and players to the caller.
//! Only the response envelope and the path selectors are typed here.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// The envelope every service response is wrapped in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default, deserialize_with = "bool_like")]
    pub error: bool,
    #[serde(default, deserialize_with = "code_like", skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Unwrap the `data` field, turning an error envelope into
    /// `ApiError::Service`. A success envelope without data yields `Null`.
    pub fn into_data(self) -> Result<Value, ApiError> {
        if self.error {
            return Err(ApiError::Service {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        Ok(self.data.unwrap_or(Value::Null))
    }

    /// Like `into_data`, then deserialize into a caller-chosen type.
    pub fn data_as<T: serde::de::DeserializeOwned>(self) -> Result<T, ApiError> {
        let data = self.into_data()?;
        serde_json::from_value(data).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Accepts `true`/`false`, `0`/`1` and their string spellings.
fn bool_like<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(serde::de::Error::custom(format!("not a boolean: {other:?}"))),
        },
        other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
    }
}

/// Accepts a status code as a number or a numeric string.
fn code_like<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("not a status code: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a status code: {s:?}"))),
        other => Err(serde::de::Error::custom(format!("not a status code: {other}"))),
    }
}

/// Which slice of the full pack listing to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackVisibility {
    All,
    Public,
    SemiPublic,
    Private,
}

impl PackVisibility {
    pub fn as_segment(self) -> &'static str {
        match self {
            PackVisibility::All => "all",
            PackVisibility::Public => "public",
            PackVisibility::SemiPublic => "semipublic",
            PackVisibility::Private => "private",
        }
    }
}

/// Which launcher artifact the download counters refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    All,
    Exe,
    Jar,
    Zip,
}

impl DownloadKind {
    pub fn as_segment(self) -> &'static str {
        match self {
            DownloadKind::All => "all",
            DownloadKind::Exe => "exe",
            DownloadKind::Jar => "jar",
            DownloadKind::Zip => "zip",
        }
    }
}

/// A per-pack list of usernames managed under `settings/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerList {
    AllowedPlayers,
    Testers,
}

impl PlayerList {
    pub fn as_segment(self) -> &'static str {
        match self {
            PlayerList::AllowedPlayers => "allowedplayers",
            PlayerList::Testers => "testers",
        }
    }
}

/// Request payload for file, XML and configs uploads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileUpload {
    pub data: String,
}
