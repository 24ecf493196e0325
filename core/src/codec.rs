//! Moving file contents in and out of the envelope's `data` field.
//!
//! Binary fields (pack files, configs archives) travel as standard base64;
//! text fields (version XML, version JSON) travel verbatim. The codec is an
//! explicit argument so callers never rely on which overload they picked.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::types::{ApiResponse, FileUpload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadCodec {
    /// UTF-8 text carried as-is.
    Raw,
    /// Arbitrary bytes carried as padded standard base64.
    Base64,
}

/// Confirmation that a response payload landed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub path: PathBuf,
    pub bytes: usize,
}

impl fmt::Display for Saved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Saved to {}!", self.path.display())
    }
}

impl PayloadCodec {
    pub fn encode(self, bytes: &[u8]) -> Option<String> {
        match self {
            PayloadCodec::Raw => std::str::from_utf8(bytes).ok().map(str::to_string),
            PayloadCodec::Base64 => Some(STANDARD.encode(bytes)),
        }
    }

    /// Turn an envelope's `data` value back into file bytes. Non-string data
    /// under `Raw` is written as pretty-printed JSON.
    pub fn decode(self, data: &Value) -> Result<Vec<u8>, ApiError> {
        match (self, data) {
            (PayloadCodec::Raw, Value::String(text)) => Ok(text.as_bytes().to_vec()),
            (PayloadCodec::Raw, other) => {
                serde_json::to_vec_pretty(other).map_err(|e| ApiError::Serialization(e.to_string()))
            }
            (PayloadCodec::Base64, Value::String(encoded)) => Ok(STANDARD.decode(encoded.trim())?),
            (PayloadCodec::Base64, other) => Err(ApiError::Deserialization(format!(
                "expected a base64 string, found {other}"
            ))),
        }
    }
}

/// Read `path` and wrap its contents as an upload payload.
pub fn read_upload(path: &Path, codec: PayloadCodec) -> Result<FileUpload, ApiError> {
    let bytes = fs::read(path).map_err(|source| ApiError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), ?codec, "read upload");
    let data = codec.encode(&bytes).ok_or_else(|| ApiError::NotUtf8 {
        path: path.to_path_buf(),
    })?;
    Ok(FileUpload { data })
}

/// Write an envelope's `data` to `dest`.
///
/// An error envelope is returned as `ApiError::Service` and nothing is
/// written.
pub fn save_response(response: ApiResponse, dest: &Path, codec: PayloadCodec) -> Result<Saved, ApiError> {
    if response.is_error() {
        return Err(ApiError::Service {
            code: response.code,
            message: response.message.unwrap_or_default(),
        });
    }
    let data = response.data.ok_or(ApiError::MissingData)?;
    let bytes = codec.decode(&data)?;

    fs::write(dest, &bytes).map_err(|source| ApiError::WriteFile {
        path: dest.to_path_buf(),
        source,
    })?;
    debug!(path = %dest.display(), bytes = bytes.len(), ?codec, "saved response");

    Ok(Saved {
        path: dest.to_path_buf(),
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_envelope(data: Value) -> ApiResponse {
        ApiResponse {
            error: false,
            code: Some(200),
            message: None,
            data: Some(data),
        }
    }

    #[test]
    fn base64_upload_then_save_reproduces_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mods.zip");
        let original: Vec<u8> = (0u8..=255).chain([0, 0, 0xff]).collect();
        fs::write(&source, &original).unwrap();

        let upload = read_upload(&source, PayloadCodec::Base64).unwrap();
        assert_eq!(upload.data, STANDARD.encode(&original));

        let dest = dir.path().join("copy.zip");
        let saved = save_response(ok_envelope(json!(upload.data)), &dest, PayloadCodec::Base64).unwrap();
        assert_eq!(saved.bytes, original.len());
        assert_eq!(fs::read(&dest).unwrap(), original);
    }

    #[test]
    fn raw_upload_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("version.xml");
        fs::write(&source, "<version>1.0.0</version>").unwrap();

        let upload = read_upload(&source, PayloadCodec::Raw).unwrap();
        assert_eq!(upload.data, "<version>1.0.0</version>");
    }

    #[test]
    fn raw_upload_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("blob.bin");
        fs::write(&source, [0xff, 0xfe, 0x00]).unwrap();

        let err = read_upload(&source, PayloadCodec::Raw).unwrap_err();
        assert!(matches!(err, ApiError::NotUtf8 { .. }));
    }

    #[test]
    fn missing_upload_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_upload(&dir.path().join("absent.txt"), PayloadCodec::Base64).unwrap_err();
        assert!(matches!(err, ApiError::ReadFile { .. }));
    }

    #[test]
    fn save_writes_raw_string_and_confirms() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("version.xml");
        let saved = save_response(ok_envelope(json!("<xml/>")), &dest, PayloadCodec::Raw).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "<xml/>");
        assert_eq!(saved.to_string(), format!("Saved to {}!", dest.display()));
    }

    #[test]
    fn save_pretty_prints_json_objects() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("version.json");
        save_response(ok_envelope(json!({"mods": []})), &dest, PayloadCodec::Raw).unwrap();
        let written: Value = serde_json::from_slice(&fs::read(&dest).unwrap()).unwrap();
        assert_eq!(written, json!({"mods": []}));
    }

    #[test]
    fn save_skips_error_envelopes() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("never.zip");
        let envelope = ApiResponse {
            error: true,
            code: Some(404),
            message: Some("File not found".into()),
            data: None,
        };
        let err = save_response(envelope, &dest, PayloadCodec::Base64).unwrap_err();
        assert!(matches!(err, ApiError::Service { code: Some(404), .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn save_requires_data() {
        let dir = tempfile::tempdir().unwrap();
        let envelope = ApiResponse {
            error: false,
            code: Some(200),
            message: None,
            data: None,
        };
        let err = save_response(envelope, &dir.path().join("x"), PayloadCodec::Raw).unwrap_err();
        assert!(matches!(err, ApiError::MissingData));
    }

    #[test]
    fn save_rejects_bad_base64() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_response(ok_envelope(json!("not base64!")), &dir.path().join("x"), PayloadCodec::Base64)
            .unwrap_err();
        assert!(matches!(err, ApiError::Base64(_)));
    }

    #[test]
    fn save_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing-dir").join("file.xml");
        let err = save_response(ok_envelope(json!("x")), &dest, PayloadCodec::Raw).unwrap_err();
        assert!(matches!(err, ApiError::WriteFile { .. }));
    }
}
