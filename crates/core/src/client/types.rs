//! Types exchanged with the processing service.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::item::ItemId;

/// One item handed to the processing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub id: ItemId,
    /// Name the file was uploaded under.
    pub file_name: String,
    /// Stored upload. `None` when the service resolves the id on its own.
    pub path: Option<PathBuf>,
}

impl ProcessingRequest {
    pub fn new(id: impl Into<ItemId>, file_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Successful response of the processing service for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Human readable status message.
    #[serde(rename = "msg", default)]
    pub message: String,
    /// Generated flowchart views, one location per view.
    #[serde(rename = "flowchart", default)]
    pub flowcharts: Vec<String>,
    /// Views not listed in `flowcharts` are served at `<prefix>_<ordinal>`.
    #[serde(skip)]
    pub view_url_prefix: Option<String>,
}

impl ProcessingResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            flowcharts: Vec::new(),
            view_url_prefix: None,
        }
    }

    pub fn with_flowcharts(mut self, flowcharts: Vec<String>) -> Self {
        self.flowcharts = flowcharts;
        self
    }

    pub fn with_view_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.view_url_prefix = Some(prefix.into());
        self
    }

    /// Where view `ordinal` can be fetched, if known.
    pub fn view_location(&self, ordinal: usize) -> Option<String> {
        self.flowcharts.get(ordinal).cloned().or_else(|| {
            self.view_url_prefix
                .as_ref()
                .map(|prefix| format!("{}_{}", prefix, ordinal))
        })
    }
}

/// Body returned by the service's upload endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadBody {
    pub file_id: String,
}

/// Error body returned by the processing service.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_success_body() {
        let json = r#"{"msg": "success", "flowchart": ["a.png", "b.png", "c.png"]}"#;
        let result: ProcessingResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.message, "success");
        assert_eq!(result.flowcharts.len(), 3);
    }

    #[test]
    fn test_deserialize_without_flowcharts() {
        let result: ProcessingResult = serde_json::from_str(r#"{"msg": "success"}"#).unwrap();
        assert!(result.flowcharts.is_empty());
    }

    #[test]
    fn test_view_location_prefers_payload() {
        let result = ProcessingResult::new("success")
            .with_flowcharts(vec!["http://svc/a.svg".into()])
            .with_view_url_prefix("http://svc/flowchart/abc");
        assert_eq!(result.view_location(0).as_deref(), Some("http://svc/a.svg"));
        assert_eq!(
            result.view_location(2).as_deref(),
            Some("http://svc/flowchart/abc_2")
        );
        assert!(ProcessingResult::new("success").view_location(0).is_none());
    }

    #[test]
    fn test_deserialize_upload_body() {
        let body: UploadBody = serde_json::from_str(
            r#"{"file_id": "0a1b", "filename": "survey.xml", "internal_filename": "0a1b.xml"}"#,
        )
        .unwrap();
        assert_eq!(body.file_id, "0a1b");
    }

    #[test]
    fn test_deserialize_error_body() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"msg": "file id not registered"}"#).unwrap();
        assert_eq!(body.msg.as_deref(), Some("file id not registered"));
    }
}
