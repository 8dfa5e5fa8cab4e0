//! Classifier output types.
//!
//! The content-inspection engine is an external collaborator; these are
//! the typed findings it hands back for a scanned document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Byte range a finding was located at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// One sensitive-content finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Detected information type, e.g. `US_SOCIAL_SECURITY_NUMBER`.
    pub info_type: String,
    /// Classifier likelihood, e.g. `LIKELY`.
    #[serde(default)]
    pub likelihood: String,
    /// Matched text, when the classifier includes it.
    #[serde(default)]
    pub quote: Option<String>,
    /// Where in the document the match occurred.
    #[serde(default)]
    pub location: Option<ByteRange>,
}

/// Full classifier result for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default)]
    pub total_findings: u32,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Report with a finding count and no per-finding detail.
    pub fn with_count(total_findings: u32) -> Self {
        Self {
            total_findings,
            findings: Vec::new(),
        }
    }

    /// Distinct info types found, sorted.
    pub fn info_types(&self) -> Vec<String> {
        self.findings
            .iter()
            .map(|f| f.info_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
