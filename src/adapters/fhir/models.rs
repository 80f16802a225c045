//! FHIR REST API models
//!
//! Wire structures for search responses. Resources inside an entry are kept
//! as raw JSON until the caller asks for a typed view, so one page can carry
//! several resource types (e.g. an `OperationOutcome` next to the matches).

use crate::domain::FhirResource;
use serde::{Deserialize, Serialize};

/// Link relation that points at the following page of a search
pub const NEXT_RELATION: &str = "next";

/// FHIR Bundle (simplified for search responses)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "bundle_resource_type")]
    pub resource_type: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

/// A matching entry that could not be read as the requested resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Logical id, when the entry carries a string `id`
    pub id: Option<String>,
    pub reason: String,
}

/// Typed resources of one page plus the entries that failed to deserialize
#[derive(Debug, Clone)]
pub struct ResourcePage<R> {
    pub resources: Vec<R>,
    pub rejected: Vec<RejectedEntry>,
}

/// Navigation link of a Bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

/// One entry of a Bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
}

impl BundleEntry {
    fn resource_type(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|r| r.get("resourceType"))
            .and_then(|t| t.as_str())
    }
}

impl Bundle {
    /// Creates a searchset bundle holding the given resources
    ///
    /// Used for tests and fakes of [`FhirSearch`](super::FhirSearch).
    pub fn searchset(resources: Vec<serde_json::Value>, next: Option<&str>) -> Self {
        Self {
            resource_type: bundle_resource_type(),
            bundle_type: Some("searchset".to_string()),
            total: None,
            link: next
                .map(|url| BundleLink {
                    relation: NEXT_RELATION.to_string(),
                    url: url.to_string(),
                })
                .into_iter()
                .collect(),
            entry: resources
                .into_iter()
                .map(|resource| BundleEntry {
                    full_url: None,
                    resource: Some(resource),
                })
                .collect(),
        }
    }

    /// URL of the next page, if the server reported one
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == NEXT_RELATION)
            .map(|l| l.url.as_str())
    }

    /// Typed resources of this page, in entry order
    ///
    /// Entries whose `resourceType` differs from `R` are skipped. A matching
    /// entry that does not deserialize (e.g. a number where a string belongs)
    /// is returned in [`ResourcePage::rejected`] and does not affect the
    /// other entries.
    pub fn into_resources<R: FhirResource>(self) -> ResourcePage<R> {
        let mut page = ResourcePage {
            resources: Vec::with_capacity(self.entry.len()),
            rejected: Vec::new(),
        };

        for entry in self.entry {
            match entry.resource_type() {
                Some(t) if t == R::RESOURCE_TYPE => {}
                other => {
                    tracing::debug!(
                        expected = R::RESOURCE_TYPE,
                        found = ?other,
                        full_url = ?entry.full_url,
                        "Skipping bundle entry of another resource type"
                    );
                    continue;
                }
            }

            let Some(value) = entry.resource else {
                continue;
            };
            let id = value
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);

            match serde_json::from_value(value) {
                Ok(resource) => page.resources.push(resource),
                Err(e) => page.rejected.push(RejectedEntry {
                    id,
                    reason: e.to_string(),
                }),
            }
        }

        page
    }
}

fn bundle_resource_type() -> String {
    "Bundle".to_string()
}
