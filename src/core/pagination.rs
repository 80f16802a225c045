//! Lazy pagination over FHIR search results
//!
//! [`paginate`] turns a search capability into a flat stream of typed
//! resources. Pages are fetched on demand: the first search runs when the
//! stream is first polled and a `next` link is only followed once every
//! resource of the current page has been consumed.

use super::events::{EventSink, PipelineEvent};
use crate::adapters::fhir::FhirSearch;
use crate::domain::{CapacityError, FhirError, FhirResource, Result};
use futures::stream::{self, Stream, TryStreamExt};

enum Cursor {
    First,
    Next { url: String, page: usize },
    Exhausted,
}

/// Streams every `R` resource of an unfiltered search, following `next` links
///
/// The stream is single-pass. Dropping it stops all further page fetches.
/// A failing follow-up fetch yields [`FhirError::PageRetrieval`] and ends the
/// stream. Entries that cannot be read as `R` are reported to `events` as
/// [`PipelineEvent::InvalidResource`] and skipped.
///
/// # Example
///
/// ```no_run
/// use capacity_mapping::adapters::fhir::FhirClient;
/// use capacity_mapping::config::FhirConfig;
/// use capacity_mapping::core::events::TracingEventSink;
/// use capacity_mapping::core::pagination::paginate;
/// use capacity_mapping::domain::Patient;
/// use futures::{StreamExt, TryStreamExt};
///
/// # async fn example() -> capacity_mapping::domain::Result<()> {
/// let client = FhirClient::new(FhirConfig::default())?;
/// let first_ten: Vec<Patient> = paginate::<Patient, _>(&client, &TracingEventSink)
///     .take(10)
///     .try_collect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn paginate<'a, R, S>(
    search: &'a S,
    events: &'a dyn EventSink,
) -> impl Stream<Item = Result<R>> + Send + 'a
where
    R: FhirResource,
    S: FhirSearch + ?Sized,
{
    let pages = stream::try_unfold(Cursor::First, move |cursor| async move {
        let (bundle, page) = match cursor {
            Cursor::First => (search.search(R::RESOURCE_TYPE).await?, 1),
            Cursor::Next { url, page } => {
                let bundle = search.fetch_page(&url).await.map_err(|e| {
                    CapacityError::Fhir(FhirError::PageRetrieval {
                        url: url.clone(),
                        reason: e.to_string(),
                    })
                })?;
                (bundle, page)
            }
            Cursor::Exhausted => return Ok::<_, CapacityError>(None),
        };

        let next = match bundle.next_link() {
            Some(url) => Cursor::Next {
                url: url.to_string(),
                page: page + 1,
            },
            None => Cursor::Exhausted,
        };

        let fetched = bundle.into_resources::<R>();
        for rejected in fetched.rejected {
            events.emit(PipelineEvent::InvalidResource {
                resource_type: R::RESOURCE_TYPE,
                id: rejected.id,
                reason: rejected.reason,
            });
        }
        let resources = fetched.resources;
        tracing::debug!(
            resource_type = R::RESOURCE_TYPE,
            page,
            resources = resources.len(),
            has_next = matches!(next, Cursor::Next { .. }),
            "Retrieved search page"
        );

        Ok::<_, CapacityError>(Some((resources, next)))
    });

    pages
        .map_ok(|resources| stream::iter(resources.into_iter().map(Ok)))
        .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fhir::Bundle;
    use crate::core::events::{CollectingEventSink, TracingEventSink};
    use crate::domain::Patient;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed set of pages and counts every request
    struct PagedServer {
        first: Bundle,
        pages: HashMap<String, Bundle>,
        requests: AtomicUsize,
    }

    impl PagedServer {
        fn new(page_count: usize) -> Self {
            let page = |n: usize| {
                let next = (n < page_count).then(|| format!("http://fhir/page{}", n + 1));
                Bundle::searchset(
                    vec![
                        json!({"resourceType": "Patient", "id": format!("{n}a")}),
                        json!({"resourceType": "Patient", "id": format!("{n}b")}),
                    ],
                    next.as_deref(),
                )
            };

            Self {
                first: page(1),
                pages: (2..=page_count)
                    .map(|n| (format!("http://fhir/page{n}"), page(n)))
                    .collect(),
                requests: AtomicUsize::new(0),
            }
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FhirSearch for PagedServer {
        async fn search(&self, resource_type: &str) -> Result<Bundle> {
            assert_eq!(resource_type, "Patient");
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.first.clone())
        }

        async fn fetch_page(&self, url: &str) -> Result<Bundle> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| {
                CapacityError::Fhir(FhirError::ServerError {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            })
        }

        fn base_url(&self) -> &str {
            "http://fhir"
        }
    }

    fn ids(patients: &[Patient]) -> Vec<&str> {
        patients.iter().filter_map(|p| p.id.as_deref()).collect()
    }

    #[tokio::test]
    async fn test_follows_next_links_until_exhausted() {
        let server = PagedServer::new(3);
        let patients: Vec<Patient> = paginate(&server, &TracingEventSink)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids(&patients), vec!["1a", "1b", "2a", "2b", "3a", "3b"]);
        assert_eq!(server.requests(), 3);
    }

    #[tokio::test]
    async fn test_nothing_is_fetched_before_polling() {
        let server = PagedServer::new(3);
        let stream = paginate::<Patient, _>(&server, &TracingEventSink);
        assert_eq!(server.requests(), 0);
        drop(stream);
        assert_eq!(server.requests(), 0);
    }

    #[tokio::test]
    async fn test_prefix_consumption_fetches_only_needed_pages() {
        let server = PagedServer::new(3);
        let patients: Vec<Patient> = paginate(&server, &TracingEventSink)
            .take(2)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids(&patients), vec!["1a", "1b"]);
        assert_eq!(server.requests(), 1);

        let patients: Vec<Patient> = paginate(&server, &TracingEventSink)
            .take(3)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(patients.len(), 3);
        assert_eq!(server.requests(), 3);
    }

    #[tokio::test]
    async fn test_failed_page_fetch_is_page_retrieval_error() {
        let mut server = PagedServer::new(3);
        server.pages.remove("http://fhir/page3");

        let results: Vec<Result<Patient>> = paginate(&server, &TracingEventSink).collect().await;
        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(|r| r.is_ok()));

        match &results[4] {
            Err(CapacityError::Fhir(FhirError::PageRetrieval { url, reason })) => {
                assert_eq!(url, "http://fhir/page3");
                assert!(reason.contains("503"));
            }
            other => panic!("Expected PageRetrieval error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_page_without_next_link() {
        let server = PagedServer::new(1);
        let patients: Vec<Patient> = paginate(&server, &TracingEventSink)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(patients.len(), 2);
        assert_eq!(server.requests(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_reported_and_skipped() {
        let mut server = PagedServer::new(2);
        server.first = Bundle::searchset(
            vec![
                json!({"resourceType": "Patient", "id": "1", "gender": "male"}),
                json!({"resourceType": "Patient", "id": "2", "birthDate": 19900102}),
            ],
            Some("http://fhir/page2"),
        );
        let events = CollectingEventSink::new();

        let patients: Vec<Patient> = paginate(&server, &events).try_collect().await.unwrap();

        assert_eq!(ids(&patients), vec!["1", "2a", "2b"]);
        match events.events().as_slice() {
            [PipelineEvent::InvalidResource {
                resource_type,
                id,
                reason,
            }] => {
                assert_eq!(*resource_type, "Patient");
                assert_eq!(id.as_deref(), Some("2"));
                assert!(reason.contains("19900102"));
            }
            other => panic!("Expected one InvalidResource event, got {other:?}"),
        }
    }
}
