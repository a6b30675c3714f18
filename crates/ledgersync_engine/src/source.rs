//! Transport to the source application's query endpoint.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpRequest};
use ledgersync_codec::{EntityType, QueryDocument};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const TARGET: &str = "source";

/// Executes queries against the source and returns the raw response.
pub trait SourceTransport: Send + Sync {
    /// Posts `query` and returns the response document.
    fn fetch(&self, query: &QueryDocument) -> SyncResult<String>;
}

/// HTTP transport to the source.
pub struct SourceClient<C: HttpClient> {
    url: String,
    client: C,
    master_timeout: Duration,
    voucher_timeout: Duration,
    control_timeout: Duration,
}

impl<C: HttpClient> SourceClient<C> {
    /// Creates a client for the source configured in `config`.
    pub fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            url: config.source_url(),
            client,
            master_timeout: config.source_master_timeout,
            voucher_timeout: config.source_voucher_timeout,
            control_timeout: config.control_timeout,
        }
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn timeout_for(&self, query: &QueryDocument) -> Duration {
        match query.entity() {
            Some(EntityType::Voucher) => self.voucher_timeout,
            Some(_) => self.master_timeout,
            None => self.control_timeout,
        }
    }
}

impl<C: HttpClient> SourceTransport for SourceClient<C> {
    fn fetch(&self, query: &QueryDocument) -> SyncResult<String> {
        let body = query.encode()?;
        let request = HttpRequest::post(self.url.as_str(), body.into_bytes())
            .with_header("Content-Type", "application/xml")
            .with_timeout(self.timeout_for(query));

        let response = self
            .client
            .execute(&request)
            .map_err(|f| SyncError::from_failure(TARGET, f))?;
        if response.status != 200 {
            return Err(SyncError::Connectivity {
                target: TARGET,
                message: format!("HTTP {}", response.status),
            });
        }
        debug!(bytes = response.body.len(), "source response received");
        Ok(response.text())
    }
}

/// An in-memory source for testing.
///
/// Holds record elements per entity type together with their revisions and
/// answers filtered queries the way the source does: only elements above
/// the query's revision floor are returned.
#[derive(Debug, Default)]
pub struct MockSource {
    elements: Mutex<HashMap<EntityType, Vec<(u64, String)>>>,
    raw: Mutex<HashMap<EntityType, String>>,
    tenants: Mutex<Option<Vec<String>>>,
    offline: Mutex<bool>,
    queries: Mutex<Vec<QueryDocument>>,
}

impl MockSource {
    /// Creates an empty source that reports no open tenants.
    pub fn new() -> Self {
        Self {
            tenants: Mutex::new(Some(Vec::new())),
            ..Self::default()
        }
    }

    /// Adds a record element with its revision.
    pub fn insert(&self, entity: EntityType, revision: u64, element: impl Into<String>) {
        self.elements
            .lock()
            .entry(entity)
            .or_default()
            .push((revision, element.into()));
    }

    /// Adds a master record element built from its identity.
    pub fn insert_master(&self, entity: EntityType, master_id: u64, guid: &str, revision: u64, name: &str) {
        let tag = entity.element_name();
        self.insert(
            entity,
            revision,
            format!(
                "<{tag} NAME=\"{name}\"><GUID>{guid}</GUID><MASTERID>{master_id}</MASTERID><ALTERID>{revision}</ALTERID></{tag}>"
            ),
        );
    }

    /// Serves `document` verbatim for `entity`, ignoring stored elements.
    pub fn set_raw(&self, entity: EntityType, document: impl Into<String>) {
        self.raw.lock().insert(entity, document.into());
    }

    /// Sets the open tenants. `None` makes the tenant query fail.
    pub fn set_tenants(&self, tenants: Option<&[&str]>) {
        *self.tenants.lock() = tenants.map(|t| t.iter().map(|s| (*s).to_owned()).collect());
    }

    /// Makes every query fail with a connectivity error.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<QueryDocument> {
        self.queries.lock().clone()
    }

    fn envelope(body: &str) -> String {
        format!("<ENVELOPE><BODY><DATA><COLLECTION>{body}</COLLECTION></DATA></BODY></ENVELOPE>")
    }
}

impl SourceTransport for MockSource {
    fn fetch(&self, query: &QueryDocument) -> SyncResult<String> {
        self.queries.lock().push(query.clone());
        if *self.offline.lock() {
            return Err(SyncError::Connectivity {
                target: TARGET,
                message: "connection refused".into(),
            });
        }

        let Some(entity) = query.entity() else {
            let tenants = self.tenants.lock().clone().ok_or(SyncError::Timeout { target: TARGET })?;
            let body: String = tenants
                .iter()
                .map(|t| format!("<COMPANY NAME=\"{t}\"><GUID>{t}</GUID></COMPANY>"))
                .collect();
            return Ok(Self::envelope(&body));
        };

        if let Some(raw) = self.raw.lock().get(&entity) {
            return Ok(raw.clone());
        }
        let floor = query.revision_floor().unwrap_or(0);
        let body: String = self
            .elements
            .lock()
            .get(&entity)
            .map(|elements| {
                elements
                    .iter()
                    .filter(|(revision, _)| *revision > floor)
                    .map(|(_, element)| element.as_str())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::envelope(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpFailure, Method, MockHttpClient};
    use ledgersync_codec::{decode, decode_tenants};
    use std::sync::Arc;

    #[test]
    fn client_posts_xml_with_entity_timeout() {
        let http = Arc::new(MockHttpClient::new());
        http.respond(Method::Post, ":9000", 200, "<ENVELOPE/>");
        let config = SyncConfig::new("http://dest");
        let source = SourceClient::new(&config, Arc::clone(&http));

        let body = source
            .fetch(&QueryDocument::for_entity(EntityType::Voucher))
            .unwrap();
        assert_eq!(body, "<ENVELOPE/>");
        source.fetch(&QueryDocument::active_tenants()).unwrap();

        let requests = http.requests();
        assert_eq!(requests[0].url, "http://localhost:9000");
        assert_eq!(requests[0].header("Content-Type"), Some("application/xml"));
        assert_eq!(requests[0].timeout, Duration::from_secs(120));
        assert_eq!(requests[1].timeout, Duration::from_secs(10));
        assert!(String::from_utf8_lossy(&requests[0].body).contains("<ENVELOPE>"));
    }

    #[test]
    fn client_maps_failures() {
        let http = MockHttpClient::new();
        http.respond(Method::Post, ":9000", 503, "busy");
        let source = SourceClient::new(&SyncConfig::new("http://dest"), http);
        let err = source
            .fetch(&QueryDocument::for_entity(EntityType::Group))
            .unwrap_err();
        assert!(matches!(err, SyncError::Connectivity { target: "source", .. }));

        let http = MockHttpClient::new();
        http.fail(Method::Post, ":9000", HttpFailure::Timeout);
        let source = SourceClient::new(&SyncConfig::new("http://dest"), http);
        let err = source
            .fetch(&QueryDocument::for_entity(EntityType::Group))
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { target: "source" }));
    }

    #[test]
    fn mock_source_honours_revision_floor() {
        let source = MockSource::new();
        source.insert_master(EntityType::Unit, 1, "a", 5, "Nos");
        source.insert_master(EntityType::Unit, 2, "b", 9, "Kg");

        let all = source
            .fetch(&QueryDocument::for_entity(EntityType::Unit))
            .unwrap();
        assert_eq!(decode(&all, EntityType::Unit).unwrap().len(), 2);

        let above = source
            .fetch(&QueryDocument::for_entity(EntityType::Unit).with_revision_floor(5))
            .unwrap();
        let records = decode(&above, EntityType::Unit).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label(), "Kg");
        assert_eq!(source.queries().len(), 2);
    }

    #[test]
    fn mock_source_tenants() {
        let source = MockSource::new();
        source.set_tenants(Some(&["Acme Traders", "Beta"]));
        let doc = source.fetch(&QueryDocument::active_tenants()).unwrap();
        assert_eq!(decode_tenants(&doc).unwrap(), vec!["Acme Traders", "Beta"]);

        source.set_tenants(None);
        assert!(source.fetch(&QueryDocument::active_tenants()).is_err());
    }
}
