//! # Pending-contact listing.
//!
//! [`ContactDirectory`] reads the contacts that still need a call from
//! `GET {api_base}/clients/pending?page=&limit=` and turns them into
//! [`CallTarget`]s for the dispatch engine.
//!
//! ```text
//! page 1 ──► {clients: [..50], total: 120, size: 50, page: 1}
//! page 2 ──► {clients: [..50], total: 120, size: 50, page: 2}
//! page 3 ──► {clients: [..20], total: 120, size: 20, page: 3}   ─► done (120 seen)
//! ```

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::ClientError;
use crate::model::CallTarget;

/// One contact as returned by the listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Contact {
    /// Contact identifier (string or number on the wire).
    #[serde(alias = "_id", alias = "client_id", deserialize_with = "id_from_any")]
    pub id: String,
    /// Phone number to call.
    #[serde(alias = "phone", alias = "phone_number")]
    pub number: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl Contact {
    /// Converts the contact into a dispatch target.
    pub fn to_target(&self) -> CallTarget {
        CallTarget::new(self.id.as_str(), self.number.as_str(), self.name.as_str())
    }
}

/// One page of the pending listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ContactPage {
    /// Contacts on this page.
    #[serde(default)]
    pub clients: Vec<Contact>,
    /// Total number of pending contacts.
    #[serde(default)]
    pub total: u64,
    /// Number of contacts on this page.
    #[serde(default)]
    pub size: u64,
    /// 1-based page number.
    #[serde(default)]
    pub page: u32,
}

impl ContactPage {
    /// Contacts as dispatch targets, in listing order.
    pub fn targets(&self) -> Vec<CallTarget> {
        self.clients.iter().map(Contact::to_target).collect()
    }
}

/// HTTP client for `GET /clients/pending`.
#[derive(Clone, Debug)]
pub struct ContactDirectory {
    client: reqwest::Client,
    url: String,
}

impl ContactDirectory {
    /// Creates a directory client for the service at `api_base`.
    pub fn new(api_base: &str) -> Self {
        Self::with_client(reqwest::Client::new(), api_base)
    }

    /// Creates a directory client sharing an existing client.
    pub fn with_client(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            url: format!("{}/clients/pending", api_base.trim_end_matches('/')),
        }
    }

    /// Fetches one page (1-based).
    pub async fn pending(&self, page: u32, limit: u32) -> Result<ContactPage, ClientError> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Walks every page and returns all pending targets.
    ///
    /// Stops once `total` contacts were seen or a page comes back empty.
    pub async fn all_pending(&self, limit: u32) -> Result<Vec<CallTarget>, ClientError> {
        let limit = limit.max(1);
        let mut targets = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.pending(page, limit).await?;
            debug!(page, got = batch.clients.len(), total = batch.total, "pending contacts page");
            if batch.clients.is_empty() {
                break;
            }
            targets.extend(batch.targets());
            if targets.len() as u64 >= batch.total {
                break;
            }
            page += 1;
        }
        Ok(targets)
    }
}

fn id_from_any<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyId {
        Text(String),
        Number(u64),
    }

    Ok(match AnyId::deserialize(de)? {
        AnyId::Text(s) => s,
        AnyId::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn page_body(ids: std::ops::Range<u32>, total: u64, page: u32) -> serde_json::Value {
        let clients: Vec<_> = ids
            .map(|i| serde_json::json!({ "id": i, "number": format!("+1555000{i}"), "name": format!("c{i}") }))
            .collect();
        serde_json::json!({ "size": clients.len(), "clients": clients, "total": total, "page": page })
    }

    #[test]
    fn decodes_aliases_and_numeric_ids() {
        let page: ContactPage = serde_json::from_value(serde_json::json!({
            "clients": [
                { "_id": "a1", "phone": "+15550001" },
                { "client_id": 7, "phone_number": "+15550002", "name": "Bob" }
            ],
            "total": 2, "size": 2, "page": 1
        }))
        .unwrap();

        let targets = page.targets();
        assert_eq!(targets[0].id.as_str(), "a1");
        assert_eq!(targets[0].phone_number, "+15550001");
        assert_eq!(targets[1].id.as_str(), "7");
        assert_eq!(targets[1].display_name, "Bob");
    }

    #[tokio::test]
    async fn pending_passes_paging_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clients/pending"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(10..12, 12, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let page = ContactDirectory::new(&server.uri()).pending(2, 10).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.clients.len(), 2);
        assert_eq!(page.total, 12);
    }

    #[tokio::test]
    async fn all_pending_walks_until_total() {
        let server = MockServer::start().await;
        for (p, ids) in [(1u32, 0..2u32), (2, 2..4), (3, 4..5)] {
            Mock::given(method("GET"))
                .and(path("/clients/pending"))
                .and(query_param("page", p.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(page_body(ids, 5, p)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let targets = ContactDirectory::new(&server.uri()).all_pending(2).await.unwrap();
        let ids: Vec<_> = targets.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, ["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn all_pending_stops_on_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0..1, 99, 1)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(0..0, 99, 2)))
            .mount(&server)
            .await;

        let targets = ContactDirectory::new(&server.uri()).all_pending(1).await.unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = ContactDirectory::new(&server.uri()).pending(1, 50).await.unwrap_err();
        assert_matches!(err, ClientError::Status(500));
    }
}
