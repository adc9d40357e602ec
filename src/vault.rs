//! Minimal Vault REST client: session authentication and paginated queries.

use crate::error::VaultError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Largest page the query endpoint returns.
pub const PAGE_SIZE: usize = 1000;

/// Regulatory objective fields pulled for the migration audit.
pub const REGULATORY_OBJECTIVE_QUERY: &str = "SELECT id, name__v, status__v, lifecycle__v, \
     external_id__c, created_date__v, created_by__v, modified_date__v, modified_by__v, \
     date_of_greenlight__c, additional_implementation_info__c \
     FROM regulatory_objective__rim";

pub type Record = BTreeMap<String, String>;

pub struct VaultClient {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
    page_delay: Duration,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: usize,
    pub size: usize,
}

impl VaultClient {
    pub fn new(base_url: &str, page_delay: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: None,
            page_delay,
        }
    }

    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), VaultError> {
        info!(url = %self.base_url, user = username, "authenticating with Vault");

        let body = self
            .post_form(&format!("{}/auth", self.base_url), &[("username", username), ("password", password)], None)
            .await?;

        if body.get("responseStatus").and_then(Value::as_str) != Some("SUCCESS") {
            return Err(VaultError::Auth(response_message(&body)));
        }
        let session_id = body
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| VaultError::Auth("response carried no session id".to_string()))?;

        self.session_id = Some(session_id.to_string());
        Ok(())
    }

    /// Run `query` page by page until the reported total is reached or a page comes back empty.
    pub async fn query_all(&self, query: &str) -> Result<Vec<Record>, VaultError> {
        let session_id = self.session_id.as_deref().ok_or(VaultError::NotAuthenticated)?;
        let url = format!("{}/query", self.base_url);

        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let paged = paginated_query(query, PAGE_SIZE, offset);
            let body = self.post_form(&url, &[("q", paged.as_str())], Some(session_id)).await?;
            let page = parse_page(&body)?;
            debug!(offset, size = page.size, total = page.total, "fetched page");

            let next = next_offset(offset, records.len() + page.records.len(), &page);
            records.extend(page.records);
            match next {
                Some(next) => offset = next,
                None => break,
            }

            tokio::time::sleep(self.page_delay).await;
        }

        info!(records = records.len(), "query complete");
        Ok(records)
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        session_id: Option<&str>,
    ) -> Result<Value, VaultError> {
        let mut request = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(60))
            .form(form);
        if let Some(session_id) = session_id {
            request = request.header("Authorization", session_id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VaultError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

pub fn paginated_query(query: &str, limit: usize, offset: usize) -> String {
    if offset > 0 {
        format!("{} LIMIT {} OFFSET {}", query, limit, offset)
    } else {
        format!("{} LIMIT {}", query, limit)
    }
}

/// Offset of the page after `page`, or `None` once `fetched` reaches the reported total
/// or the page came back empty.
pub fn next_offset(offset: usize, fetched: usize, page: &Page) -> Option<usize> {
    if fetched >= page.total || page.size == 0 {
        None
    } else {
        Some(offset + PAGE_SIZE)
    }
}

fn response_message(body: &Value) -> String {
    body.get("responseMessage")
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .unwrap_or("Unknown error")
        .to_string()
}

pub fn parse_page(body: &Value) -> Result<Page, VaultError> {
    if body.get("responseStatus").and_then(Value::as_str) != Some("SUCCESS") {
        return Err(VaultError::Query(response_message(body)));
    }

    let details = body.get("responseDetails");
    let read = |key: &str| {
        details
            .and_then(|d| d.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    };

    let records = body
        .get("data")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().map(flatten_record).collect())
        .unwrap_or_default();

    Ok(Page {
        records,
        total: read("total"),
        size: read("size"),
    })
}

/// Flatten a JSON object into string cells: strings verbatim, null blank, anything else as JSON text.
pub fn flatten_record(value: &Value) -> Record {
    let Some(object) = value.as_object() else {
        return Record::new();
    };
    object
        .iter()
        .map(|(key, value)| {
            let cell = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), cell)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paginates_with_offset_after_first_page() {
        assert_eq!(paginated_query("SELECT id FROM x", 1000, 0), "SELECT id FROM x LIMIT 1000");
        assert_eq!(
            paginated_query("SELECT id FROM x", 1000, 2000),
            "SELECT id FROM x LIMIT 1000 OFFSET 2000"
        );
    }

    fn page(size: usize, total: usize) -> Page {
        Page {
            records: vec![Record::new(); size],
            total,
            size,
        }
    }

    #[test]
    fn advances_until_total_reached() {
        assert_eq!(next_offset(0, 1000, &page(1000, 2500)), Some(1000));
        assert_eq!(next_offset(1000, 2000, &page(1000, 2500)), Some(2000));
        assert_eq!(next_offset(2000, 2500, &page(500, 2500)), None);
    }

    #[test]
    fn stops_on_empty_page_or_single_page() {
        assert_eq!(next_offset(3000, 3000, &page(0, 5000)), None);
        assert_eq!(next_offset(0, 12, &page(12, 12)), None);
        assert_eq!(next_offset(0, 0, &page(0, 0)), None);
    }

    #[test]
    fn parses_successful_page() {
        let body = json!({
            "responseStatus": "SUCCESS",
            "responseDetails": { "total": 3, "size": 2, "pageoffset": 0 },
            "data": [
                { "id": "V1", "external_id__c": "A|B", "count__c": 4 },
                { "id": "V2", "external_id__c": null }
            ]
        });
        let page = parse_page(&body).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.size, 2);
        assert_eq!(page.records[0]["count__c"], "4");
        assert_eq!(page.records[1]["external_id__c"], "");
    }

    #[test]
    fn failed_query_surfaces_first_error() {
        let body = json!({
            "responseStatus": "FAILURE",
            "errors": [{ "type": "MALFORMED_URL", "message": "bad field" }]
        });
        match parse_page(&body) {
            Err(VaultError::Query(message)) => assert_eq!(message, "bad field"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn query_requires_session() {
        let client = VaultClient::new("https://vault.example.com/api/v23.1/", Duration::ZERO);
        assert!(matches!(
            client.query_all("SELECT id FROM x").await,
            Err(VaultError::NotAuthenticated)
        ));
    }
}
