//! REST transport over HTTP.
//!
//! Routes, relative to the resource URL:
//! - `GET {url}?{query}` list
//! - `GET {url}/{id}` one record
//! - `POST {url}` create
//! - `PUT {url}/{id}` update
//! - `DELETE {url}/{id}` destroy

use super::error::{ConnectionError, ConnectionResult};
use super::transport::MessageTransport;
use crate::algebra::{IdentityKey, ListQuery};
use crate::model::message::MessageId;
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

/// Blocking JSON-over-HTTP transport for one resource URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    resource_url: Url,
}

impl HttpTransport {
    /// Creates a transport for `resource_url` with a per-request timeout.
    pub fn new(resource_url: &str, timeout: Duration) -> ConnectionResult<Self> {
        let resource_url = Url::parse(resource_url)
            .map_err(|err| ConnectionError::InvalidUrl(format!("`{resource_url}`: {err}")))?;
        if resource_url.cannot_be_a_base() {
            return Err(ConnectionError::InvalidUrl(format!(
                "`{resource_url}` cannot carry path segments"
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            resource_url,
        })
    }

    pub fn resource_url(&self) -> &Url {
        &self.resource_url
    }

    /// URL of one record: the resource URL plus the encoded id segment.
    pub fn instance_url(&self, id: &IdentityKey) -> ConnectionResult<Url> {
        let mut url = self.resource_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConnectionError::InvalidUrl(self.resource_url.to_string()))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    /// URL of a list request with the query encoded as parameters.
    pub fn list_url(&self, query: &ListQuery) -> Url {
        let mut url = self.resource_url.clone();
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, &query_value_text(value));
            }
        }
        url
    }

    fn execute(
        &self,
        method: &'static str,
        request: RequestBuilder,
    ) -> ConnectionResult<Option<Value>> {
        let response = request.send()?;
        debug!(
            "event=http_request module=connection method={method} url={} status={}",
            response.url(),
            response.status().as_u16()
        );
        read_body(response)
    }
}

impl MessageTransport for HttpTransport {
    fn get_data(&self, id: &IdentityKey) -> ConnectionResult<Value> {
        let url = self.instance_url(id)?;
        self.execute("GET", self.client.get(url.clone()))?
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("empty body from {url}")))
    }

    fn get_list_data(&self, query: &ListQuery) -> ConnectionResult<Value> {
        let url = self.list_url(query);
        self.execute("GET", self.client.get(url.clone()))?
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("empty body from {url}")))
    }

    fn create_data(&self, body: &Value) -> ConnectionResult<Option<Value>> {
        let request = self.client.post(self.resource_url.clone()).json(body);
        self.execute("POST", request)
    }

    fn update_data(&self, id: &IdentityKey, body: &Value) -> ConnectionResult<Option<Value>> {
        let request = self.client.put(self.instance_url(id)?).json(body);
        self.execute("PUT", request)
    }

    fn destroy_data(&self, id: &IdentityKey) -> ConnectionResult<Option<Value>> {
        let request = self.client.delete(self.instance_url(id)?);
        self.execute("DELETE", request)
    }
}

fn read_body(response: Response) -> ConnectionResult<Option<Value>> {
    let status = response.status();
    if !status.is_success() {
        return Err(ConnectionError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    let text = response.text()?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| ConnectionError::InvalidResponse(format!("body is not json: {err}")))
}

fn query_value_text(value: &MessageId) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::HttpTransport;
    use crate::algebra::{IdentityKey, ListQuery};
    use crate::connection::error::ConnectionError;
    use serde_json::json;
    use std::time::Duration;

    fn transport(url: &str) -> HttpTransport {
        HttpTransport::new(url, Duration::from_secs(1)).expect("transport should build")
    }

    #[test]
    fn instance_url_appends_encoded_id() {
        let http = transport("http://localhost:8080/api/messages");
        let key = IdentityKey::from_value(&json!("a/b c")).unwrap();
        assert_eq!(
            http.instance_url(&key).unwrap().as_str(),
            "http://localhost:8080/api/messages/a%2Fb%20c"
        );

        let numeric = IdentityKey::from_value(&json!(12)).unwrap();
        assert_eq!(
            http.instance_url(&numeric).unwrap().as_str(),
            "http://localhost:8080/api/messages/12"
        );
    }

    #[test]
    fn instance_url_tolerates_trailing_slash() {
        let http = transport("http://localhost/api/messages/");
        let key = IdentityKey::from_value(&json!(1)).unwrap();
        assert_eq!(
            http.instance_url(&key).unwrap().as_str(),
            "http://localhost/api/messages/1"
        );
    }

    #[test]
    fn list_url_encodes_query_params() {
        let http = transport("http://localhost/api/messages");
        assert_eq!(
            http.list_url(&ListQuery::new()).as_str(),
            "http://localhost/api/messages"
        );

        let mut query = ListQuery::new();
        query.insert("name".to_string(), json!("ann lee"));
        query.insert("limit".to_string(), json!(5));
        assert_eq!(
            http.list_url(&query).as_str(),
            "http://localhost/api/messages?limit=5&name=ann+lee"
        );
    }

    #[test]
    fn new_rejects_unusable_urls() {
        let err = HttpTransport::new("mailto:someone@example.com", Duration::from_secs(1))
            .expect_err("mailto cannot carry segments");
        assert!(matches!(err, ConnectionError::InvalidUrl(_)));
        assert!(HttpTransport::new("::", Duration::from_secs(1)).is_err());
    }
}
