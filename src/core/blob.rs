//! Azure Blob Storage upload
//!
//! Only `Put Blob` is needed: relayed images are written once under a
//! deterministic name and referenced by URL afterwards. Requests are signed
//! with the account's Shared Key, or carry the SAS token when the connection
//! string provides one instead.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use sha2::Sha256;
use thiserror::Error;

const API_VERSION: &str = "2021-08-06";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid storage connection string: {0}")]
    InvalidConnectionString(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage API error {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Object storage capable of holding relayed media.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `name`, replacing any existing object, and return its public URL.
    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, BlobError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    SharedKey { account: String, key: Vec<u8> },
    Sas(String),
}

/// Parsed form of an Azure storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    blob_endpoint: String,
    credentials: Credentials,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, BlobError> {
        let mut account = None;
        let mut key = None;
        let mut sas = None;
        let mut endpoint = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();

        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                BlobError::InvalidConnectionString(format!("malformed segment '{}'", pair))
            })?;

            match name.to_ascii_lowercase().as_str() {
                "accountname" => account = Some(value.to_string()),
                "accountkey" => key = Some(value.to_string()),
                "sharedaccesssignature" => sas = Some(value.trim_start_matches('?').to_string()),
                "blobendpoint" => endpoint = Some(value.trim_end_matches('/').to_string()),
                "defaultendpointsprotocol" => protocol = value.to_string(),
                "endpointsuffix" => suffix = value.to_string(),
                _ => {}
            }
        }

        let blob_endpoint = match (endpoint, &account) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("{}://{}.blob.{}", protocol, account, suffix),
            (None, None) => {
                return Err(BlobError::InvalidConnectionString(
                    "either AccountName or BlobEndpoint is required".to_string(),
                ))
            }
        };

        let credentials = match (sas, account, key) {
            (Some(token), _, _) => Credentials::Sas(token),
            (None, Some(account), Some(key)) => {
                let key = BASE64.decode(key.as_bytes()).map_err(|e| {
                    BlobError::InvalidConnectionString(format!("AccountKey is not base64: {}", e))
                })?;
                Credentials::SharedKey { account, key }
            }
            _ => {
                return Err(BlobError::InvalidConnectionString(
                    "AccountName with AccountKey, or SharedAccessSignature, is required"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            blob_endpoint,
            credentials,
        })
    }

    pub fn blob_endpoint(&self) -> &str {
        &self.blob_endpoint
    }
}

pub struct AzureBlobClient {
    client: Client,
    connection: ConnectionString,
    container: String,
}

impl AzureBlobClient {
    pub fn new(connection: ConnectionString, container: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            connection,
            container: container.into(),
        }
    }

    pub fn from_connection_string(
        raw: &str,
        container: impl Into<String>,
    ) -> Result<Self, BlobError> {
        Ok(Self::new(ConnectionString::parse(raw)?, container))
    }

    /// Public URL of the blob named `name` in this client's container.
    pub fn blob_url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.connection.blob_endpoint, self.container, name
        )
    }
}

#[async_trait]
impl BlobStore for AzureBlobClient {
    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let blob_url = self.blob_url(name);

        let request = match &self.connection.credentials {
            Credentials::SharedKey { account, key } => {
                let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
                let path = Url::parse(&blob_url)
                    .map_err(|e| {
                        BlobError::InvalidConnectionString(format!("bad blob URL: {}", e))
                    })?
                    .path()
                    .to_string();
                let canonical = string_to_sign(
                    "PUT",
                    data.len(),
                    content_type,
                    &[
                        ("x-ms-blob-type", "BlockBlob"),
                        ("x-ms-date", &date),
                        ("x-ms-version", API_VERSION),
                    ],
                    &format!("/{}{}", account, path),
                );
                let signature = sign(key, &canonical);

                self.client
                    .put(&blob_url)
                    .header("x-ms-date", date)
                    .header(AUTHORIZATION, format!("SharedKey {}:{}", account, signature))
            }
            Credentials::Sas(token) => self.client.put(format!("{}?{}", blob_url, token)),
        };

        let response = request
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("[AzureBlobClient] Upload of '{}' failed with {}: {}", name, status, body);
            return Err(BlobError::Api { status, body });
        }

        tracing::debug!("[AzureBlobClient] Uploaded '{}' to container '{}'", name, self.container);
        Ok(blob_url)
    }
}

/// Shared Key string-to-sign for a blob request without conditional headers.
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    canonical_resource: &str,
) -> String {
    // Content-Length is an empty line for zero-length bodies.
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort();

    let mut out = format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n",
        verb, length, content_type
    );
    for (name, value) in headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(canonical_resource);
    out
}

fn sign(key: &[u8], string_to_sign: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_account_connection_string() {
        let conn = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=bakingmentor;AccountKey=c2VjcmV0LWtleQ==;EndpointSuffix=core.windows.net",
        )
        .unwrap();

        assert_eq!(conn.blob_endpoint(), "https://bakingmentor.blob.core.windows.net");
        assert_eq!(
            conn.credentials,
            Credentials::SharedKey {
                account: "bakingmentor".to_string(),
                key: b"secret-key".to_vec(),
            }
        );
    }

    #[test]
    fn test_parse_sas_connection_string() {
        let conn = ConnectionString::parse(
            "BlobEndpoint=https://acct.blob.core.windows.net/;SharedAccessSignature=sv=2022-11-02&sig=abc%3D",
        )
        .unwrap();

        assert_eq!(conn.blob_endpoint(), "https://acct.blob.core.windows.net");
        assert_eq!(
            conn.credentials,
            Credentials::Sas("sv=2022-11-02&sig=abc%3D".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_missing_credentials() {
        assert!(ConnectionString::parse("AccountName=acct").is_err());
        assert!(ConnectionString::parse("AccountKey=c2VjcmV0LWtleQ==").is_err());
        assert!(ConnectionString::parse("AccountName=acct;AccountKey=***").is_err());
    }

    #[test]
    fn test_string_to_sign_layout() {
        let canonical = string_to_sign(
            "PUT",
            4,
            "image/jpeg",
            &[
                ("x-ms-version", API_VERSION),
                ("X-MS-Blob-Type", "BlockBlob"),
                ("x-ms-date", "Thu, 15 Oct 2026 10:00:00 GMT"),
            ],
            "/acct/userimages/a.jpg",
        );

        assert_eq!(
            canonical,
            "PUT\n\n\n4\n\nimage/jpeg\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Thu, 15 Oct 2026 10:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /acct/userimages/a.jpg"
        );
    }

    #[test]
    fn test_sign_matches_hmac_sha256() {
        assert_eq!(
            sign(b"secret-key", "hello"),
            "mOf/uWS7Wj+QLbH8EBpbqpi28s1WhYIQydcPJqx2L8c="
        );
    }

    #[tokio::test]
    async fn test_upload_with_shared_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/devstoreaccount1/userimages/image_message_1_user_U1.png"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-type", "image/jpeg"))
            .and(header_regex("authorization", "^SharedKey devstoreaccount1:.+$"))
            .and(body_bytes(vec![1u8, 2, 3]))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = AzureBlobClient::from_connection_string(
            &format!(
                "AccountName=devstoreaccount1;AccountKey=c2VjcmV0LWtleQ==;BlobEndpoint={}/devstoreaccount1",
                mock_server.uri()
            ),
            "userimages",
        )
        .unwrap();

        let url = client
            .upload("image_message_1_user_U1.png", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();

        assert_eq!(
            url,
            format!(
                "{}/devstoreaccount1/userimages/image_message_1_user_U1.png",
                mock_server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_upload_with_sas_and_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/userimages/a.jpg"))
            .and(query_param("sig", "abc"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AuthenticationFailed"))
            .mount(&mock_server)
            .await;

        let client = AzureBlobClient::from_connection_string(
            &format!(
                "BlobEndpoint={};SharedAccessSignature=sv=2022-11-02&sig=abc",
                mock_server.uri()
            ),
            "userimages",
        )
        .unwrap();

        let err = client
            .upload("a.jpg", vec![0xFF], "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Api { status, .. } if status == StatusCode::FORBIDDEN));
    }
}
