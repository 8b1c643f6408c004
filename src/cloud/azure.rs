use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::Sha256;
use url::Url;

use crate::error::{AppError, Result};

const API_VERSION: &str = "2021-08-06";
const UPLOAD_TIMEOUT_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// How requests are authorized.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    SharedKey { account: String, key: String },
    Sas(String),
}

/// Parsed `AZURE_STORAGE_CONNECTION_STRING`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionString {
    pub account: String,
    pub endpoint: String,
    pub credentials: Credentials,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: HashMap<&str, &str> = raw
            .split(';')
            .filter_map(|part| part.trim().split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let account = fields.get("AccountName").map(|s| s.to_string());

        let endpoint = match fields.get("BlobEndpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account = account.as_deref().ok_or_else(|| {
                    AppError::Cloud("connection string has neither AccountName nor BlobEndpoint".into())
                })?;
                let protocol = fields.get("DefaultEndpointsProtocol").copied().unwrap_or("https");
                let suffix = fields.get("EndpointSuffix").copied().unwrap_or("core.windows.net");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
        };

        let credentials = if let Some(sas) = fields.get("SharedAccessSignature") {
            Credentials::Sas(sas.trim_start_matches('?').to_string())
        } else {
            match (account.clone(), fields.get("AccountKey")) {
                (Some(account), Some(key)) => Credentials::SharedKey {
                    account,
                    key: key.to_string(),
                },
                _ => {
                    return Err(AppError::Cloud(
                        "connection string needs AccountName and AccountKey, or a SharedAccessSignature".into(),
                    ))
                }
            }
        };

        Ok(Self {
            account: account.unwrap_or_default(),
            endpoint,
            credentials,
        })
    }
}

/// Shared Key string-to-sign for the Blob service.
///
/// `x_ms_headers` must be lowercase; they are sorted here.
pub fn string_to_sign(
    method: &str,
    content_length: u64,
    content_type: &str,
    x_ms_headers: &[(&str, &str)],
    canonical_resource: &str,
    query: &[(&str, &str)],
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut out = format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n",
        method, length, content_type
    );

    let mut headers = x_ms_headers.to_vec();
    headers.sort();
    for (name, value) in headers {
        out.push_str(&format!("{}:{}\n", name, value));
    }

    out.push_str(canonical_resource);
    let mut query = query.to_vec();
    query.sort();
    for (name, value) in query {
        out.push_str(&format!("\n{}:{}", name.to_lowercase(), value));
    }
    out
}

/// Base64 HMAC-SHA256 of `payload` under the base64 account key.
pub fn sign(account_key: &str, payload: &str) -> Result<String> {
    let key = STANDARD
        .decode(account_key)
        .map_err(|e| AppError::Cloud(format!("account key is not valid base64: {}", e)))?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| AppError::Cloud(format!("invalid account key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("xml") => "application/rss+xml",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => crate::output::mime_for(name),
    }
}

/// Default blob name: `YYYY-MM-DD/<file name>`.
pub fn dated_blob_name(local: &Path) -> String {
    let file = local
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", Utc::now().format("%Y-%m-%d"), file)
}

/// Uploads podcast files to an Azure Blob Storage container over REST.
pub struct AzureBlobUploader {
    client: Client,
    connection: ConnectionString,
    container: String,
}

impl AzureBlobUploader {
    pub fn new(connection_string: Option<&str>, container: &str) -> Result<Self> {
        let raw = connection_string.ok_or_else(|| {
            AppError::Config("AZURE_STORAGE_CONNECTION_STRING is not set".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            connection: ConnectionString::parse(raw)?,
            container: container.to_string(),
        })
    }

    /// Public URL of a blob, without any SAS token.
    pub fn blob_url(&self, blob_name: &str) -> String {
        let encoded: Vec<String> = blob_name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/{}", self.connection.endpoint, self.container, encoded.join("/"))
    }

    /// Inverse of [`blob_url`](Self::blob_url). `None` for URLs outside this container.
    pub fn blob_name_for_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/", self.container_url());
        let path = url.strip_prefix(&prefix)?;
        let path = path.split(['?', '#']).next().unwrap_or_default();
        if path.is_empty() {
            return None;
        }
        let decoded: Vec<String> = path
            .split('/')
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .collect();
        Some(decoded.join("/"))
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.connection.endpoint, self.container)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<(Vec<u8>, &str)>,
    ) -> Result<reqwest::Response> {
        let mut url = Url::parse(url).map_err(|e| AppError::Cloud(format!("bad blob URL {}: {}", url, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let (content_length, content_type) = body
            .as_ref()
            .map(|(bytes, ct)| (bytes.len() as u64, *ct))
            .unwrap_or((0, ""));

        let mut x_ms_headers = vec![("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)];
        if body.is_some() {
            x_ms_headers.push(("x-ms-blob-type", "BlockBlob"));
        }

        let mut authorization = None;
        match &self.connection.credentials {
            Credentials::SharedKey { account, key } => {
                let resource = format!("/{}{}", account, url.path());
                let payload = string_to_sign(
                    method.as_str(),
                    content_length,
                    content_type,
                    &x_ms_headers,
                    &resource,
                    query,
                );
                authorization = Some(format!("SharedKey {}:{}", account, sign(key, &payload)?));
            }
            Credentials::Sas(token) => {
                let joined = match url.query() {
                    Some(q) => format!("{}&{}", q, token),
                    None => token.clone(),
                };
                url.set_query(Some(&joined));
            }
        }

        let mut request = self.client.request(method, url);
        for (name, value) in &x_ms_headers {
            request = request.header(*name, *value);
        }
        if let Some(auth) = authorization {
            request = request.header("Authorization", auth);
        }
        if let Some((bytes, content_type)) = body {
            request = request.header("Content-Type", content_type).body(bytes);
        }

        Ok(request.send().await?)
    }

    /// Upload a local file, overwriting any existing blob. Returns its URL.
    pub async fn upload_file(&self, local: &Path, blob_name: Option<&str>) -> Result<String> {
        if !local.exists() {
            return Err(AppError::Cloud(format!("Local file not found: {}", local.display())));
        }
        let blob_name = blob_name
            .map(str::to_string)
            .unwrap_or_else(|| dated_blob_name(local));

        let bytes = tokio::fs::read(local).await?;
        let size = bytes.len();
        let url = self.blob_url(&blob_name);
        let response = self
            .send(Method::PUT, &url, &[], Some((bytes, content_type_for(&blob_name))))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Cloud(format!(
                "Failed to upload {} ({}): {}",
                local.display(),
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        tracing::info!("Uploaded {} ({} bytes) to {}", local.display(), size, url);
        Ok(url)
    }

    /// Whether the container exists and the credentials are accepted.
    pub async fn test_connection(&self) -> bool {
        let url = self.container_url();
        match self.send(Method::GET, &url, &[("restype", "container")], None).await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!("Container check returned {}", response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Container check failed: {}", e);
                false
            }
        }
    }

    /// Returns false when the blob did not exist.
    pub async fn delete_blob(&self, blob_name: &str) -> Result<bool> {
        let url = self.blob_url(blob_name);
        let response = self.send(Method::DELETE, &url, &[], None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(AppError::Cloud(format!("Failed to delete {}: {}", blob_name, s))),
        }
    }
}
