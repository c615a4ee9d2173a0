//! Phabricator Conduit client implementing [`MacroSource`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use macrofetch_shared::{Macro, MacroImage, MacroSource, TransportError};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::FetchMode;

/// Standard Conduit response wrapper.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error_code: Option<String>,
    error_info: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, TransportError> {
        if let Some(code) = self.error_code {
            return Err(TransportError::Api {
                code,
                info: self.error_info.unwrap_or_default(),
            });
        }
        self.result
            .ok_or_else(|| TransportError::InvalidResponse("missing result".into()))
    }
}

#[derive(Debug, Deserialize)]
struct MacroRecord {
    uri: Option<String>,
    #[serde(rename = "filePHID")]
    file_phid: Option<String>,
}

/// `macro.query` result. PHP serializes an empty map as `[]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MacroListing {
    Map(BTreeMap<String, MacroRecord>),
    List(Vec<serde_json::Value>),
}

/// Conduit API client.
pub struct ConduitSource {
    http: reqwest::Client,
    host: String,
    api_key: String,
    mode: FetchMode,
}

impl ConduitSource {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        mode: FetchMode,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("macrofetch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            mode,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/api/{}", self.host, method)
    }

    async fn call<T>(&self, method: &str, params: &[(&str, &str)]) -> Result<T, TransportError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.method_url(method);
        debug!("Calling Conduit method {}", method);

        let response = self
            .http
            .get(&url)
            .query(&[("api.token", self.api_key.as_str())])
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope<T> = response.json().await?;
        envelope.into_result()
    }

    /// Identifier field the current fetch mode reads from a listing record.
    fn id_field(&self) -> &'static str {
        match self.mode {
            FetchMode::File => "filePHID",
            FetchMode::Uri => "uri",
        }
    }

    /// A record without the needed id still becomes a macro; its fetch fails
    /// on its own instead of sinking the whole listing.
    fn remote_id(&self, name: &str, record: MacroRecord) -> String {
        let id = match self.mode {
            FetchMode::File => record.file_phid,
            FetchMode::Uri => record.uri,
        };
        id.unwrap_or_else(|| {
            warn!(name = %name, field = self.id_field(), "Macro listed without an identifier");
            String::new()
        })
    }

    /// Whether `url` lives on the Conduit host, so the API token may be sent.
    fn is_same_origin(&self, url: &Url) -> bool {
        Url::parse(&self.host)
            .map(|host| host.origin() == url.origin())
            .unwrap_or(false)
    }

    async fn download_file(&self, phid: &str) -> Result<Vec<u8>, TransportError> {
        let encoded: String = self.call("file.download", &[("phid", phid)]).await?;
        Ok(STANDARD.decode(encoded.trim())?)
    }

    async fn download_uri(&self, uri: &str) -> Result<Vec<u8>, TransportError> {
        let url = Url::parse(uri)
            .map_err(|e| TransportError::InvalidResponse(format!("invalid uri {:?}: {}", uri, e)))?;

        let mut request = self.http.get(url.clone());
        if self.is_same_origin(&url) {
            request = request.query(&[("api.token", self.api_key.as_str())]);
        } else {
            debug!(%url, "Fetching from a foreign origin without the API token");
        }

        let response = request
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl MacroSource for ConduitSource {
    async fn list_macros(&self) -> Result<Vec<Macro>, TransportError> {
        let records = match self.call::<MacroListing>("macro.query", &[]).await? {
            MacroListing::Map(records) => records,
            MacroListing::List(items) if items.is_empty() => BTreeMap::new(),
            MacroListing::List(_) => {
                return Err(TransportError::InvalidResponse(
                    "macro.query returned a list instead of a map".into(),
                ))
            }
        };

        Ok(records
            .into_iter()
            .map(|(name, record)| {
                let remote_id = self.remote_id(&name, record);
                Macro::new(name, remote_id)
            })
            .collect())
    }

    async fn fetch_image(&self, entry: &Macro) -> Result<MacroImage, TransportError> {
        if entry.remote_id.is_empty() {
            return Err(TransportError::InvalidResponse(format!(
                "macro has no {}",
                self.id_field()
            )));
        }

        let body = match self.mode {
            FetchMode::File => self.download_file(&entry.remote_id).await?,
            FetchMode::Uri => self.download_uri(&entry.remote_id).await?,
        };
        debug!(name = %entry.name, bytes = body.len(), "Downloaded macro image");
        Ok(MacroImage::new(entry.clone(), body))
    }
}
