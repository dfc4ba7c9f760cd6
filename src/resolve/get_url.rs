//! HTTP-template scheme
//!
//! `getUrl:urlTemplate["#" jsonPath]` produces a handler serving both get and
//! set for a setting. At call time the template is rendered (see
//! [`super::template`]), an HTTP GET is issued, and the completion receives
//! either the path-extracted value, the raw parsed body when no path is
//! given, or the transport error. The watchdog owns the timeout; a request
//! that outlives it keeps running and its late result is dropped.

use super::{path, template, Resolved, Scheme};
use crate::device::Device;
use crate::handler::{GetHandler, Outcome, SetHandler, SettingSlots};
use crate::watchdog::WatchdogHandle;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct GetUrlScheme {
    client: Client,
}

impl GetUrlScheme {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for GetUrlScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheme for GetUrlScheme {
    fn resolve(&self, payload: &str) -> Result<Resolved> {
        // Split off the extraction path; the template part may itself
        // contain ':' and '?' freely.
        let (template, pathspec) = match payload.split_once('#') {
            Some((url, path)) => (url, Some(path.to_string())),
            None => (payload, None),
        };
        if template.is_empty() {
            return Err(anyhow!("getUrl directive requires a URL template"));
        }

        let handler = Arc::new(UrlHandler {
            template: template.to_string(),
            pathspec,
            client: self.client.clone(),
        });

        Ok(Resolved::Slots(SettingSlots {
            get: Some(handler.clone()),
            set: Some(handler),
        }))
    }
}

struct UrlHandler {
    template: String,
    pathspec: Option<String>,
    client: Client,
}

impl UrlHandler {
    fn dispatch(&self, device: &Device, value: &Value, handle: WatchdogHandle) -> Outcome {
        let url = match template::render(&self.template, device.descriptor(), value) {
            Ok(url) => url,
            Err(e) => {
                handle.complete(Err(e));
                return Outcome::Delivered;
            }
        };
        if let Err(e) = url::Url::parse(&url) {
            handle.complete(Err(anyhow!("Invalid URL {}: {}", url, e)));
            return Outcome::Delivered;
        }

        debug!("dispatching GET {}", url);
        let client = self.client.clone();
        let pathspec = self.pathspec.clone();
        tokio::spawn(async move {
            handle.complete(fetch(client, url, pathspec).await);
        });
        Outcome::Delivered
    }
}

impl GetHandler for UrlHandler {
    fn invoke(&self, device: &Device, handle: WatchdogHandle) -> Outcome {
        self.dispatch(device, &Value::Null, handle)
    }
}

impl SetHandler for UrlHandler {
    fn invoke(&self, device: &Device, value: Value, handle: WatchdogHandle) -> Outcome {
        self.dispatch(device, &value, handle)
    }
}

async fn fetch(client: Client, url: String, pathspec: Option<String>) -> Result<Option<Value>> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("GET {} returned {}", url, status));
    }

    let body: Value = response
        .json()
        .await
        .with_context(|| format!("GET {} returned a non-JSON body", url))?;

    match pathspec {
        Some(spec) => {
            let extracted = path::extract(&body, &spec);
            if extracted.is_null() {
                Ok(None)
            } else {
                Ok(Some(extracted))
            }
        }
        None => Ok(Some(body)),
    }
}
