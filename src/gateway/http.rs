//! HTTP implementation of the remote gateway

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::Serialize;

use super::http_client::create_shared_client;
use super::{GatewayError, MaintenanceTask, ModelOperation, ProjectFiles, RemoteGateway, routes};
use crate::config::HttpConfig;
use crate::file_ref::FileRef;
use crate::project::ApiConfig;

type ListingFuture = Shared<BoxFuture<'static, Result<ProjectFiles, GatewayError>>>;

/// Request body for saves
#[derive(Serialize)]
struct SaveBody<'a> {
    text: &'a str,
}

/// Request body for migration scaffolding
#[derive(Serialize)]
struct CreateMigrationBody<'a> {
    modul: &'a str,
}

/// Request body for the credential check
#[derive(Serialize)]
struct ConnectBody<'a> {
    password: &'a str,
    token: &'a str,
}

/// Gateway talking to the project backend over HTTP
pub struct HttpGateway {
    client: Arc<Client>,
    base_url: String,
    headers: HeaderMap,
    /// In-flight listing request and its generation
    listing: Mutex<Option<(u64, ListingFuture)>>,
    listing_generation: Mutex<u64>,
}

impl HttpGateway {
    /// Build a gateway with its own HTTP client
    pub fn new(api: ApiConfig, http: &HttpConfig) -> anyhow::Result<Self> {
        Self::with_client(api, create_shared_client(http)?)
    }

    /// Build a gateway around an existing shared client
    pub fn with_client(api: ApiConfig, client: Arc<Client>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &api.headers {
            let name = HeaderName::from_bytes(name.as_bytes())?;
            let mut value = HeaderValue::from_str(value)?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            headers,
            listing: Mutex::new(None),
            listing_generation: Mutex::new(0),
        })
    }

    pub fn http_client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_text(&self, path: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.headers.clone())
            .header(ACCEPT, "text/plain")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.text().await?)
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.headers.clone())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn fetch_listing(
        client: Arc<Client>,
        url: String,
        headers: HeaderMap,
    ) -> Result<ProjectFiles, GatewayError> {
        let response = client.get(url).headers(headers).send().await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Turn a non-2xx response into [`GatewayError::Status`]
async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_files(&self) -> Result<ProjectFiles, GatewayError> {
        let (generation, listing) = {
            let mut slot = self.listing.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((generation, listing)) => {
                    tracing::debug!("Joining in-flight file listing");
                    (*generation, listing.clone())
                }
                None => {
                    let mut counter = self
                        .listing_generation
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    *counter += 1;
                    let generation = *counter;

                    let listing = Self::fetch_listing(
                        Arc::clone(&self.client),
                        self.url(routes::LIST_FILES),
                        self.headers.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some((generation, listing.clone()));
                    (generation, listing)
                }
            }
        };

        let result = listing.await;

        let mut slot = self.listing.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
            *slot = None;
        }

        result
    }

    async fn read_file(&self, file: &FileRef) -> Result<String, GatewayError> {
        tracing::debug!("Fetching {}", file);
        self.get_text(&routes::read_path(file)).await
    }

    async fn write_file(&self, file: &FileRef, content: &str) -> Result<(), GatewayError> {
        let path = routes::write_path(file)?;
        tracing::debug!("Saving {} to {}", file, path);

        let response = self
            .client
            .put(self.url(&path))
            .headers(self.headers.clone())
            .json(&SaveBody { text: content })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_file(&self, file: &FileRef) -> Result<(), GatewayError> {
        let path = routes::delete_path(file)?;
        let response = self
            .client
            .delete(self.url(&path))
            .headers(self.headers.clone())
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn run_model_operation(
        &self,
        model: &str,
        operation: ModelOperation,
    ) -> Result<(), GatewayError> {
        tracing::info!("Running {} for {}", operation.as_str(), model);
        self.get_text(&routes::operation_path(model, operation))
            .await
            .map(|_| ())
    }

    async fn last_rows(&self, model: &str) -> Result<Vec<serde_json::Value>, GatewayError> {
        let rows = self.get_json(&routes::last_rows_path(model)).await?;
        serde_json::from_value(rows).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn create_migration(&self, name: &str) -> Result<serde_json::Value, GatewayError> {
        let response = self
            .client
            .post(self.url(routes::CREATE_MIGRATION))
            .headers(self.headers.clone())
            .json(&CreateMigrationBody { modul: name })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn run_maintenance(
        &self,
        task: MaintenanceTask,
    ) -> Result<serde_json::Value, GatewayError> {
        tracing::info!("Running {}", task.as_str());
        self.get_json(routes::maintenance_path(task)).await
    }

    async fn connect(
        &self,
        developer_token: &str,
        password: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        tracing::debug!("Checking credentials against {}", self.base_url);
        let response = self
            .client
            .post(self.url(routes::CONNECT))
            .json(&ConnectBody {
                password,
                token: developer_token,
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}
