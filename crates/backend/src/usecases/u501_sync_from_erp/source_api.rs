//! Контракт внешнего источника (ERP) и выбор реализации по конфигурации.

use async_trait::async_trait;
use chrono::NaiveDate;
use contracts::projections::p901_inventory_directory::DirectoryEntry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::erp_api_client::ErpApiClient;
use super::mock_api_client::MockApiClient;
use super::record_extractor::ExtractionError;
use super::rest_api_client::RestApiClient;
use super::source_models::{CustomerRecord, FetchOptions, FetchedInvoices, PaymentRecord};
use crate::shared::config::{SourceApiConfig, SourceApiKind};

#[derive(Debug, Error)]
pub enum SourceApiError {
    #[error("HTTP {status} from {url}: {body}")]
    Http { url: String, status: u16, body: String },

    /// ERP сообщает об ошибке телом ответа со статусом 200
    #[error("ERP business error from {url}: response contains '{marker}'")]
    Business { url: String, marker: String },

    #[error("network error calling {url}: {message}")]
    Network { url: String, message: String },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("source API is not configured: {0}")]
    Config(String),
}

/// Внешний источник данных. Три обязательные операции + необязательный инвентарь.
#[async_trait]
pub trait SourceApi: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_invoices(
        &self,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<FetchedInvoices, SourceApiError>;

    async fn fetch_payments(
        &self,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<Vec<PaymentRecord>, SourceApiError>;

    async fn fetch_customers(
        &self,
        tenant_external_id: &str,
        page: u32,
        page_size: u32,
        vendor: Option<&str>,
    ) -> Result<Vec<CustomerRecord>, SourceApiError>;

    /// Справочник номенклатуры. По умолчанию источник его не отдаёт.
    async fn fetch_inventory_directory(
        &self,
        _tenant_external_id: &str,
    ) -> Result<Vec<DirectoryEntry>, SourceApiError> {
        Ok(Vec::new())
    }
}

/// Выбрать реализацию источника один раз при старте процесса
pub fn build_source_api(config: &SourceApiConfig) -> anyhow::Result<Arc<dyn SourceApi>> {
    let api: Arc<dyn SourceApi> = match config.kind {
        SourceApiKind::Mock => Arc::new(MockApiClient),
        SourceApiKind::Rest => Arc::new(RestApiClient::new(config)?),
        SourceApiKind::Erp => Arc::new(ErpApiClient::new(config)?),
    };
    tracing::info!("Source API: {}", api.name());
    Ok(api)
}

pub(super) fn build_http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .no_proxy()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))
}

/// `base?k=v&...` с экранированием значений
pub(super) fn build_url(base: &str, params: &[(&str, String)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, query.join("&"))
    }
}

/// GET и чтение тела как текста; не-2xx → `SourceApiError::Http`
pub(super) async fn get_text(
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<String, SourceApiError> {
    let start_time = Instant::now();

    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("request timeout: {}", e)
        } else if e.is_connect() {
            format!("connection error: {}", e)
        } else {
            e.to_string()
        };
        tracing::error!("GET {} failed: {}", url, message);
        SourceApiError::Network {
            url: url.to_string(),
            message,
        }
    })?;

    let status = response.status();
    tracing::info!(
        "GET {} completed in {:.2}s with status {}",
        url,
        start_time.elapsed().as_secs_f64(),
        status
    );

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceApiError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }

    response.text().await.map_err(|e| SourceApiError::Network {
        url: url.to_string(),
        message: format!("failed to read body: {}", e),
    })
}
