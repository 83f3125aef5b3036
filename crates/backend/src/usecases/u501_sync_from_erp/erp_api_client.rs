use async_trait::async_trait;
use chrono::NaiveDate;
use contracts::projections::p901_inventory_directory::DirectoryEntry;

use super::invoice_assembler::map_invoices;
use super::mappers::{to_customer_record, to_directory_entry, to_payment_record};
use super::record_extractor::{extract, FlatRecord};
use super::source_api::{build_http_client, build_url, get_text, SourceApi, SourceApiError};
use super::source_models::{CustomerRecord, FetchOptions, FetchedInvoices, PaymentRecord};
use crate::projections::p901_inventory_directory::service::BrandDirectory;
use crate::shared::config::SourceApiConfig;

/// HTTP-клиент ERP: параметризованные GET к сервисам продаж, дебиторки и инвентаря.
/// Ответы в XML или JSON; ошибки сервер возвращает текстом в теле со статусом 200.
pub struct ErpApiClient {
    client: reqwest::Client,
    receivables_url: Option<String>,
    sales_url: Option<String>,
    inventory_url: Option<String>,
    token: Option<String>,
    error_markers: Vec<String>,
}

impl ErpApiClient {
    pub fn new(config: &SourceApiConfig) -> anyhow::Result<Self> {
        let clean = |u: &Option<String>| {
            u.as_deref()
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty())
        };
        let client = Self {
            client: build_http_client(config.timeout_secs)?,
            receivables_url: clean(&config.receivables_url),
            sales_url: clean(&config.sales_url),
            inventory_url: clean(&config.inventory_url),
            token: config.token.clone().filter(|t| !t.is_empty()),
            error_markers: config.error_markers.clone(),
        };
        if client.receivables_url.is_none() && client.sales_url.is_none() {
            anyhow::bail!("source_api.receivables_url or source_api.sales_url is required for kind = \"erp\"");
        }
        Ok(client)
    }

    fn endpoint(base: &Option<String>, name: &str, path: &str) -> Result<String, SourceApiError> {
        base.as_ref()
            .map(|b| format!("{}/{}", b, path))
            .ok_or_else(|| SourceApiError::Config(format!("source_api.{} is not set", name)))
    }

    async fn get_records(
        &self,
        endpoint: String,
        mut params: Vec<(&str, String)>,
    ) -> Result<Vec<FlatRecord>, SourceApiError> {
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }
        let url = build_url(&endpoint, &params);
        // Токен в логах не показываем
        tracing::info!("ERP API: GET {}", endpoint);

        let request = self
            .client
            .get(&url)
            .header("Accept", "application/json, text/xml");
        let body = get_text(request, &endpoint).await?;

        if let Some(marker) = find_error_marker(&body, &self.error_markers) {
            let preview: String = body.chars().take(300).collect();
            tracing::error!("ERP API business error from {}: {}", endpoint, preview);
            return Err(SourceApiError::Business {
                url: endpoint,
                marker: marker.to_string(),
            });
        }

        let records = extract(&body)?;
        tracing::info!("ERP API: got {} records from {}", records.len(), endpoint);
        Ok(records)
    }
}

fn find_error_marker<'a>(body: &str, markers: &'a [String]) -> Option<&'a str> {
    markers
        .iter()
        .map(String::as_str)
        .find(|m| !m.is_empty() && body.contains(m))
}

fn window_params(
    tenant_external_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    options: &FetchOptions,
) -> Vec<(&'static str, String)> {
    vec![
        ("empresa", tenant_external_id.to_string()),
        ("fechaInicial", from.format("%Y-%m-%d").to_string()),
        ("fechaFinal", to.format("%Y-%m-%d").to_string()),
        ("nit", options.customer_nit.clone().unwrap_or_default()),
        ("vendedor", options.vendor.clone().unwrap_or_default()),
    ]
}

#[async_trait]
impl SourceApi for ErpApiClient {
    fn name(&self) -> &'static str {
        "erp"
    }

    async fn fetch_invoices(
        &self,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<FetchedInvoices, SourceApiError> {
        let endpoint = Self::endpoint(&self.sales_url, "sales_url", "ventas")?;
        let records = self
            .get_records(endpoint, window_params(tenant_external_id, from, to, options))
            .await?;
        let empty = BrandDirectory::default();
        let directory = options.directory.as_deref().unwrap_or(&empty);
        Ok(map_invoices(&records, from, directory))
    }

    async fn fetch_payments(
        &self,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<Vec<PaymentRecord>, SourceApiError> {
        let endpoint = Self::endpoint(&self.receivables_url, "receivables_url", "cartera")?;
        let records = self
            .get_records(endpoint, window_params(tenant_external_id, from, to, options))
            .await?;
        Ok(records.iter().filter_map(to_payment_record).collect())
    }

    async fn fetch_customers(
        &self,
        tenant_external_id: &str,
        page: u32,
        page_size: u32,
        vendor: Option<&str>,
    ) -> Result<Vec<CustomerRecord>, SourceApiError> {
        let endpoint = Self::endpoint(&self.receivables_url, "receivables_url", "clientes")?;
        let params = vec![
            ("empresa", tenant_external_id.to_string()),
            ("pagina", page.to_string()),
            ("registros", page_size.to_string()),
            ("vendedor", vendor.unwrap_or_default().to_string()),
        ];
        let records = self.get_records(endpoint, params).await?;
        Ok(records.iter().filter_map(to_customer_record).collect())
    }

    async fn fetch_inventory_directory(
        &self,
        tenant_external_id: &str,
    ) -> Result<Vec<DirectoryEntry>, SourceApiError> {
        let Some(base) = &self.inventory_url else {
            return Ok(Vec::new());
        };
        let endpoint = format!("{}/referencias", base);
        let records = self
            .get_records(endpoint, vec![("empresa", tenant_external_id.to_string())])
            .await?;
        Ok(records.iter().filter_map(to_directory_entry).collect())
    }
}
