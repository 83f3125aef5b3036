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

/// Универсальный REST+JSON клиент: `GET {base_url}/{invoices|payments|customers|inventory}`
pub struct RestApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestApiClient {
    pub fn new(config: &SourceApiConfig) -> anyhow::Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("source_api.base_url is required for kind = \"rest\""))?;

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    async fn get_records(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<FlatRecord>, SourceApiError> {
        let url = build_url(&format!("{}/{}", self.base_url, resource), params);
        tracing::info!("REST source: GET {}", url);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let body = get_text(request, &url).await?;
        let records = extract(&body)?;
        tracing::info!("REST source: {} records from {}", records.len(), resource);
        Ok(records)
    }
}

fn window_params(
    tenant_external_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    options: &FetchOptions,
) -> Vec<(&'static str, String)> {
    vec![
        ("tenant", tenant_external_id.to_string()),
        ("from", from.format("%Y-%m-%d").to_string()),
        ("to", to.format("%Y-%m-%d").to_string()),
        ("customer", options.customer_nit.clone().unwrap_or_default()),
        ("vendor", options.vendor.clone().unwrap_or_default()),
    ]
}

#[async_trait]
impl SourceApi for RestApiClient {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_invoices(
        &self,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        options: &FetchOptions,
    ) -> Result<FetchedInvoices, SourceApiError> {
        let records = self
            .get_records("invoices", &window_params(tenant_external_id, from, to, options))
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
        let records = self
            .get_records("payments", &window_params(tenant_external_id, from, to, options))
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
        let params = [
            ("tenant", tenant_external_id.to_string()),
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
            ("vendor", vendor.unwrap_or_default().to_string()),
        ];
        let records = self.get_records("customers", &params).await?;
        Ok(records.iter().filter_map(to_customer_record).collect())
    }

    async fn fetch_inventory_directory(
        &self,
        tenant_external_id: &str,
    ) -> Result<Vec<DirectoryEntry>, SourceApiError> {
        let records = self
            .get_records("inventory", &[("tenant", tenant_external_id.to_string())])
            .await?;
        Ok(records.iter().filter_map(to_directory_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_required() {
        let config = SourceApiConfig::default();
        assert!(RestApiClient::new(&config).is_err());

        let config = SourceApiConfig {
            base_url: Some("http://localhost:9000/api/".into()),
            ..SourceApiConfig::default()
        };
        let client = RestApiClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9000/api");
    }
}
