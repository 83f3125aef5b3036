use async_trait::async_trait;
use chrono::NaiveDate;

use super::source_api::{SourceApi, SourceApiError};
use super::source_models::{CustomerRecord, FetchOptions, FetchedInvoices, PaymentRecord};

/// Источник-заглушка: используется, когда внешняя система не настроена
pub struct MockApiClient;

#[async_trait]
impl SourceApi for MockApiClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_invoices(
        &self,
        tenant_external_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        _options: &FetchOptions,
    ) -> Result<FetchedInvoices, SourceApiError> {
        tracing::debug!("Mock source: no invoices for {} {}..{}", tenant_external_id, from, to);
        Ok(FetchedInvoices::default())
    }

    async fn fetch_payments(
        &self,
        _tenant_external_id: &str,
        _from: NaiveDate,
        _to: NaiveDate,
        _options: &FetchOptions,
    ) -> Result<Vec<PaymentRecord>, SourceApiError> {
        Ok(Vec::new())
    }

    async fn fetch_customers(
        &self,
        _tenant_external_id: &str,
        _page: u32,
        _page_size: u32,
        _vendor: Option<&str>,
    ) -> Result<Vec<CustomerRecord>, SourceApiError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_empty_everything() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let api = MockApiClient;
        let invoices = api
            .fetch_invoices("EMP01", day, day, &FetchOptions::default())
            .await
            .unwrap();
        assert!(invoices.invoices.is_empty());
        assert!(api.fetch_customers("EMP01", 1, 100, None).await.unwrap().is_empty());
        assert!(api.fetch_inventory_directory("EMP01").await.unwrap().is_empty());
    }
}
