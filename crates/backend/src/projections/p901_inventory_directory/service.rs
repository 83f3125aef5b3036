use anyhow::Result;
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::projections::p901_inventory_directory::{DirectoryEntry, DirectoryImportResponse};
use std::collections::HashMap;

use super::csv_import::parse_directory_csv;
use crate::shared::data::storage::SyncStore;
use crate::usecases::u501_sync_from_erp::identity::normalize_refer;
use crate::usecases::u501_sync_from_erp::source_api::SourceApi;

/// Кэш справочника: нормализованный референс → марка / класс.
/// Загружается независимо от продаж и передаётся сборщику счетов.
#[derive(Debug, Clone, Default)]
pub struct BrandDirectory {
    by_reference: HashMap<String, DirectoryEntry>,
}

impl BrandDirectory {
    /// Последняя запись побеждает при повторе референса
    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut by_reference = HashMap::new();
        for mut entry in entries {
            entry.reference = normalize_refer(&entry.reference);
            if entry.reference.is_empty() {
                continue;
            }
            by_reference.insert(entry.reference.clone(), entry);
        }
        Self { by_reference }
    }

    pub fn lookup(&self, reference: &str) -> Option<&DirectoryEntry> {
        self.by_reference.get(&normalize_refer(reference))
    }

    pub fn len(&self) -> usize {
        self.by_reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reference.is_empty()
    }

    /// Словарь "код → наименование" для марок и классов
    pub fn code_names(&self) -> CodeNameMap {
        let mut map = CodeNameMap::default();
        for entry in self.by_reference.values() {
            if let (Some(code), Some(name)) = (&entry.brand_code, &entry.brand) {
                map.brands.insert(code_key(code), name.clone());
            }
            if let (Some(code), Some(name)) = (&entry.class_code, &entry.class_name) {
                map.classes.insert(code_key(code), name.clone());
            }
        }
        map
    }
}

/// Перевод кодов марок / классов в отображаемые наименования
#[derive(Debug, Clone, Default)]
pub struct CodeNameMap {
    brands: HashMap<String, String>,
    classes: HashMap<String, String>,
}

impl CodeNameMap {
    pub fn brand_name(&self, code: &str) -> Option<&str> {
        self.brands.get(&code_key(code)).map(String::as_str)
    }

    pub fn class_name(&self, code: &str) -> Option<&str> {
        self.classes.get(&code_key(code)).map(String::as_str)
    }

    #[cfg(test)]
    pub fn insert_brand(&mut self, code: &str, name: &str) {
        self.brands.insert(code_key(code), name.to_string());
    }
}

fn code_key(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Загрузить справочник арендатора из хранилища
pub async fn load(store: &dyn SyncStore, tenant_id: TenantId) -> Result<BrandDirectory> {
    let entries = store.list_directory_entries(tenant_id).await?;
    Ok(BrandDirectory::from_entries(entries))
}

/// Загрузка CSV справочника (upsert по референсу)
pub async fn import_csv(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    csv_text: &str,
) -> Result<DirectoryImportResponse> {
    let parsed = parse_directory_csv(csv_text)?;
    let upserted = store
        .upsert_directory_entries(tenant_id, &parsed.entries)
        .await?;

    tracing::info!(
        "Inventory directory CSV imported for tenant {}: upserted={}, skipped={}",
        tenant_id,
        upserted,
        parsed.skipped
    );

    Ok(DirectoryImportResponse {
        tenant_id: tenant_id.to_string(),
        rows_read: parsed.rows_read,
        upserted,
        skipped: parsed.skipped,
    })
}

/// Синхронизация справочника из эндпоинта инвентаря ERP
pub async fn sync_from_source(
    store: &dyn SyncStore,
    source: &dyn SourceApi,
    tenant_id: TenantId,
    tenant_external_id: &str,
) -> Result<DirectoryImportResponse> {
    let fetched = source.fetch_inventory_directory(tenant_external_id).await?;
    let rows_read = fetched.len();

    // Схлопнуть дубли (последний побеждает), сохранив порядок первого появления
    let mut entries: Vec<DirectoryEntry> = Vec::with_capacity(rows_read);
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;
    for mut entry in fetched {
        entry.reference = normalize_refer(&entry.reference);
        if entry.reference.is_empty() {
            skipped += 1;
            continue;
        }
        match position.get(&entry.reference) {
            Some(&pos) => entries[pos] = entry,
            None => {
                position.insert(entry.reference.clone(), entries.len());
                entries.push(entry);
            }
        }
    }

    let upserted = store.upsert_directory_entries(tenant_id, &entries).await?;
    tracing::info!(
        "Inventory directory synced from {} for tenant {}: rows={}, upserted={}",
        source.name(),
        tenant_id,
        rows_read,
        upserted
    );

    Ok(DirectoryImportResponse {
        tenant_id: tenant_id.to_string(),
        rows_read,
        upserted,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::memory_store::MemoryStore;

    fn entry(reference: &str, brand_code: Option<&str>, brand: Option<&str>) -> DirectoryEntry {
        DirectoryEntry {
            reference: reference.to_string(),
            brand_code: brand_code.map(str::to_string),
            brand: brand.map(str::to_string),
            class_code: None,
            class_name: None,
        }
    }

    #[test]
    fn test_lookup_uses_normalized_reference() {
        let dir = BrandDirectory::from_entries(vec![
            entry("ref  001", None, Some("Old")),
            entry("REF 001", None, Some("Acme")),
        ]);
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.lookup(" Ref\u{00A0}001 ").and_then(|e| e.brand.as_deref()), Some("Acme"));
        assert!(dir.lookup("REF 002").is_none());
    }

    #[test]
    fn test_code_names_from_entries_with_codes() {
        let dir = BrandDirectory::from_entries(vec![
            entry("R1", Some("ac"), Some("Acme")),
            entry("R2", None, Some("NoCode")),
        ]);
        let names = dir.code_names();
        assert_eq!(names.brand_name(" AC "), Some("Acme"));
        assert_eq!(names.class_name("AC"), None);
    }

    #[tokio::test]
    async fn test_import_csv_is_last_write_wins_across_uploads() {
        let store = MemoryStore::new();
        let tenant = TenantId::new_v4();

        let first = import_csv(&store, tenant, "REFERENCIA;Nombre MARCA\nR1;Old\nR2;Beta\n")
            .await
            .unwrap();
        assert_eq!(first.upserted, 2);

        import_csv(&store, tenant, "REFERENCIA;Nombre MARCA\nR1;New\n")
            .await
            .unwrap();

        let dir = load(&store, tenant).await.unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.lookup("R1").and_then(|e| e.brand.as_deref()), Some("New"));
    }
}
