use serde::{Deserialize, Serialize};

/// Запись справочника номенклатуры: код товара → марка / класс.
/// `reference` хранится в канонической форме (см. нормализацию референсов).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub reference: String,
    #[serde(rename = "brandCode")]
    pub brand_code: Option<String>,
    pub brand: Option<String>,
    #[serde(rename = "classCode")]
    pub class_code: Option<String>,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
}

/// Ответ на загрузку CSV или синхронизацию справочника
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryImportResponse {
    pub tenant_id: String,
    /// Прочитано строк (до схлопывания дублей)
    pub rows_read: usize,
    /// Уникальных референсов записано
    pub upserted: usize,
    /// Пропущено строк (пустой референс / битая строка)
    pub skipped: usize,
}
