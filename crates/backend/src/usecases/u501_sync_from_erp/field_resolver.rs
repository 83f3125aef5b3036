//! Выбор значения поля по списку синонимов.
//!
//! Один и тот же логический столбец ERP отдаёт под разными именами в зависимости
//! от эндпоинта (`cedula`, `nit`, `documentocliente`, ...), поэтому каждое поле
//! читается через упорядоченный список кандидатов без учёта регистра.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use super::record_extractor::FlatRecord;

/// Индекс записи по именам полей в нижнем регистре. Строится один раз на запись.
pub struct FieldIndex<'a> {
    by_name: HashMap<String, &'a str>,
}

impl<'a> FieldIndex<'a> {
    pub fn new(record: &'a FlatRecord) -> Self {
        let by_name = record
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.as_str()))
            .collect();
        Self { by_name }
    }

    /// Первый кандидат (в порядке приоритета) с непустым значением.
    pub fn pick(&self, candidates: &[&str]) -> Option<&'a str> {
        candidates.iter().find_map(|name| {
            self.by_name
                .get(&name.to_lowercase())
                .copied()
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
    }

    pub fn pick_string(&self, candidates: &[&str]) -> Option<String> {
        self.pick(candidates).map(str::to_string)
    }

    pub fn pick_number(&self, candidates: &[&str]) -> Option<f64> {
        candidates
            .iter()
            .find_map(|name| self.pick(&[*name]).and_then(parse_decimal))
    }

    pub fn pick_date(&self, candidates: &[&str]) -> Option<NaiveDate> {
        candidates
            .iter()
            .find_map(|name| self.pick(&[*name]).and_then(parse_date))
    }
}

/// Однократный выбор без переиспользования индекса.
pub fn pick(record: &FlatRecord, candidates: &[&str]) -> Option<String> {
    FieldIndex::new(record).pick_string(candidates)
}

/// Parse decimal number in either European (`1.234,56`) or US (`1,234.56`) notation.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        // Both present: the rightmost one is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => {
            if cleaned.matches(',').count() == 1 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) => {
            if cleaned.matches('.').count() > 1 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the date shapes the ERP endpoints are known to emit.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // "05/01/2024 12:00:00 a. m." -> берём только дату
    let date_part = s.split_whitespace().next().unwrap_or(s);
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(d);
        }
    }
    None
}
