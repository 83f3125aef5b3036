//! Канонизация ключей, по которым записи ERP склеиваются с локальными:
//! NIT клиента и референс товара. Обе функции чистые, тотальные и идемпотентные.

use contracts::domain::a002_customer::aggregate::NO_NAME;

/// Канонический NIT: только цифры и, возможно, завершающая `K` (контрольный знак).
///
/// `"900.123.456-7"` → `"9001234567"`, `"123456k"` → `"123456K"`, пустой ввод → `""`.
pub fn normalize_customer_id(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .flat_map(char::to_uppercase)
        .collect();

    if is_canonical_nit(&compact) {
        return compact;
    }

    // Запасной путь: выбрасываем всё, кроме цифр, и возвращаем K, если она была в конце
    let had_k = compact.ends_with('K');
    let digits: String = compact.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if had_k {
        format!("{}K", digits)
    } else {
        digits
    }
}

fn is_canonical_nit(s: &str) -> bool {
    let body = s.strip_suffix('K').unwrap_or(s);
    !body.is_empty() && body.chars().all(|c| c.is_ascii_digit())
}

/// Канонический референс товара: без неразрывных пробелов, с одиночными пробелами, в верхнем регистре.
pub fn normalize_refer(raw: &str) -> String {
    raw.replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Проверка наименования клиента из ERP. Возвращает `None`, если имя мусорное:
/// пустое, совпадает с NIT, чисто числовое или автогенерированное "Cliente N...".
pub fn sanitize_customer_name(name: Option<&str>, nit: &str) -> Option<String> {
    let name = name.map(str::trim).filter(|n| !n.is_empty())?;

    if name == NO_NAME {
        return None;
    }
    if normalize_customer_id(name) == nit && !nit.is_empty() && looks_like_identifier(name) {
        return None;
    }
    if name
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | '-' | ','))
    {
        return None;
    }
    if is_generated_client_name(name) {
        return None;
    }
    Some(name.to_string())
}

fn looks_like_identifier(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | '-' | 'k' | 'K'))
}

/// "Cliente 123", "CLIENTE #45", "cliente No. 7", "Cliente N° 8", "cliente"
fn is_generated_client_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    let Some(rest) = lower.strip_prefix("cliente") else {
        return false;
    };
    let rest = rest.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '#' | ':' | '-' | '_' | '.' | '°' | 'º')
    });
    let rest = ["nro", "no", "n"]
        .iter()
        .find_map(|p| rest.strip_prefix(p))
        .unwrap_or(rest)
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '.' | '°' | 'º' | ':'));
    rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_digit())
}
