//! Превращает сырой ответ ERP (JSON или XML произвольной вложенности) в плоский
//! список записей "имя поля → скалярное значение" без знания схемы.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Плоская запись: имя поля → значение (скаляры приведены к строке)
pub type FlatRecord = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("payload is neither JSON nor XML (JSON error: {0})")]
    InvalidJson(String),
    #[error("payload is not well-formed XML: {0}")]
    InvalidXml(String),
}

/// Извлечь записи из тела ответа.
///
/// Ошибка возвращается, только если корень документа не разбирается ни как JSON, ни как XML;
/// битые или нескалярные внутренние элементы просто пропускаются.
pub fn extract(payload: &str) -> Result<Vec<FlatRecord>, ExtractionError> {
    let text = payload.trim_start_matches('\u{FEFF}').trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if text.starts_with('<') {
        extract_xml(text)
    } else {
        extract_json(text)
    }
}

// ============================================================================
// JSON
// ============================================================================

fn extract_json(text: &str) -> Result<Vec<FlatRecord>, ExtractionError> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(records_from_json(value)),
        Err(parse_error) => {
            // ERP иногда оборачивает JSON в пояснительный текст
            let salvaged = embedded_json_candidates(text)
                .into_iter()
                .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok());
            match salvaged {
                Some(value) => Ok(records_from_json(value)),
                None => Err(ExtractionError::InvalidJson(parse_error.to_string())),
            }
        }
    }
}

fn records_from_json(value: Value) -> Vec<FlatRecord> {
    // Двойное кодирование: корень: строка, внутри которой JSON
    if let Value::String(inner) = &value {
        let inner = inner.trim();
        if inner.starts_with('[') || inner.starts_with('{') {
            if let Ok(decoded) = serde_json::from_str::<Value>(inner) {
                return records_from_json(decoded);
            }
        }
    }

    let mut out = Vec::new();
    visit_json(&value, &mut out);
    out
}

fn visit_json(value: &Value, out: &mut Vec<FlatRecord>) {
    match value {
        Value::Object(map) => {
            if map.values().all(is_json_scalar) {
                let record: FlatRecord = map
                    .iter()
                    .filter_map(|(k, v)| json_scalar_to_string(v).map(|s| (k.clone(), s)))
                    .collect();
                if !record.is_empty() {
                    out.push(record);
                }
            } else {
                for child in map.values().filter(|v| !is_json_scalar(v)) {
                    visit_json(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_json(item, out);
            }
        }
        _ => {}
    }
}

fn is_json_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn json_scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Подстроки от первой `[` / `{` до парной закрывающей скобки, в порядке появления.
fn embedded_json_candidates(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = ['[', '{'].iter().filter_map(|c| text.find(*c)).collect();
    starts.sort_unstable();

    let mut candidates = Vec::new();
    for start in starts {
        if let Some(end) = balanced_end(text, start) {
            candidates.push(&text[start..=end]);
        }
        // Несбалансированный хвост: до последней закрывающей скобки того же вида
        let closer = if text[start..].starts_with('[') { ']' } else { '}' };
        if let Some(end) = text.rfind(closer).filter(|e| *e > start) {
            candidates.push(&text[start..=end]);
        }
    }
    candidates
}

fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

// ============================================================================
// XML
// ============================================================================

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
    text: String,
}

impl XmlNode {
    /// Лист с текстом (атрибуты допустимы): значение поля.
    /// Пустой лист с атрибутами: это строка данных, а не поле.
    fn is_scalar(&self) -> bool {
        self.children.is_empty() && (self.attrs.is_empty() || !self.text.trim().is_empty())
    }
}

fn extract_xml(text: &str) -> Result<Vec<FlatRecord>, ExtractionError> {
    let roots = parse_xml_tree(text)?;

    // ASMX-сервисы отдают JSON внутри единственного текстового элемента
    if let [root] = roots.as_slice() {
        let inner = root.text.trim();
        if root.children.is_empty() && (inner.starts_with('[') || inner.starts_with('{')) {
            return extract_json(inner);
        }
    }

    let mut out = Vec::new();
    for root in &roots {
        visit_xml(root, &mut out);
    }
    Ok(out)
}

fn visit_xml(node: &XmlNode, out: &mut Vec<FlatRecord>) {
    if node.children.is_empty() {
        if !node.is_scalar() {
            out.push(node.attrs.iter().cloned().collect());
        }
        return;
    }

    if node.children.iter().all(XmlNode::is_scalar) {
        let mut record: FlatRecord = node.attrs.iter().cloned().collect();
        for child in &node.children {
            record.insert(child.name.clone(), child.text.trim().to_string());
        }
        out.push(record);
    } else {
        for child in node.children.iter().filter(|c| !c.is_scalar()) {
            visit_xml(child, out);
        }
    }
}

fn parse_xml_tree(text: &str) -> Result<Vec<XmlNode>, ExtractionError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut roots: Vec<XmlNode> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            ExtractionError::InvalidXml(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;
        match event {
            Event::Start(e) => stack.push(start_node(&e)?),
            Event::Empty(e) => {
                let node = start_node(&e)?;
                attach(&mut stack, &mut roots, node);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ExtractionError::InvalidXml("unexpected closing tag".into()))?;
                attach(&mut stack, &mut roots, node);
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| ExtractionError::InvalidXml(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ExtractionError::InvalidXml(format!(
            "element <{}> is not closed",
            open.name
        )));
    }
    if roots.is_empty() {
        return Err(ExtractionError::InvalidXml("no root element".into()));
    }
    Ok(roots)
}

fn start_node(e: &BytesStart<'_>) -> Result<XmlNode, ExtractionError> {
    let mut node = XmlNode {
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        ..Default::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ExtractionError::InvalidXml(err.to_string()))?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ExtractionError::InvalidXml(err.to_string()))?
            .into_owned();
        node.attrs.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], roots: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> FlatRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_json_array() {
        let records = extract(r#"[{"nit":"900","total":1000.5,"activo":true,"nota":null}]"#).unwrap();
        assert_eq!(
            records,
            vec![rec(&[("nit", "900"), ("total", "1000.5"), ("activo", "true")])]
        );
    }

    #[test]
    fn test_json_wrapped_in_text() {
        let records = extract("Result: [{\"a\":1}]").unwrap();
        assert_eq!(records, vec![rec(&[("a", "1")])]);

        let records = extract("  respuesta OK {\"a\":\"x\"} fin").unwrap();
        assert_eq!(records, vec![rec(&[("a", "x")])]);
    }

    #[test]
    fn test_json_nested_wrappers_are_flattened() {
        let payload = r#"{"status":"ok","data":{"rows":[{"id":"1"},{"id":"2"}],"meta":{"page":1}}}"#;
        let records = extract(payload).unwrap();
        assert_eq!(
            records,
            vec![rec(&[("id", "1")]), rec(&[("id", "2")]), rec(&[("page", "1")])]
        );
    }

    #[test]
    fn test_json_skips_non_record_items() {
        let records = extract(r#"[1, "x", null, {"a":"b"}, {}]"#).unwrap();
        assert_eq!(records, vec![rec(&[("a", "b")])]);
    }

    #[test]
    fn test_double_encoded_json() {
        let records = extract(r#""[{\"nit\":\"1\"}]""#).unwrap();
        assert_eq!(records, vec![rec(&[("nit", "1")])]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(
            extract("Internal failure, try later"),
            Err(ExtractionError::InvalidJson(_))
        ));
        assert!(matches!(extract("<a><b></a>"), Err(ExtractionError::InvalidXml(_))));
        assert!(matches!(extract("<a><b>"), Err(ExtractionError::InvalidXml(_))));
    }

    #[test]
    fn test_empty_payload_has_no_records() {
        assert!(extract("").unwrap().is_empty());
        assert!(extract("\u{FEFF}  \n").unwrap().is_empty());
    }

    #[test]
    fn test_dataset_xml_with_bom() {
        let payload = "\u{FEFF}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <NewDataSet>\
              <Table><CEDULA>900.1-K</CEDULA><NOMBRE>ACME &amp; CIA</NOMBRE></Table>\
              <Table><CEDULA>800</CEDULA><NOMBRE><![CDATA[Beta <SAS>]]></NOMBRE></Table>\
            </NewDataSet>";
        let records = extract(payload).unwrap();
        assert_eq!(
            records,
            vec![
                rec(&[("CEDULA", "900.1-K"), ("NOMBRE", "ACME & CIA")]),
                rec(&[("CEDULA", "800"), ("NOMBRE", "Beta <SAS>")]),
            ]
        );
    }

    #[test]
    fn test_xml_arbitrary_wrappers_and_namespaces() {
        let payload = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
              <soap:Body><Resp><Ventas>
                <Venta><Factura>F1</Factura><Total moneda="COP">1000</Total><Vacio/></Venta>
              </Ventas><Count>1</Count></Resp></soap:Body></soap:Envelope>"#;
        let records = extract(payload).unwrap();
        assert_eq!(
            records,
            vec![rec(&[("Factura", "F1"), ("Total", "1000"), ("Vacio", "")])]
        );
    }

    #[test]
    fn test_xml_attribute_rows() {
        let payload = r#"<rows><row nit="1" total="10"/><row nit="2" total="20"/></rows>"#;
        let records = extract(payload).unwrap();
        assert_eq!(
            records,
            vec![
                rec(&[("nit", "1"), ("total", "10")]),
                rec(&[("nit", "2"), ("total", "20")]),
            ]
        );
    }

    #[test]
    fn test_xml_string_wrapping_json() {
        let payload = r#"<?xml version="1.0"?><string xmlns="http://tempuri.org/">[{"NIT":"1","VALOR":"5"}]</string>"#;
        let records = extract(payload).unwrap();
        assert_eq!(records, vec![rec(&[("NIT", "1"), ("VALOR", "5")])]);
    }
}
