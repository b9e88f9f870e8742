//! APIレスポンス1件分の行

use serde_json::Map;

use crate::value::Value;

/// 1レコード (フィールド名 → 値、出現順を保持)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    cells: Vec<(String, Value)>,
}

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を設定する (同名フィールドは上書き)
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((field, value)),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.cells.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(f, _)| f.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn take(&mut self, field: &str) -> Option<Value> {
        let idx = self.cells.iter().position(|(f, _)| f == field)?;
        Some(self.cells.remove(idx).1)
    }

    /// `results[]` の1要素を平坦化する
    ///
    /// ネストしたオブジェクトはドット区切りのパスになる。camelCase のキーは
    /// `requested` に一致するフィールド名へ戻し、一致しなければ snake_case に変換する。
    /// 要求されていない `*.resource_name` は捨てる。
    pub fn from_result(result: &serde_json::Value, requested: &[&str]) -> Self {
        let mut row = ReportRow::new();
        if let serde_json::Value::Object(map) = result {
            flatten_into(&mut row, "", map, requested);
        }
        row
    }
}

impl FromIterator<(String, Value)> for ReportRow {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut row = ReportRow::new();
        for (field, value) in iter {
            row.insert(field, value);
        }
        row
    }
}

fn flatten_into(
    row: &mut ReportRow,
    prefix: &str,
    map: &Map<String, serde_json::Value>,
    requested: &[&str],
) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            // 値がすべて既定値のメッセージは `{}` で届く
            serde_json::Value::Object(inner) => {
                flatten_into(row, &path, inner, requested);
            }
            leaf => {
                let field = resolve_field(&path, requested);
                if field.ends_with(".resource_name") && !requested.contains(&field.as_str()) {
                    continue;
                }
                row.insert(field, Value::from_json(leaf));
            }
        }
    }
}

fn resolve_field(json_path: &str, requested: &[&str]) -> String {
    requested
        .iter()
        .find(|field| to_json_path(field) == json_path)
        .map(|field| field.to_string())
        .unwrap_or_else(|| to_field_path(json_path))
}

/// `metrics.cost_micros` → `metrics.costMicros`
pub(crate) fn to_json_path(field: &str) -> String {
    field
        .split('.')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut upper = false;
            for c in segment.chars() {
                if c == '_' {
                    upper = true;
                } else if upper {
                    out.extend(c.to_uppercase());
                    upper = false;
                } else {
                    out.push(c);
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// `metrics.costMicros` → `metrics.cost_micros`
pub(crate) fn to_field_path(json_path: &str) -> String {
    let mut out = String::with_capacity(json_path.len() + 4);
    for c in json_path.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
