//! 行の列を揃えて型付きの表にする

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::ReportError;
use crate::row::ReportRow;
use crate::schema::{Dtype, Schema};
use crate::table::{Column, ReportTable};
use crate::value::Value;

const IMPRESSIONS_FIELD: &str = "metrics.impressions";
const DEFAULT_MAX_TEXT_LEN: usize = 255;

/// 列名の付け方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnNaming {
    /// `metrics.cost_micros` のまま
    #[default]
    Field,
    /// `cost_micros` のような短い名前
    Friendly,
}

impl ColumnNaming {
    pub fn apply(&self, field: &str) -> String {
        match self {
            ColumnNaming::Field => field.to_string(),
            ColumnNaming::Friendly => field
                .replace('.', "_")
                .replace("segments_", "")
                .replace("ad_group_criterion_", "")
                .replace("metrics_", ""),
        }
    }
}

/// テキスト列の掃除
///
/// 既定では NUL 除去・前後空白の除去・255文字への切り詰めのみ行う。
/// 非ASCII文字の除去は `ascii_only` を有効にしたときだけ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCleaning {
    /// 非ASCII文字を除去する
    pub ascii_only: bool,
    /// 文字数上限 (DBの VARCHAR 向け)
    pub max_len: Option<usize>,
}

impl Default for TextCleaning {
    fn default() -> Self {
        Self {
            ascii_only: false,
            max_len: Some(DEFAULT_MAX_TEXT_LEN),
        }
    }
}

impl TextCleaning {
    pub fn clean(&self, text: &str) -> String {
        let filtered: String = text
            .chars()
            .filter(|c| *c != '\0' && (!self.ascii_only || c.is_ascii()))
            .collect();
        let trimmed = filtered.trim();
        match self.max_len {
            Some(max) => trimmed.chars().take(max).collect::<String>().trim_end().to_string(),
            None => trimmed.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeOptions {
    /// インプレッションが 0 または null の行を除外する
    pub filter_zero_impressions: bool,
    pub text_cleaning: Option<TextCleaning>,
    /// null のテキストセルを埋める値
    pub text_fill: Option<String>,
    pub naming: ColumnNaming,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            filter_zero_impressions: true,
            text_cleaning: Some(TextCleaning::default()),
            text_fill: None,
            naming: ColumnNaming::Field,
        }
    }
}

impl ShapeOptions {
    /// 変換のみ行い、行の除外やテキスト加工をしない
    pub fn raw() -> Self {
        Self {
            filter_zero_impressions: false,
            text_cleaning: None,
            text_fill: None,
            naming: ColumnNaming::Field,
        }
    }

    pub fn with_filter_zero_impressions(mut self, enabled: bool) -> Self {
        self.filter_zero_impressions = enabled;
        self
    }

    pub fn with_text_cleaning(mut self, cleaning: Option<TextCleaning>) -> Self {
        self.text_cleaning = cleaning;
        self
    }

    pub fn with_text_fill(mut self, fill: impl Into<String>) -> Self {
        self.text_fill = Some(fill.into());
        self
    }

    pub fn with_naming(mut self, naming: ColumnNaming) -> Self {
        self.naming = naming;
        self
    }
}

/// ReportRow 列を ReportTable に整形する
#[derive(Debug, Clone)]
pub struct Shaper {
    schema: Schema,
    options: ShapeOptions,
}

impl Shaper {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            options: ShapeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ShapeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &ShapeOptions {
        &self.options
    }

    pub fn shape<I>(&self, rows: I) -> Result<ReportTable, ReportError>
    where
        I: IntoIterator<Item = ReportRow>,
    {
        let columns = self.build_columns()?;
        let specs = self.schema.columns();

        let mut shaped = Vec::new();
        for (row_idx, mut row) in rows.into_iter().enumerate() {
            let mut values = Vec::with_capacity(specs.len());
            for spec in specs {
                let raw = row.take(&spec.field).unwrap_or(Value::Null);
                let value = spec.dtype.coerce(raw).map_err(|rejected| ReportError::Coercion {
                    field: spec.field.clone(),
                    row: row_idx,
                    value: rejected.to_string(),
                    dtype: spec.dtype,
                })?;
                values.push(value);
            }

            // スキーマ分を取り出した残りはスキーマ外
            if let Some(extra) = row.fields().next() {
                return Err(ReportError::SchemaMismatch {
                    field: extra.to_string(),
                    row: row_idx,
                });
            }

            shaped.push(values);
        }

        let mut table = ReportTable::new(columns, shaped);
        self.post_process(&mut table);
        Ok(table)
    }

    fn build_columns(&self) -> Result<Vec<Column>, ReportError> {
        let mut seen = HashSet::new();
        self.schema
            .columns()
            .iter()
            .map(|spec| {
                let name = self.options.naming.apply(&spec.field);
                if !seen.insert(name.clone()) {
                    return Err(ReportError::DataProcessing(format!(
                        "列名が重複しています: '{}' ({})",
                        name, spec.field
                    )));
                }
                Ok(Column {
                    field: spec.field.clone(),
                    name,
                    dtype: spec.dtype,
                })
            })
            .collect()
    }

    fn post_process(&self, table: &mut ReportTable) {
        if self.options.filter_zero_impressions {
            if let Some(idx) = table.column_index(IMPRESSIONS_FIELD) {
                let before = table.len();
                table.retain_rows(|row| !is_zero_or_null(&row[idx]));
                let dropped = before - table.len();
                if dropped > 0 {
                    info!("Dropped {} rows with zero impressions", dropped);
                }
            }
        }

        let text_columns: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.dtype == Dtype::Text)
            .map(|(i, _)| i)
            .collect();

        if text_columns.is_empty() {
            return;
        }

        let cleaning = self.options.text_cleaning.as_ref();
        let fill = self.options.text_fill.as_deref();
        for row in table.rows_mut().iter_mut() {
            for &idx in &text_columns {
                let cell = &mut row[idx];
                if cell.is_null() {
                    if let Some(fill) = fill {
                        *cell = Value::Text(fill.to_string());
                    }
                } else if let (Value::Text(s), Some(cleaning)) = (&mut *cell, cleaning) {
                    *s = cleaning.clean(s);
                }
            }
        }
        debug!("Post-processed {} text columns", text_columns.len());
    }
}

fn is_zero_or_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Int(i) => *i == 0,
        Value::Float(f) => *f == 0.0,
        Value::Text(s) => s.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Micros;
    use chrono::NaiveDate;

    fn schema() -> Schema {
        Schema::new()
            .with_column("segments.date", Dtype::Date)
            .with_column("campaign.name", Dtype::Text)
            .with_column("metrics.impressions", Dtype::Int64)
            .with_column("metrics.cost_micros", Dtype::Currency)
            .with_column("metrics.ctr", Dtype::Float64)
    }

    fn row(date: &str, name: &str, impressions: &str) -> ReportRow {
        ReportRow::new()
            .with("segments.date", date)
            .with("campaign.name", name)
            .with("metrics.impressions", impressions)
    }

    #[test]
    fn test_shape_orders_and_null_fills() {
        let rows = vec![
            row("2024-03-01", "Brand", "10").with("metrics.cost_micros", "2500000"),
            row("2024-03-02", "Generic", "5").with("metrics.ctr", 0.2),
        ];
        let table = Shaper::new(schema())
            .with_options(ShapeOptions::raw())
            .shape(rows)
            .unwrap();

        assert_eq!(
            table.fields(),
            vec![
                "segments.date",
                "campaign.name",
                "metrics.impressions",
                "metrics.cost_micros",
                "metrics.ctr"
            ]
        );
        assert_eq!(
            table.get(0, "segments.date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(table.get(0, "metrics.impressions"), Some(&Value::Int(10)));
        assert_eq!(
            table.get(0, "metrics.cost_micros"),
            Some(&Value::Micros(Micros::new(2_500_000)))
        );
        assert_eq!(table.get(0, "metrics.ctr"), Some(&Value::Null));
        assert_eq!(table.get(1, "metrics.cost_micros"), Some(&Value::Null));
        assert_eq!(table.get(1, "campaign.name"), Some(&Value::from("Generic")));
    }

    #[test]
    fn test_unknown_field_is_schema_mismatch() {
        let rows = vec![
            row("2024-03-01", "Brand", "1"),
            row("2024-03-02", "Brand", "1").with("campaign.status", "ENABLED"),
        ];
        let err = Shaper::new(schema()).shape(rows).unwrap_err();
        match err {
            ReportError::SchemaMismatch { field, row } => {
                assert_eq!(field, "campaign.status");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bad_value_is_coercion_error() {
        let rows = vec![row("yesterday", "Brand", "1")];
        let err = Shaper::new(schema()).shape(rows).unwrap_err();
        assert!(matches!(err, ReportError::Coercion { ref field, row: 0, dtype: Dtype::Date, .. } if field == "segments.date"));
    }

    #[test]
    fn test_zero_impressions_filtered_in_order() {
        let rows = vec![
            row("2024-03-01", "a", "3"),
            row("2024-03-01", "b", "0"),
            ReportRow::new().with("campaign.name", "c"),
            row("2024-03-02", "d", "7"),
        ];
        let table = Shaper::new(schema()).shape(rows).unwrap();
        let names: Vec<&Value> = table.column("campaign.name").unwrap();
        assert_eq!(names, vec![&Value::from("a"), &Value::from("d")]);
    }

    #[test]
    fn test_text_cleaning_and_fill() {
        let cleaning = TextCleaning {
            ascii_only: true,
            max_len: Some(5),
        };
        assert_eq!(cleaning.clean("  Caf\u{e9}\0 Brand  "), "Caf B");
        assert_eq!(TextCleaning::default().clean("  São Paulo\0 "), "São Paulo");

        let rows = vec![ReportRow::new().with("metrics.impressions", "1")];
        let table = Shaper::new(schema())
            .with_options(ShapeOptions::default().with_text_fill(""))
            .shape(rows)
            .unwrap();
        assert_eq!(table.get(0, "campaign.name"), Some(&Value::from("")));
    }

    #[test]
    fn test_friendly_names() {
        let table = Shaper::new(schema())
            .with_options(ShapeOptions::raw().with_naming(ColumnNaming::Friendly))
            .shape(Vec::new())
            .unwrap();
        assert_eq!(
            table.column_names(),
            vec!["date", "campaign_name", "impressions", "cost_micros", "ctr"]
        );
        assert_eq!(
            ColumnNaming::Friendly.apply("ad_group_criterion.keyword.text"),
            "keyword_text"
        );
    }

    #[test]
    fn test_friendly_name_collision_is_error() {
        let schema = Schema::new()
            .with_column("segments.date", Dtype::Date)
            .with_column("metrics.date", Dtype::Date);
        let result = Shaper::new(schema)
            .with_options(ShapeOptions::raw().with_naming(ColumnNaming::Friendly))
            .shape(Vec::new());
        assert!(matches!(result, Err(ReportError::DataProcessing(_))));
    }

    #[test]
    fn test_reshape_is_idempotent() {
        let rows = vec![
            row("2024-03-01", "  Brand  ", "10").with("metrics.cost_micros", "1234567"),
            row("2024-03-02", "Generic", "0"),
            row("2024-03-03", "Other", "4").with("metrics.ctr", "0.75"),
        ];
        let shaper = Shaper::new(schema());
        let first = shaper.shape(rows).unwrap();
        let second = shaper.shape(first.to_rows()).unwrap();
        assert_eq!(first, second);
    }
}
