//! 列の型定義と型変換

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::request::ReportRequest;
use crate::value::{Micros, Value};

/// 整数で返るカウント系メトリクス
const COUNT_METRICS: &[&str] = &[
    "impressions",
    "clicks",
    "interactions",
    "engagements",
    "video_views",
    "active_view_impressions",
    "active_view_measurable_impressions",
    "view_through_conversions",
    "historical_quality_score",
];

/// f64 で誤差なく表せる整数の上限 (2^53)
const MAX_EXACT_F64_INT: i64 = 1 << 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    Text,
    Int64,
    Float64,
    /// マイクロ単位の通貨
    Currency,
    Date,
    Bool,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dtype::Text => "text",
            Dtype::Int64 => "int64",
            Dtype::Float64 => "float64",
            Dtype::Currency => "currency",
            Dtype::Date => "date",
            Dtype::Bool => "bool",
        };
        f.write_str(name)
    }
}

impl Dtype {
    /// フィールド名から既定の型を決める
    pub fn infer(field: &str) -> Self {
        let last = field.rsplit('.').next().unwrap_or(field);

        if last == "date" {
            Dtype::Date
        } else if last.ends_with("_micros") {
            Dtype::Currency
        } else if field.starts_with("metrics.") {
            if COUNT_METRICS.contains(&last) {
                Dtype::Int64
            } else {
                Dtype::Float64
            }
        } else if last == "id" {
            Dtype::Int64
        } else {
            Dtype::Text
        }
    }

    /// 値をこの型に変換する
    ///
    /// 変換済みの値を再度渡しても同じ値を返す。精度が落ちる変換は失敗させる。
    pub fn coerce(&self, value: Value) -> Result<Value, Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match (self, value) {
            (Dtype::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (Dtype::Text, Value::Date(d)) => Ok(Value::Text(d.format("%Y-%m-%d").to_string())),
            (Dtype::Text, Value::Micros(m)) => Ok(Value::Text(m.as_micros().to_string())),
            (Dtype::Text, other) => Ok(Value::Text(other.to_string())),

            (Dtype::Int64, Value::Int(i)) => Ok(Value::Int(i)),
            (Dtype::Int64, Value::Text(s)) => {
                s.trim().parse::<i64>().map(Value::Int).map_err(|_| Value::Text(s))
            }
            (Dtype::Int64, Value::Float(v)) => {
                float_to_int(v).map(Value::Int).ok_or(Value::Float(v))
            }

            (Dtype::Float64, Value::Float(v)) => Ok(Value::Float(v)),
            (Dtype::Float64, Value::Int(i)) => {
                if i.unsigned_abs() <= MAX_EXACT_F64_INT as u64 {
                    Ok(Value::Float(i as f64))
                } else {
                    Err(Value::Int(i))
                }
            }
            (Dtype::Float64, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Value::Float(v)),
                _ => Err(Value::Text(s)),
            },

            (Dtype::Currency, Value::Micros(m)) => Ok(Value::Micros(m)),
            (Dtype::Currency, Value::Int(i)) => Ok(Value::Micros(Micros::new(i))),
            (Dtype::Currency, Value::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(|i| Value::Micros(Micros::new(i)))
                .map_err(|_| Value::Text(s)),
            (Dtype::Currency, Value::Float(v)) => float_to_int(v)
                .map(|i| Value::Micros(Micros::new(i)))
                .ok_or(Value::Float(v)),

            (Dtype::Date, Value::Date(d)) => Ok(Value::Date(d)),
            (Dtype::Date, Value::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| Value::Text(s)),

            (Dtype::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Dtype::Bool, Value::Text(s)) => match s.trim() {
                "true" | "TRUE" => Ok(Value::Bool(true)),
                "false" | "FALSE" => Ok(Value::Bool(false)),
                _ => Err(Value::Text(s)),
            },

            (_, other) => Err(other),
        }
    }
}

fn float_to_int(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_EXACT_F64_INT as f64 {
        Some(v as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub field: String,
    pub dtype: Dtype,
}

/// 整形先スキーマ (フィールド → 型、順序付き)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 要求フィールドから既定スキーマを作る
    pub fn infer(request: &ReportRequest) -> Self {
        request
            .fields()
            .into_iter()
            .fold(Self::new(), |schema, field| {
                schema.with_column(field, Dtype::infer(field))
            })
    }

    /// 列を追加する。既存フィールドの場合は型を置き換える。
    pub fn with_column(mut self, field: impl Into<String>, dtype: Dtype) -> Self {
        let field = field.into();
        match self.columns.iter_mut().find(|c| c.field == field) {
            Some(existing) => existing.dtype = dtype,
            None => self.columns.push(ColumnSpec { field, dtype }),
        }
        self
    }

    /// 既存列の型だけを上書きする
    pub fn with_dtype(mut self, field: &str, dtype: Dtype) -> Result<Self, ReportError> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.field == field)
            .ok_or_else(|| {
                ReportError::Validation(format!("スキーマに存在しないフィールドです: '{}'", field))
            })?;
        column.dtype = dtype;
        Ok(self)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn dtype(&self, field: &str) -> Option<Dtype> {
        self.columns.iter().find(|c| c.field == field).map(|c| c.dtype)
    }
}
