//! セル値とマイクロ単位通貨

use std::fmt;

use chrono::NaiveDate;

const MICROS_PER_UNIT: i64 = 1_000_000;

/// マイクロ単位の通貨額 (値 × 1,000,000)
///
/// 単位への変換は整数除算と剰余のみで行い、`f64` を経由しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(pub i64);

impl Micros {
    pub fn new(micros: i64) -> Self {
        Self(micros)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    /// 整数部 (0方向に切り捨て)
    pub fn units(&self) -> i64 {
        self.0 / MICROS_PER_UNIT
    }

    /// 小数部のマイクロ値 (符号は元の値に従う)
    pub fn fraction(&self) -> i64 {
        self.0 % MICROS_PER_UNIT
    }

    /// Arrow Decimal128(scale=6) 用の値
    pub fn to_decimal128(&self) -> i128 {
        i128::from(self.0)
    }

    /// 表示専用。計算には使わないこと。
    pub fn to_f64_lossy(&self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT as f64
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_unit = MICROS_PER_UNIT as u64;
        write!(f, "{}{}.{:06}", sign, abs / per_unit, abs % per_unit)
    }
}

/// レポートの1セル
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Micros(Micros),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_micros(&self) -> Option<Micros> {
        match self {
            Value::Micros(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// JSONの葉をそのまま値にする (型変換はしない)
    pub(crate) fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            // repeated フィールド (final_urls など) はJSON文字列として保持
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Micros(m) => write!(f, "{}", m),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Micros> for Value {
    fn from(m: Micros) -> Self {
        Value::Micros(m)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_exact_conversion() {
        let cost = Micros::new(12_345_678);
        assert_eq!(cost.units(), 12);
        assert_eq!(cost.fraction(), 345_678);
        assert_eq!(cost.to_string(), "12.345678");
    }

    #[test]
    fn test_micros_negative_and_small() {
        assert_eq!(Micros::new(-1_500_000).to_string(), "-1.500000");
        assert_eq!(Micros::new(-5).to_string(), "-0.000005");
        assert_eq!(Micros::new(999_999).units(), 0);
        assert_eq!(Micros::new(i64::MIN).to_string(), "-9223372036854.775808");
    }

    #[test]
    fn test_micros_beyond_f64_precision_stays_exact() {
        // 2^53 + 1 は f64 で表現できない
        let m = Micros::new(9_007_199_254_740_993);
        assert_eq!(m.to_string(), "9007199254.740993");
        assert_eq!(m.to_decimal128(), 9_007_199_254_740_993i128);
    }

    #[test]
    fn test_value_from_json_leaves() {
        assert_eq!(Value::from_json(&serde_json::json!("123")), Value::Text("123".into()));
        assert_eq!(Value::from_json(&serde_json::json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(&serde_json::json!(0.25)), Value::Float(0.25));
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
        assert_eq!(
            Value::from_json(&serde_json::json!(["https://a.example"])),
            Value::Text("[\"https://a.example\"]".into())
        );
    }
}
