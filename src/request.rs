use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReportError;

/// レポート期間 (両端を含む)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// `today` を含まない直近 n 日間
    pub fn last_n_days(n: u32, today: NaiveDate) -> Result<Self, ReportError> {
        if n == 0 {
            return Err(ReportError::Validation("日数は1以上を指定してください".into()));
        }
        let start = today.checked_sub_days(Days::new(u64::from(n)));
        let end = today.checked_sub_days(Days::new(1));
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(ReportError::Validation(format!(
                "日付範囲が表現できません: {} の {} 日前",
                today, n
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.start > self.end {
            return Err(ReportError::Validation(format!(
                "開始日 {} が終了日 {} より後です",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// レポート要求
///
/// 呼び出しごとに作る不変値。列順は `dimensions` → `metrics` の宣言順で固定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub name: String,
    /// GAQL の FROM 句に入るリソース名
    pub resource: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    pub date_range: DateRange,
    /// WHERE 句に AND で追加する条件
    #[serde(default)]
    pub filters: Vec<String>,
    /// 降順ソートに使うフィールド (segments.date ASC の後)
    #[serde(default)]
    pub order_by: Option<String>,
}

impl ReportRequest {
    pub fn new(resource: impl Into<String>, date_range: DateRange) -> Self {
        let resource = resource.into();
        Self {
            name: resource.clone(),
            resource,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            date_range,
            filters: Vec::new(),
            order_by: None,
        }
    }

    /// YAML のレポート定義から読み込む
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ReportError> {
        let request: ReportRequest = serde_yaml::from_str(yaml)?;
        Ok(request)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_dimensions<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_metrics<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_filter(mut self, predicate: impl Into<String>) -> Self {
        self.filters.push(predicate.into());
        self
    }

    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// SELECT するフィールド (列順)
    pub fn fields(&self) -> Vec<&str> {
        self.dimensions
            .iter()
            .chain(self.metrics.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if !is_identifier(&self.resource) {
            return Err(ReportError::InvalidQuery(format!(
                "リソース名が不正です: '{}'",
                self.resource
            )));
        }

        let fields = self.fields();
        if fields.is_empty() {
            return Err(ReportError::InvalidQuery(
                "フィールドが1つも指定されていません".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !is_field_path(field) {
                return Err(ReportError::InvalidQuery(format!(
                    "フィールド名が不正です: '{}'",
                    field
                )));
            }
            if !seen.insert(*field) {
                return Err(ReportError::InvalidQuery(format!(
                    "フィールドが重複しています: '{}'",
                    field
                )));
            }
        }

        if let Some(order_by) = &self.order_by {
            if !is_field_path(order_by) {
                return Err(ReportError::InvalidQuery(format!(
                    "ORDER BY のフィールド名が不正です: '{}'",
                    order_by
                )));
            }
        }

        self.date_range.validate()
    }

    /// GAQL クエリ文字列を組み立てる
    pub fn to_query(&self) -> String {
        let mut query = format!(
            "SELECT {} FROM {} WHERE segments.date BETWEEN '{}' AND '{}'",
            self.fields().join(", "),
            self.resource,
            self.date_range.start.format("%Y-%m-%d"),
            self.date_range.end.format("%Y-%m-%d"),
        );

        for predicate in &self.filters {
            query.push_str(" AND ");
            query.push_str(predicate);
        }

        query.push_str(" ORDER BY segments.date ASC");
        if let Some(order_by) = &self.order_by {
            query.push_str(&format!(", {} DESC", order_by));
        }

        query
    }
}

/// 顧客IDを正規化する (ハイフン・空白を除去)
pub fn validate_customer_id(customer_id: &str) -> Result<String, ReportError> {
    let clean: String = customer_id
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if clean.is_empty() || !clean.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReportError::Validation(format!(
            "顧客IDは数字である必要があります: '{}'",
            customer_id
        )));
    }

    if clean.len() != 10 {
        warn!(
            "Customer ID length is {}, expected 10: {}",
            clean.len(),
            customer_id
        );
    }

    Ok(clean)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// `resource.field[.sub...]` 形式か
fn is_field_path(field: &str) -> bool {
    let segments: Vec<&str> = field.split('.').collect();
    segments.len() >= 2 && segments.iter().all(|s| is_identifier(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_query_without_order_by() {
        let req = ReportRequest::new("campaign", range())
            .with_dimensions(["segments.date", "campaign.name"])
            .with_metrics(["metrics.clicks"]);

        assert_eq!(
            req.to_query(),
            "SELECT segments.date, campaign.name, metrics.clicks FROM campaign \
             WHERE segments.date BETWEEN '2024-03-01' AND '2024-03-07' \
             ORDER BY segments.date ASC"
        );
    }

    #[test]
    fn test_query_with_filters_and_order_by() {
        let req = ReportRequest::new("keyword_view", range())
            .with_dimensions(["ad_group_criterion.keyword.text"])
            .with_metrics(["metrics.impressions"])
            .with_filter("campaign.status = 'ENABLED'")
            .with_filter("metrics.impressions > 0")
            .with_order_by("metrics.impressions");

        assert_eq!(
            req.to_query(),
            "SELECT ad_group_criterion.keyword.text, metrics.impressions FROM keyword_view \
             WHERE segments.date BETWEEN '2024-03-01' AND '2024-03-07' \
             AND campaign.status = 'ENABLED' AND metrics.impressions > 0 \
             ORDER BY segments.date ASC, metrics.impressions DESC"
        );
    }

    #[test]
    fn test_fields_are_dimensions_then_metrics() {
        let req = ReportRequest::new("campaign", range())
            .with_metrics(["metrics.clicks"])
            .with_dimensions(["campaign.id"]);
        assert_eq!(req.fields(), vec!["campaign.id", "metrics.clicks"]);
    }

    #[test]
    fn test_validate_rejects_malformed_fields() {
        for bad in ["clicks", "metrics.Clicks", "metrics..clicks", "metrics.clicks;", ""] {
            let req = ReportRequest::new("campaign", range()).with_metrics([bad]);
            assert!(
                matches!(req.validate(), Err(ReportError::InvalidQuery(_))),
                "expected InvalidQuery for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        let dup = ReportRequest::new("campaign", range())
            .with_dimensions(["campaign.id"])
            .with_metrics(["campaign.id"]);
        assert!(matches!(dup.validate(), Err(ReportError::InvalidQuery(_))));

        let empty = ReportRequest::new("campaign", range());
        assert!(matches!(empty.validate(), Err(ReportError::InvalidQuery(_))));
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        );
        assert!(matches!(err, Err(ReportError::Validation(_))));
    }

    #[test]
    fn test_last_n_days_excludes_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let r = DateRange::last_n_days(7, today).unwrap();
        assert_eq!(r.start, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(r.end, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn test_last_n_days_out_of_range() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(matches!(
            DateRange::last_n_days(u32::MAX, today),
            Err(ReportError::Validation(_))
        ));
        assert!(matches!(
            DateRange::last_n_days(1, NaiveDate::MIN),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn test_customer_id_normalization() {
        assert_eq!(validate_customer_id("123-456-7890").unwrap(), "1234567890");
        assert_eq!(validate_customer_id(" 123 456 7890 ").unwrap(), "1234567890");
        assert!(matches!(
            validate_customer_id("invalid_id"),
            Err(ReportError::Validation(_))
        ));
        assert!(matches!(validate_customer_id(""), Err(ReportError::Validation(_))));
    }

    #[test]
    fn test_request_from_yaml() {
        let yaml = r#"
name: campaign_daily
resource: campaign
dimensions: [segments.date, campaign.name]
metrics: [metrics.cost_micros]
date_range:
  start: 2024-03-01
  end: 2024-03-07
order_by: metrics.cost_micros
"#;
        let req = ReportRequest::from_yaml_str(yaml).unwrap();
        assert_eq!(req.name, "campaign_daily");
        assert_eq!(req.date_range, range());
        assert_eq!(req.fields().len(), 3);
        assert!(req.validate().is_ok());
    }
}
