//! 定義済みレポートモデル

use serde::{Deserialize, Serialize};

use crate::request::{DateRange, ReportRequest};

/// 定義済みレポート
///
/// `table_name` と `date_column` はロード先DBでの置き場所の目安。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportModel {
    pub report_name: String,
    pub resource: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    pub table_name: String,
    pub date_column: String,
}

const DEFAULT_DATE_COLUMN: &str = "date";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ReportModel {
    /// 任意のレポートモデルを作る
    pub fn custom(
        report_name: impl Into<String>,
        resource: impl Into<String>,
        dimensions: &[&str],
        metrics: &[&str],
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            report_name: report_name.into(),
            resource: resource.into(),
            dimensions: strings(dimensions),
            metrics: strings(metrics),
            filters: Vec::new(),
            order_by: None,
            table_name: table_name.into(),
            date_column: DEFAULT_DATE_COLUMN.to_string(),
        }
    }

    pub fn with_filter(mut self, predicate: impl Into<String>) -> Self {
        self.filters.push(predicate.into());
        self
    }

    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// 期間を指定して ReportRequest にする
    pub fn request(&self, date_range: DateRange) -> ReportRequest {
        let mut request = ReportRequest::new(self.resource.clone(), date_range)
            .with_name(self.report_name.clone())
            .with_dimensions(self.dimensions.iter().cloned())
            .with_metrics(self.metrics.iter().cloned());
        request.filters = self.filters.clone();
        request.order_by = self.order_by.clone();
        request
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::adgroup_ad_report(),
            Self::assetgroup_report(),
            Self::conversions_report(),
            Self::keyword_report(),
            Self::video_report(),
            Self::search_terms_report(),
        ]
    }

    pub fn by_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|m| m.report_name == name)
    }

    pub fn adgroup_ad_report() -> Self {
        Self::custom(
            "adgroup_ad_report",
            "ad_group_ad",
            &[
                "ad_group_ad.ad.id",
                "ad_group_ad.ad.name",
                "segments.date",
                "segments.ad_network_type",
                "campaign.advertising_channel_type",
                "campaign.id",
                "ad_group.id",
                "campaign.name",
                "ad_group.name",
                "ad_group_ad.ad.final_urls",
            ],
            &[
                "metrics.average_cpm",
                "metrics.impressions",
                "metrics.clicks",
                "metrics.ctr",
                "metrics.average_cpc",
                "metrics.cost_micros",
                "metrics.engagements",
                "metrics.engagement_rate",
                "metrics.interactions",
                "metrics.interaction_rate",
                "metrics.conversions",
                "metrics.conversions_from_interactions_rate",
                "metrics.conversions_value",
                "metrics.value_per_conversion",
                "metrics.value_per_all_conversions",
                "metrics.cost_per_conversion",
                "metrics.absolute_top_impression_percentage",
                "metrics.active_view_impressions",
                "metrics.active_view_measurable_impressions",
                "metrics.video_quartile_p100_rate",
                "metrics.video_quartile_p25_rate",
                "metrics.video_quartile_p50_rate",
                "metrics.video_quartile_p75_rate",
                "metrics.video_view_rate",
                "metrics.video_views",
                "metrics.view_through_conversions",
            ],
            "olap__gads_adgroup_ad_report",
        )
        .with_order_by("metrics.impressions")
    }

    pub fn assetgroup_report() -> Self {
        Self::custom(
            "assetgroup_report",
            "asset_group",
            &[
                "segments.date",
                "asset_group.campaign",
                "asset_group.id",
                "asset_group.name",
                "asset_group.final_urls",
            ],
            &[
                "metrics.impressions",
                "metrics.clicks",
                "metrics.ctr",
                "metrics.average_cpc",
                "metrics.cost_micros",
                "metrics.interactions",
                "metrics.interaction_rate",
                "metrics.conversions",
                "metrics.conversions_from_interactions_rate",
                "metrics.conversions_value",
                "metrics.value_per_conversion",
                "metrics.value_per_all_conversions",
                "metrics.cost_per_conversion",
            ],
            "olap__gads_assetgroup_report",
        )
        .with_order_by("metrics.impressions")
    }

    pub fn conversions_report() -> Self {
        Self::custom(
            "conversions_report",
            "conversion_action",
            &[
                "segments.date",
                "conversion_action.id",
                "conversion_action.name",
                "conversion_action.category",
                "conversion_action.origin",
                "conversion_action.type",
                "conversion_action.counting_type",
                "conversion_action.status",
            ],
            &["metrics.all_conversions", "metrics.all_conversions_value"],
            "olap__gads_conversions",
        )
        .with_order_by("metrics.all_conversions")
    }

    pub fn keyword_report() -> Self {
        Self::custom(
            "keyword_report",
            "keyword_view",
            &[
                "segments.date",
                "ad_group_criterion.keyword.text",
                "ad_group_criterion.keyword.match_type",
                "campaign.name",
                "ad_group.name",
                "campaign.advertising_channel_type",
            ],
            &[
                "metrics.historical_quality_score",
                "metrics.average_cpm",
                "metrics.impressions",
                "metrics.clicks",
                "metrics.ctr",
                "metrics.average_cpc",
                "metrics.cost_micros",
                "metrics.conversions_from_interactions_rate",
                "metrics.conversions_value",
                "metrics.conversions",
                "metrics.cost_per_conversion",
            ],
            "olap__gads_keyword_report",
        )
        .with_order_by("metrics.impressions")
    }

    pub fn video_report() -> Self {
        Self::custom(
            "video_report",
            "video",
            &[
                "segments.date",
                "segments.ad_network_type",
                "video.title",
                "campaign.name",
                "ad_group.name",
                "campaign.advertising_channel_type",
            ],
            &[
                "metrics.average_cpm",
                "metrics.impressions",
                "metrics.clicks",
                "metrics.ctr",
                "metrics.average_cpc",
                "metrics.cost_micros",
                "metrics.conversions_from_interactions_rate",
                "metrics.conversions_value",
                "metrics.conversions",
                "metrics.cost_per_conversion",
                "metrics.engagement_rate",
                "metrics.engagements",
                "metrics.value_per_all_conversions",
                "metrics.value_per_conversion",
                "metrics.video_quartile_p100_rate",
                "metrics.video_quartile_p25_rate",
                "metrics.video_quartile_p50_rate",
                "metrics.video_quartile_p75_rate",
                "metrics.video_view_rate",
                "metrics.video_views",
                "metrics.view_through_conversions",
            ],
            "olap__gads_video_report",
        )
        .with_order_by("metrics.impressions")
    }

    pub fn search_terms_report() -> Self {
        Self::custom(
            "search_terms_report",
            "search_term_view",
            &[
                "segments.date",
                "search_term_view.search_term",
                "segments.keyword.info.match_type",
                "search_term_view.status",
                "campaign.name",
                "ad_group.name",
                "campaign.advertising_channel_type",
            ],
            &[
                "metrics.average_cpm",
                "metrics.impressions",
                "metrics.clicks",
                "metrics.ctr",
                "metrics.average_cpc",
                "metrics.cost_micros",
                "metrics.conversions_from_interactions_rate",
                "metrics.conversions_value",
                "metrics.conversions",
                "metrics.cost_per_conversion",
            ],
            "olap__gads_search_terms_report",
        )
        .with_order_by("metrics.impressions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_all_models_produce_valid_requests() {
        for model in ReportModel::all() {
            let request = model.request(range());
            assert!(
                request.validate().is_ok(),
                "model {} is invalid",
                model.report_name
            );
            assert_eq!(request.name, model.report_name);
        }
    }

    #[test]
    fn test_model_names_are_unique() {
        let models = ReportModel::all();
        let mut names: Vec<&str> = models.iter().map(|m| m.report_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), models.len());
    }

    #[test]
    fn test_by_name() {
        let model = ReportModel::by_name("keyword_report").unwrap();
        assert_eq!(model.resource, "keyword_view");
        assert_eq!(model.table_name, "olap__gads_keyword_report");
        assert!(ReportModel::by_name("insight_report").is_none());
    }

    #[test]
    fn test_keyword_query() {
        let query = ReportModel::keyword_report().request(range()).to_query();
        assert!(query.starts_with("SELECT segments.date, ad_group_criterion.keyword.text"));
        assert!(query.contains(" FROM keyword_view WHERE segments.date BETWEEN '2024-03-01' AND '2024-03-31'"));
        assert!(query.ends_with("ORDER BY segments.date ASC, metrics.impressions DESC"));
    }

    #[test]
    fn test_custom_model() {
        let model = ReportModel::custom(
            "campaign_status",
            "campaign",
            &["campaign.id", "campaign.status"],
            &["metrics.clicks"],
            "olap__gads_campaign_status",
        )
        .with_filter("campaign.status != 'REMOVED'");
        let request = model.request(range());
        assert_eq!(request.filters, vec!["campaign.status != 'REMOVED'".to_string()]);
        assert_eq!(request.order_by, None);
    }
}
