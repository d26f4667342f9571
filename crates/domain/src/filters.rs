use crawler_core::models::{RawRecord, ResultFilters};

/// 结果过滤，先于分类映射执行
pub struct RecordFilter;

impl RecordFilter {
    /// 返回被过滤的原因，通过时返回 `None`
    pub fn rejection_reason(record: &RawRecord, filters: &ResultFilters) -> Option<String> {
        if let Some(min_rating) = filters.min_rating {
            let rating = record.rating();
            if rating < min_rating {
                return Some(format!("filtered: rating {rating} below {min_rating}"));
            }
        }
        if let Some(min_year) = filters.min_year {
            let year = record.year();
            if year < min_year {
                return Some(format!("filtered: year {year} before {min_year}"));
            }
        }
        let area = record.vod_area.trim();
        if !area.is_empty() && filters.exclude_areas.iter().any(|a| a.trim() == area) {
            return Some(format!("filtered: area {area} excluded"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: &str, year: &str, area: &str) -> RawRecord {
        RawRecord {
            vod_name: "测试".to_string(),
            vod_score: score.to_string(),
            vod_year: year.to_string(),
            vod_area: area.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_filters_pass_everything() {
        let filters = ResultFilters::default();
        assert!(RecordFilter::rejection_reason(&record("", "", ""), &filters).is_none());
    }

    #[test]
    fn test_each_filter() {
        let filters = ResultFilters {
            min_rating: Some(6.0),
            min_year: Some(2010),
            exclude_areas: vec!["日本".to_string()],
        };
        assert!(RecordFilter::rejection_reason(&record("7.5", "2020", "大陆"), &filters).is_none());

        let reason = RecordFilter::rejection_reason(&record("5.9", "2020", "大陆"), &filters);
        assert!(reason.unwrap().contains("rating"));

        let reason = RecordFilter::rejection_reason(&record("8", "2001", "大陆"), &filters);
        assert!(reason.unwrap().contains("year"));

        let reason = RecordFilter::rejection_reason(&record("8", "2020", " 日本 "), &filters);
        assert!(reason.unwrap().contains("area"));
    }
}
