//! Date-relative bucketing of the live-events source

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::{ChannelRecord, TemporalBucket};
use crate::utils::time::parse_date_token;

/// Records of the live-events source grouped by bucket, in arrival order
pub type TemporalBuckets<'r> = BTreeMap<TemporalBucket, Vec<&'r ChannelRecord>>;

/// Buckets records by their section date relative to a reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalClassifier {
    reference: NaiveDate,
}

impl TemporalClassifier {
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference
    }

    /// Bucket for a section date; records without one are `Other`
    pub fn bucket_for(&self, section_date: Option<NaiveDate>) -> TemporalBucket {
        match section_date {
            Some(date) => {
                TemporalBucket::from_day_offset(date.signed_duration_since(self.reference).num_days())
            }
            None => TemporalBucket::Other,
        }
    }

    /// Bucket for a raw `YYYYMMDD` token; unparsable tokens are `Other`
    pub fn bucket_for_token(&self, token: &str) -> TemporalBucket {
        self.bucket_for(parse_date_token(token.trim()))
    }

    /// Group records by bucket; every bucket is present, possibly empty
    pub fn classify<'r, I>(&self, records: I) -> TemporalBuckets<'r>
    where
        I: IntoIterator<Item = &'r ChannelRecord>,
    {
        let mut buckets: TemporalBuckets<'r> = TemporalBucket::ALL
            .iter()
            .map(|bucket| (*bucket, Vec::new()))
            .collect();

        for record in records {
            buckets
                .entry(self.bucket_for(record.section_date))
                .or_default()
                .push(record);
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;

    fn classifier() -> TemporalClassifier {
        TemporalClassifier::new(NaiveDate::from_ymd_opt(2024, 6, 16).unwrap())
    }

    #[test]
    fn test_bucket_for_token() {
        let c = classifier();
        assert_eq!(c.bucket_for_token("20240615"), TemporalBucket::Yesterday);
        assert_eq!(c.bucket_for_token("20240616"), TemporalBucket::Today);
        assert_eq!(c.bucket_for_token("20240617"), TemporalBucket::Tomorrow);
        assert_eq!(c.bucket_for_token("20240620"), TemporalBucket::Other);
        assert_eq!(c.bucket_for_token("20241332"), TemporalBucket::Other);
        assert_eq!(c.bucket_for_token("2024-06-16"), TemporalBucket::Other);
    }

    #[test]
    fn test_reference_date_shifts_bucket() {
        let token = "20240615";
        let day = |d| TemporalClassifier::new(NaiveDate::from_ymd_opt(2024, 6, d).unwrap());
        assert_eq!(day(16).bucket_for_token(token), TemporalBucket::Yesterday);
        assert_eq!(day(14).bucket_for_token(token), TemporalBucket::Tomorrow);
        assert_eq!(day(15).bucket_for_token(token), TemporalBucket::Today);
    }

    #[test]
    fn test_classify_groups_in_arrival_order() {
        let record = |name: &str, date: Option<NaiveDate>| ChannelRecord {
            raw_name: name.to_string(),
            normalized_name: name.to_uppercase(),
            group: Some("赛事".to_string()),
            stream_url: format!("http://events.example.com/{name}"),
            source_id: SourceId::from("events"),
            section_date: date,
            attributes: Vec::new(),
            duration: "-1".to_string(),
        };
        let records = vec![
            record("a", NaiveDate::from_ymd_opt(2024, 6, 16)),
            record("b", None),
            record("c", NaiveDate::from_ymd_opt(2024, 6, 15)),
            record("d", NaiveDate::from_ymd_opt(2024, 6, 16)),
        ];

        let buckets = classifier().classify(&records);
        let names = |bucket: TemporalBucket| -> Vec<String> {
            buckets[&bucket].iter().map(|r| r.raw_name.clone()).collect()
        };
        assert_eq!(names(TemporalBucket::Today), vec!["a", "d"]);
        assert_eq!(names(TemporalBucket::Yesterday), vec!["c"]);
        assert!(names(TemporalBucket::Tomorrow).is_empty());
        assert_eq!(names(TemporalBucket::Other), vec!["b"]);
    }
}
