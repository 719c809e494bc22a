//! The Ceilometer (telemetry) API surface used by the freshness check.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use url::Url;

use crate::auth::Session;

use super::{expect_json, service_url, ApiError};

pub trait TelemetryApi {
    /// The recording timestamp of the newest sample of `meter`, if any.
    fn latest_sample(&self, meter: &str) -> Result<Option<DateTime<Utc>>, ApiError>;
}

pub struct TelemetryClient<'a> {
    session: &'a Session,
    endpoint: Url,
}

impl<'a> TelemetryClient<'a> {
    pub fn new(session: &'a Session) -> Result<TelemetryClient<'a>, ApiError> {
        let endpoint = session.endpoint_for(&["metering"])?;
        Ok(TelemetryClient { session, endpoint })
    }
}

#[derive(Debug, Deserialize)]
struct Sample {
    recorded_at: String,
}

impl TelemetryApi for TelemetryClient<'_> {
    fn latest_sample(&self, meter: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
        let mut url = service_url(&self.endpoint, &format!("v2/meters/{}", meter))?;
        url.query_pairs_mut().append_pair("limit", "1");
        let samples: Vec<Sample> = expect_json(self.session.get(url)?)?;
        match samples.first() {
            None => Ok(None),
            Some(sample) => parse_sample_timestamp(&sample.recorded_at)
                .map(Some)
                .ok_or_else(|| {
                    ApiError::Malformed(format!(
                        "unparseable sample timestamp: {}",
                        sample.recorded_at
                    ))
                }),
        }
    }
}

/// Ceilometer reports timestamps both with and without a UTC offset,
/// depending on the version; naive timestamps are UTC.
pub fn parse_sample_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let with_offset = parse_sample_timestamp("2015-06-12T09:34:45+00:00").unwrap();
        let naive = parse_sample_timestamp("2015-06-12T09:34:45.123456").unwrap();
        assert_eq!(with_offset.timestamp(), 1434101685);
        assert_eq!(naive.timestamp(), 1434101685);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_sample_timestamp("last tuesday").is_none());
    }
}
