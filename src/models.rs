use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::sanitize::{clamp_chars, sanitize_text_field};

/// Inbound parameter names, as field reporters send them.
pub mod keys {
    pub const DSR_ID: &str = "dsr_id";
    pub const DATE: &str = "date";
    pub const OUT_TIME: &str = "outtime";
    pub const IN_TIME: &str = "intime";
    pub const STATION: &str = "station";
    pub const CALL_TYPE: &str = "call_type";
    pub const ACTIVITY_LIVE: &str = "activity_live";
    pub const NEAR: &str = "near";
    pub const AT: &str = "at";
    pub const VEHICLE: &str = "vehicle";
    pub const TALUKA: &str = "taluka";
    pub const VILLAGE: &str = "village";
    pub const ACTIVITY_SMS: &str = "activity_sms";
}

const SHORT: usize = 10;
const MEDIUM: usize = 100;
const LONG: usize = 255;
const KEY: usize = 50;

/// One incident as the reporter described it, after sanitization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncidentReport {
    pub report_id: String,
    pub date: i64,
    pub out_time: String,
    pub in_time: String,
    pub station: String,
    pub call_type: String,
    pub activity_live: String,
    pub near_location: String,
    pub at_location: String,
    pub vehicle: String,
    pub taluka: String,
    pub village: String,
    pub activity_sms: String,
}

/// The raw request parameters, kept as received so they can be echoed back.
#[derive(Debug, Clone, Default)]
pub struct ReportParams(pub Map<String, Value>);

impl ReportParams {
    /// Sanitized text for `key`; missing keys read as empty.
    pub fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => sanitize_text_field(s),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => sanitize_text_field(&v.to_string()),
            _ => String::new(),
        }
    }

    fn field(&self, key: &str, max_chars: usize) -> String {
        clamp_chars(&self.text(key), max_chars)
    }

    /// Builds the stored form of the report. `date` has already passed the
    /// window check and is supplied parsed.
    pub fn to_report(&self, date: i64) -> IncidentReport {
        IncidentReport {
            report_id: self.field(keys::DSR_ID, KEY),
            date,
            out_time: self.field(keys::OUT_TIME, SHORT),
            in_time: self.field(keys::IN_TIME, SHORT),
            station: self.field(keys::STATION, MEDIUM),
            call_type: self.field(keys::CALL_TYPE, MEDIUM),
            activity_live: self.field(keys::ACTIVITY_LIVE, LONG),
            near_location: self.field(keys::NEAR, LONG),
            at_location: self.field(keys::AT, LONG),
            vehicle: self.field(keys::VEHICLE, MEDIUM),
            taluka: self.field(keys::TALUKA, MEDIUM),
            village: self.field(keys::VILLAGE, MEDIUM),
            activity_sms: self.field(keys::ACTIVITY_SMS, LONG),
        }
    }
}

/// A stored incident row, serialized under the column names clients read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    pub id: i64,
    #[serde(rename = "dsr_id")]
    pub report_id: String,
    #[serde(serialize_with = "epoch_as_string")]
    pub date: i64,
    #[serde(rename = "outtime")]
    pub out_time: String,
    #[serde(rename = "intime")]
    pub in_time: String,
    pub station: String,
    pub call_type: String,
    pub activity_live: String,
    #[serde(rename = "near")]
    pub near_location: String,
    #[serde(rename = "at")]
    pub at_location: String,
    pub vehicle: String,
    pub taluka: String,
    pub village: String,
    pub activity_sms: String,
}

fn epoch_as_string<S: Serializer>(date: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ReportParams {
        match value {
            Value::Object(map) => ReportParams(map),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn missing_keys_read_as_empty() {
        let p = params(json!({ "dsr_id": "DSR-9" }));
        let report = p.to_report(100);
        assert_eq!(report.report_id, "DSR-9");
        assert_eq!(report.date, 100);
        assert_eq!(report.station, "");
        assert_eq!(report.activity_sms, "");
    }

    #[test]
    fn values_are_sanitized_and_clamped() {
        let p = params(json!({
            "dsr_id": " <b>DSR-1</b> ",
            "outtime": "10:45:00 hrs extra",
            "near": "Old\nMarket",
            "vehicle": 12,
            "taluka": null,
            "village": ["not", "text"],
        }));
        let report = p.to_report(0);
        assert_eq!(report.report_id, "DSR-1");
        assert_eq!(report.out_time, "10:45:00 h");
        assert_eq!(report.near_location, "Old Market");
        assert_eq!(report.vehicle, "12");
        assert_eq!(report.taluka, "");
        assert_eq!(report.village, "");
    }

    #[test]
    fn incident_serializes_with_column_names() {
        let incident = Incident {
            id: 3,
            report_id: "DSR-3".to_string(),
            date: 1_735_689_600,
            out_time: "10:00".to_string(),
            in_time: "11:00".to_string(),
            station: "Panaji".to_string(),
            call_type: "Fire".to_string(),
            activity_live: "Attending".to_string(),
            near_location: "Bus stand".to_string(),
            at_location: "Market".to_string(),
            vehicle: "GA-01".to_string(),
            taluka: "Tiswadi".to_string(),
            village: "Ribandar".to_string(),
            activity_sms: "Fire call".to_string(),
        };
        let value = serde_json::to_value(&incident).unwrap();
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["dsr_id"], json!("DSR-3"));
        assert_eq!(value["date"], json!("1735689600"));
        assert_eq!(value["outtime"], json!("10:00"));
        assert_eq!(value["near"], json!("Bus stand"));
        assert_eq!(value["at"], json!("Market"));
        assert!(value.get("report_id").is_none());
    }

    #[test]
    fn envelope_omits_absent_data() {
        let value = serde_json::to_value(ApiResponse::error("nope")).unwrap();
        assert_eq!(value, json!({ "status": "error", "message": "nope" }));
        let value =
            serde_json::to_value(ApiResponse::success("ok").with_data(json!([]))).unwrap();
        assert_eq!(value, json!({ "status": "success", "message": "ok", "data": [] }));
    }
}
