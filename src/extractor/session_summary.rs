use chrono::{DateTime, SecondsFormat, Utc};
use fitparser::{FitDataField, Value};
use serde::Serialize;

/// Headline numbers of one `session` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub start_time: Option<DateTime<Utc>>,
    pub total_time_sec: Option<f64>,
    pub distance_km: Option<f64>,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub sport: Option<String>,
    pub sub_sport: Option<String>,
}

impl SessionSummary {
    pub fn from_fields(fields: &[FitDataField]) -> Self {
        let mut summary = Self::default();

        for field in fields {
            match field.name() {
                "start_time" => {
                    if let Value::Timestamp(t) = field.value() {
                        summary.start_time = Some(t.with_timezone(&Utc));
                    }
                }
                "total_elapsed_time" => summary.total_time_sec = get_f64(field.value()),
                "total_distance" => {
                    summary.distance_km = get_f64(field.value()).map(|meters| meters / 1000.0);
                }
                "avg_heart_rate" => summary.avg_hr = get_f64(field.value()),
                "max_heart_rate" => summary.max_hr = get_f64(field.value()),
                "sport" => summary.sport = enum_name(field.value()),
                "sub_sport" => summary.sub_sport = enum_name(field.value()),
                _ => {}
            }
        }

        summary
    }

    /// Cells in `SUMMARY_HEADER` order after the file name; missing values are empty.
    pub fn csv_cells(&self) -> [String; 7] {
        [
            self.start_time
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            number_cell(self.total_time_sec),
            number_cell(self.distance_km),
            number_cell(self.avg_hr),
            number_cell(self.max_hr),
            self.sport.clone().unwrap_or_default(),
            self.sub_sport.clone().unwrap_or_default(),
        ]
    }
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn get_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Byte(val) | Value::Enum(val) | Value::UInt8(val) | Value::UInt8z(val) => {
            Some(f64::from(*val))
        }
        Value::SInt8(val) => Some(f64::from(*val)),
        Value::SInt16(val) => Some(f64::from(*val)),
        Value::UInt16(val) | Value::UInt16z(val) => Some(f64::from(*val)),
        Value::SInt32(val) => Some(f64::from(*val)),
        Value::UInt32(val) | Value::UInt32z(val) => Some(f64::from(*val)),
        Value::SInt64(val) => Some(*val as f64),
        Value::UInt64(val) | Value::UInt64z(val) => Some(*val as f64),
        Value::Float32(val) => Some(f64::from(*val)),
        Value::Float64(val) => Some(*val),
        _ => None,
    }
}

// Unknown enum values come back as plain numbers
fn enum_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => Some(name.clone()),
        other => get_f64(other).map(|v| v.to_string()),
    }
}
