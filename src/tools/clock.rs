//! Current date and time, so agents can resolve "tomorrow" or "next Monday".

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use serde_json::{json, Value};

use super::Tool;

pub struct CurrentDateTime {
    offset: Option<FixedOffset>,
}

impl CurrentDateTime {
    /// Use a fixed UTC offset in hours, or local time when `None`.
    pub fn new(offset_hours: Option<i32>) -> Self {
        Self {
            offset: offset_hours.and_then(|h| FixedOffset::east_opt(h * 3600)),
        }
    }
}

fn describe<Tz: TimeZone>(now: DateTime<Tz>) -> Value
where
    Tz::Offset: std::fmt::Display,
{
    json!({
        "datetime": now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "day_of_the_week": now.format("%A").to_string(),
    })
}

#[async_trait]
impl Tool for CurrentDateTime {
    fn name(&self) -> &str {
        "get_current_date_and_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time, including the day of the week."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
        Ok(match self.offset {
            Some(offset) => describe(Utc::now().with_timezone(&offset)),
            None => describe(Local::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_formats_date_and_weekday() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let moment = offset.with_ymd_and_hms(2025, 2, 26, 18, 30, 0).unwrap();
        assert_eq!(
            describe(moment),
            json!({"datetime": "2025-02-26 18:30:00", "day_of_the_week": "Wednesday"})
        );
    }

    #[tokio::test]
    async fn execute_returns_both_fields() {
        let tool = CurrentDateTime::new(Some(0));
        let value = tool.execute(json!({})).await.unwrap();
        assert!(value["datetime"].as_str().is_some());
        assert!(value["day_of_the_week"].as_str().is_some());
    }
}
