//! Request bodies and query strings accepted by the dashboard API.

use chrono::NaiveDate;
use serde::Deserialize;
use service_core::error::AppError;
use validator::{Validate, ValidationError};

use crate::models::{BillingMode, DateRange, Floor, OrderId};

/// `startDate`/`endDate` window, from a query string or JSON body.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_window"))]
pub struct DateFilter {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn validate_window(filter: &DateFilter) -> Result<(), ValidationError> {
    if filter.start_date > filter.end_date {
        let mut err = ValidationError::new("date_range");
        err.message = Some("startDate must not be after endDate".into());
        return Err(err);
    }
    Ok(())
}

impl DateFilter {
    pub fn into_range(self) -> Result<DateRange, AppError> {
        self.validate()?;
        DateRange::new(self.start_date, self.end_date)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))
    }
}

/// Intent to record a payment against an order's due on one billing track.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentForm {
    #[validate(range(min = 1))]
    pub order_id: OrderId,
    pub mode: BillingMode,
}

pub fn parse_floor(raw: &str) -> Result<Floor, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(start: &str, end: &str) -> DateFilter {
        serde_json::from_value(serde_json::json!({ "startDate": start, "endDate": end })).unwrap()
    }

    #[test]
    fn inverted_window_fails_validation() {
        assert!(filter("2024-01-01", "2025-01-01").into_range().is_ok());
        assert!(matches!(
            filter("2025-01-01", "2024-01-01").into_range(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn order_id_must_be_positive() {
        let form = RecordPaymentForm {
            order_id: 0,
            mode: BillingMode::Official,
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn floor_path_is_case_insensitive() {
        assert_eq!(parse_floor("ground").unwrap(), Floor::Ground);
        assert_eq!(parse_floor("FIRST").unwrap(), Floor::First);
        assert!(parse_floor("basement").is_err());
    }
}
