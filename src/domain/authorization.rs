//! Canned authorization-rate analytics backing the `improveAuthorizationRate` tool

use serde::{Deserialize, Serialize};
use tracing::info;

pub const TIMEFRAMES: [&str; 4] = ["last_7_days", "last_30_days", "last_90_days", "last_year"];
pub const TRANSACTION_TYPES: [&str; 5] = ["all", "card", "bank", "wallet", "crypto"];
pub const DEFAULT_TIMEFRAME: &str = "last_30_days";
pub const DEFAULT_TRANSACTION_TYPE: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationReport {
    pub merchant_id: String,
    pub current_metrics: CurrentMetrics,
    pub decline_reasons: DeclineReasons,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMetrics {
    pub authorization_rate: f64,
    pub decline_rate: f64,
    pub total_transactions: u64,
    pub timeframe: String,
    pub transaction_type: String,
}

/// Share of declines per reason, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclineReasons {
    pub insufficient_funds: f64,
    pub risk_triggers: f64,
    pub expired_card: f64,
    pub invalid_data: f64,
    pub other: f64,
}

impl DeclineReasons {
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("insufficient_funds", self.insufficient_funds),
            ("risk_triggers", self.risk_triggers),
            ("expired_card", self.expired_card),
            ("invalid_data", self.invalid_data),
            ("other", self.other),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub estimated_impact_percentage: f64,
}

fn recommendation(title: &str, description: &str, priority: &str, impact: f64) -> Recommendation {
    Recommendation {
        title: title.to_string(),
        description: description.to_string(),
        priority: priority.to_string(),
        estimated_impact_percentage: impact,
    }
}

/// Produces the analysis for `merchant_id`. The figures are static sample data.
pub fn improve_authorization_rate(
    merchant_id: &str,
    timeframe: &str,
    transaction_type: &str,
) -> AuthorizationReport {
    info!(
        merchant_id = %merchant_id,
        timeframe = %timeframe,
        transaction_type = %transaction_type,
        "analyzing authorization rates"
    );

    AuthorizationReport {
        merchant_id: merchant_id.to_string(),
        current_metrics: CurrentMetrics {
            authorization_rate: 85.3,
            decline_rate: 14.7,
            total_transactions: 12_500,
            timeframe: timeframe.to_string(),
            transaction_type: transaction_type.to_string(),
        },
        decline_reasons: DeclineReasons {
            insufficient_funds: 42.5,
            risk_triggers: 23.8,
            expired_card: 12.3,
            invalid_data: 10.7,
            other: 10.7,
        },
        recommendations: vec![
            recommendation(
                "Implement Account Updater",
                "Use PayPal's Account Updater service to automatically update expired or replaced cards",
                "high",
                3.5,
            ),
            recommendation(
                "Optimize AVS Settings",
                "Adjust Address Verification Service settings to reduce false declines",
                "medium",
                2.1,
            ),
            recommendation(
                "Implement Intelligent Retry Logic",
                "Add smart retry logic for declined transactions with specific reason codes",
                "high",
                4.2,
            ),
            recommendation(
                "Review Risk Rules",
                "Analyze and adjust risk rules to reduce false positives",
                "medium",
                2.8,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_echoes_inputs_and_uses_camel_case() {
        let report = improve_authorization_rate("M12345", "last_90_days", "card");
        let value = serde_json::to_value(&report).expect("serialize report");

        assert_eq!(value["merchantId"], json!("M12345"));
        assert_eq!(value["currentMetrics"]["timeframe"], json!("last_90_days"));
        assert_eq!(value["currentMetrics"]["transactionType"], json!("card"));
        assert_eq!(value["currentMetrics"]["totalTransactions"], json!(12500));
        assert_eq!(value["declineReasons"]["insufficient_funds"], json!(42.5));
        assert_eq!(value["recommendations"].as_array().map(Vec::len), Some(4));
        assert_eq!(
            value["recommendations"][0]["estimatedImpactPercentage"],
            json!(3.5)
        );
    }

    #[test]
    fn decline_reasons_sum_to_one_hundred_percent() {
        let report = improve_authorization_rate("M12345", DEFAULT_TIMEFRAME, DEFAULT_TRANSACTION_TYPE);
        let total: f64 = report
            .decline_reasons
            .entries()
            .iter()
            .map(|(_, share)| share)
            .sum();
        assert!((total - 100.0).abs() < 1e-9);
    }
}
