//! Step-by-step USSD dial sequences, one menu path per network.

use serde::Serialize;

use crate::db::models::{MobileProvider, Transaction};

#[derive(Debug, Serialize)]
pub struct UssdInstructions {
    pub steps: Vec<String>,
    pub ussd_code: String,
    pub estimated_time: &'static str,
}

/// Build the dial sequence for a transaction on the given provider.
///
/// Unknown provider names fall back to the operator-maintained free-text
/// instructions from the provider row.
pub fn for_transaction(provider: &MobileProvider, tx: &Transaction) -> UssdInstructions {
    let steps = match provider.name.as_str() {
        "airtel" => vec![
            format!("Dial {} on your Airtel phone", provider.ussd_code),
            "Select option 1: Send Money".to_string(),
            "Select option 2: Pay Bill".to_string(),
            format!(
                "Enter Merchant Code: {}",
                provider.merchant_code.as_deref().unwrap_or("")
            ),
            format!("Enter Amount: {}", tx.amount),
            format!("Enter Reference: {}", tx.reference_code),
            "Enter your PIN to confirm".to_string(),
            "Wait for confirmation SMS".to_string(),
        ],
        "zamtel" => vec![
            format!("Dial {} on your Zamtel phone", provider.ussd_code),
            "Select option 2: Pay Bill".to_string(),
            format!(
                "Enter Business Number: {}",
                provider.business_number.as_deref().unwrap_or("")
            ),
            format!("Enter Amount: {}", tx.amount),
            format!("Enter Reference: {}", tx.reference_code),
            "Enter your PIN to confirm".to_string(),
            "Wait for confirmation SMS".to_string(),
        ],
        "mtn" => vec![
            format!("Dial {} on your MTN phone", provider.ussd_code),
            "Select option 1: Send Money".to_string(),
            "Select option 2: Pay Bill".to_string(),
            format!(
                "Enter Payee Code: {}",
                provider.payee_code.as_deref().unwrap_or("")
            ),
            format!("Enter Amount: {}", tx.amount),
            format!("Enter Reference: {}", tx.reference_code),
            "Enter your PIN to confirm".to_string(),
            "Wait for confirmation SMS".to_string(),
        ],
        _ => vec![provider.instructions.clone()],
    };

    UssdInstructions {
        steps,
        ussd_code: provider.ussd_code.clone(),
        estimated_time: "2-3 minutes",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::BigDecimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn provider(name: &str) -> MobileProvider {
        MobileProvider {
            id: Uuid::new_v4(),
            name: name.to_string(),
            display_name: format!("{name} Money"),
            ussd_code: "*778#".to_string(),
            merchant_code: Some("LEARNHUB001".to_string()),
            business_number: Some("2001".to_string()),
            payee_code: Some("LEARN001".to_string()),
            phone_prefixes: vec!["097".to_string()],
            instructions: "Dial the menu and follow the prompts".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn transaction() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "977123456".to_string(),
            BigDecimal::from_str("150.00").unwrap(),
            "ZMW".to_string(),
            "12345678".to_string(),
            chrono::Duration::minutes(30),
        )
    }

    #[test]
    fn airtel_steps_carry_merchant_code_and_reference() {
        let steps = for_transaction(&provider("airtel"), &transaction());
        assert!(steps.steps.iter().any(|s| s.contains("LEARNHUB001")));
        assert!(steps.steps.iter().any(|s| s.contains("12345678")));
        assert_eq!(steps.ussd_code, "*778#");
    }

    #[test]
    fn zamtel_steps_use_business_number() {
        let steps = for_transaction(&provider("zamtel"), &transaction());
        assert!(steps.steps.iter().any(|s| s.contains("Business Number: 2001")));
    }

    #[test]
    fn mtn_steps_use_payee_code() {
        let steps = for_transaction(&provider("mtn"), &transaction());
        assert!(steps.steps.iter().any(|s| s.contains("Payee Code: LEARN001")));
    }

    #[test]
    fn unknown_provider_falls_back_to_row_instructions() {
        let steps = for_transaction(&provider("other"), &transaction());
        assert_eq!(steps.steps, vec!["Dial the menu and follow the prompts"]);
    }
}
