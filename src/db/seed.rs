//! Reference data for the Zambian mobile money providers.
//! Idempotent: rows that already exist are left untouched so operator
//! edits survive re-seeding.

use sqlx::PgPool;
use uuid::Uuid;

pub struct ProviderSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub ussd_code: &'static str,
    pub merchant_code: Option<&'static str>,
    pub business_number: Option<&'static str>,
    pub payee_code: Option<&'static str>,
    pub phone_prefixes: &'static [&'static str],
    pub instructions: &'static str,
}

// Prefix overlap between airtel and mtn (096/097) is real network data,
// not a typo. Payers disambiguate by picking the provider explicitly.
pub const PROVIDERS: &[ProviderSeed] = &[
    ProviderSeed {
        name: "airtel",
        display_name: "Airtel Money",
        ussd_code: "*778#",
        merchant_code: Some("LEARNHUB001"),
        business_number: None,
        payee_code: None,
        phone_prefixes: &["097", "096", "095"],
        instructions: "Dial *778# > Send Money > Pay Bill > Enter Merchant Code > \
                       Enter Amount > Enter Reference > Confirm with PIN",
    },
    ProviderSeed {
        name: "zamtel",
        display_name: "Zamtel Money",
        ussd_code: "*776#",
        merchant_code: None,
        business_number: Some("2001"),
        payee_code: None,
        phone_prefixes: &["095", "094"],
        instructions: "Dial *776# > Pay Bill > Enter Business Number > Enter Amount > \
                       Enter Reference > Confirm with PIN",
    },
    ProviderSeed {
        name: "mtn",
        display_name: "MTN Money",
        ussd_code: "*175#",
        merchant_code: None,
        business_number: None,
        payee_code: Some("LEARN001"),
        phone_prefixes: &["096", "097", "098"],
        instructions: "Dial *175# > Send Money > Pay Bill > Enter Payee Code > \
                       Enter Amount > Enter Reference > Confirm with PIN",
    },
];

/// Insert any missing providers, returning how many rows were created.
pub async fn seed_providers(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let mut created = 0;

    for provider in PROVIDERS {
        let prefixes: Vec<String> = provider
            .phone_prefixes
            .iter()
            .map(|p| p.to_string())
            .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO mobile_providers (
                id, name, display_name, ussd_code, merchant_code, business_number,
                payee_code, phone_prefixes, instructions
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider.name)
        .bind(provider.display_name)
        .bind(provider.ussd_code)
        .bind(provider.merchant_code)
        .bind(provider.business_number)
        .bind(provider.payee_code)
        .bind(&prefixes)
        .bind(provider.instructions)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Created provider: {}", provider.display_name);
            created += 1;
        } else {
            tracing::debug!("Provider already exists: {}", provider.display_name);
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::PROVIDER_PREFIXES;

    #[test]
    fn seed_data_matches_detection_tables() {
        // The static detection tables in phone.rs mirror the seeded rows;
        // keep them in lockstep.
        assert_eq!(PROVIDERS.len(), PROVIDER_PREFIXES.len());
        for (seed, (name, prefixes)) in PROVIDERS.iter().zip(PROVIDER_PREFIXES) {
            assert_eq!(seed.name, *name);
            assert_eq!(seed.phone_prefixes, *prefixes);
        }
    }

    #[test]
    fn every_provider_has_exactly_one_payee_style_code() {
        for seed in PROVIDERS {
            let codes = [seed.merchant_code, seed.business_number, seed.payee_code];
            assert_eq!(
                codes.iter().filter(|c| c.is_some()).count(),
                1,
                "{} must carry exactly one of merchant/business/payee code",
                seed.name
            );
        }
    }
}
