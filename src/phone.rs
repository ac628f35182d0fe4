//! Zambian phone number normalization and network detection.
//!
//! Numbers arrive in whatever shape the payer typed them: `0977123456`,
//! `+260 97 712 3456`, `260977123456`. Everything internal works on the
//! cleaned 9-digit subscriber form.

/// Prefix tables in fixed iteration order. The sets overlap (096/097 are
/// claimed by both airtel and mtn in the national numbering plan), so
/// detection reports the first claimant in this order and callers that need
/// certainty must ask the payer to pick the provider explicitly.
pub const PROVIDER_PREFIXES: &[(&str, &[&str])] = &[
    ("airtel", &["097", "096", "095"]),
    ("zamtel", &["095", "094"]),
    ("mtn", &["096", "097", "098"]),
];

const COUNTRY_CODE: &str = "260";
const SUBSCRIBER_LEN: usize = 9;

/// Strip formatting and localize: drop a leading `260` country code, or
/// failing that a single leading zero. A valid number comes out as 9 digits.
pub fn clean(raw: &str) -> String {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();

    if let Some(rest) = digits.strip_prefix(COUNTRY_CODE) {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest.to_string()
    } else {
        digits
    }
}

/// Detect the mobile money network from the number's 3-digit prefix.
///
/// Returns `None` for anything that does not clean to 9 digits. Where
/// prefixes overlap, the first provider in [`PROVIDER_PREFIXES`] order wins.
pub fn detect_provider(raw: &str) -> Option<&'static str> {
    let cleaned = clean(raw);
    if cleaned.len() != SUBSCRIBER_LEN {
        return None;
    }

    let prefix = &cleaned[..3];
    PROVIDER_PREFIXES
        .iter()
        .find(|(_, prefixes)| prefixes.contains(&prefix))
        .map(|(name, _)| *name)
}

/// Present a number as `+260 XX XXX XXX`; inputs that do not clean to
/// 9 digits are returned unchanged.
pub fn format_for_display(raw: &str) -> String {
    let cleaned = clean(raw);
    if cleaned.len() == SUBSCRIBER_LEN {
        format!(
            "+{} {} {} {}",
            COUNTRY_CODE,
            &cleaned[..2],
            &cleaned[2..5],
            &cleaned[5..]
        )
    } else {
        raw.to_string()
    }
}

/// `true` when the input cleans to a full subscriber number.
pub fn is_valid(raw: &str) -> bool {
    clean(raw).len() == SUBSCRIBER_LEN
}
