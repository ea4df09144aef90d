//! Shop configuration validation.
//!
//! # Usage
//!
//! ```bash
//! codform-cli check-config settings.json
//! ```

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use codform_core::pricing::DiscountType;
use codform_core::settings::ShopSettings;

#[derive(Debug, Error)]
pub enum CheckConfigError {
    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} problem(s) found")]
    Invalid(usize),
}

/// Every problem found in a configuration, in a stable order.
#[must_use]
pub fn problems(settings: &ShopSettings) -> Vec<String> {
    let mut problems = Vec::new();

    if let Err(e) = settings.form.validate() {
        problems.push(format!("form: {e}"));
    }

    let mut rate_ids = HashSet::new();
    for rate in &settings.shipping {
        if !rate_ids.insert(rate.id.as_str()) {
            problems.push(format!("shipping: duplicate rate id {}", rate.id));
        }
        if rate.price.is_sign_negative() {
            problems.push(format!("shipping: rate {} has a negative price", rate.id));
        }
    }

    let offers = &settings.offers;
    for offer in &offers.quantity_offers {
        if offer.tiers.is_empty() {
            problems.push(format!("quantity offer {}: no tiers", offer.id));
        }
        for (index, tier) in offer.tiers.iter().enumerate() {
            if tier.discount_type == DiscountType::Percentage
                && tier.discount_value > rust_decimal::Decimal::ONE_HUNDRED
            {
                problems.push(format!(
                    "quantity offer {}: tier {index} discounts more than 100%",
                    offer.id
                ));
            }
        }
    }

    let mut codes = HashSet::new();
    for code in &offers.discount_codes {
        let normalized = code.code.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            problems.push("discount codes: empty code".to_string());
        } else if !codes.insert(normalized) {
            problems.push(format!("discount codes: duplicate code {}", code.code));
        }
    }

    for upsell in &offers.upsells {
        if upsell.product_handle.trim().is_empty() {
            problems.push(format!("upsell {}: no product handle", upsell.id));
        }
    }

    problems
}

/// Load and check a configuration file, printing each problem.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or has problems.
pub fn run(path: &Path) -> Result<(), CheckConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CheckConfigError::Read(path.display().to_string(), e))?;
    let settings: ShopSettings = serde_json::from_str(&raw)?;

    let problems = problems(&settings);
    #[allow(clippy::print_stdout)]
    {
        for problem in &problems {
            println!("- {problem}");
        }
        if problems.is_empty() {
            println!(
                "OK: {} fields, {} shipping rates, {} quantity offers, {} upsells, {} downsells, {} discount codes",
                settings.form.fields.len(),
                settings.shipping.len(),
                settings.offers.quantity_offers.len(),
                settings.offers.upsells.len(),
                settings.offers.downsells.len(),
                settings.offers.discount_codes.len(),
            );
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(CheckConfigError::Invalid(problems.len()))
    }
}
