//! Offline price quotes with the checkout calculator.

use rust_decimal::Decimal;

use codform_core::format_amount;
use codform_core::pricing::{Discount, PriceQuote, PricingInput, compute};

/// The single discount described by the flags, if any.
#[must_use]
pub fn discount(percent: Option<Decimal>, fixed: Option<Decimal>) -> Option<Discount> {
    percent
        .map(Discount::percentage)
        .or_else(|| fixed.map(Discount::fixed))
}

#[must_use]
pub fn quote(
    price: Decimal,
    quantity: u32,
    discount: Option<Discount>,
    shipping: Decimal,
) -> PriceQuote {
    compute(&PricingInput {
        unit_price: price,
        quantity,
        tier: None,
        single_discount: discount.as_ref(),
        shipping,
    })
}

/// Human-readable breakdown.
#[must_use]
pub fn render(quote: &PriceQuote) -> String {
    [
        format!("Quantity:  {}", quote.quantity),
        format!("Unit:      {}", format_amount(quote.unit_price)),
        format!("Subtotal:  {}", format_amount(quote.subtotal)),
        format!("Discount: -{}", format_amount(quote.discount_amount)),
        format!("Shipping:  {}", format_amount(quote.shipping)),
        format!("Total:     {}", format_amount(quote.total)),
    ]
    .join("\n")
}

/// Print the quote to stdout.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print(quote: &PriceQuote, json: bool) -> Result<(), serde_json::Error> {
    let output = if json {
        serde_json::to_string_pretty(quote)?
    } else {
        render(quote)
    };
    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
    }
    Ok(())
}
