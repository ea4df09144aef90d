//! Merchant-facing order notes.
//!
//! Every platform order carries a short, human-readable record of how it was
//! placed so merchants can audit COD orders from the platform admin alone.

use std::fmt::{self, Write as _};

use rust_decimal::Decimal;

use crate::customer::CustomerFields;
use crate::pricing::{ActiveOffer, DiscountSource, DiscountType, PriceQuote};
use crate::shipping::ShippingRate;
use crate::types::format_amount;

/// Inputs for the audit note written onto a platform order.
#[derive(Debug, Clone, Copy)]
pub struct AuditNote<'a> {
    pub customer: &'a CustomerFields,
    pub quote: &'a PriceQuote,
    pub offer: &'a ActiveOffer,
    pub shipping: Option<&'a ShippingRate>,
    pub client_ip: Option<&'a str>,
    /// Where the form was submitted from (form mode, page).
    pub source: &'a str,
    /// Why the order was created without customer data, if it was.
    pub fallback_reason: Option<&'a str>,
}

/// Short description of the active offer, e.g. `Buy 3 (-20%)`.
#[must_use]
pub fn describe_offer(offer: &ActiveOffer) -> Option<String> {
    let describe_value = |kind: DiscountType, value: Decimal| match kind {
        DiscountType::Percentage => format!("-{value}%"),
        DiscountType::FixedAmount => format!("-{}", format_amount(value)),
        DiscountType::None => "no discount".to_string(),
    };
    match offer {
        ActiveOffer::None => None,
        ActiveOffer::QuantityTier(selected) => {
            let label = if selected.tier.text.trim().is_empty() {
                format!("{} units", selected.tier.effective_quantity())
            } else {
                selected.tier.text.trim().to_string()
            };
            Some(format!(
                "{label} ({})",
                describe_value(selected.tier.discount_type, selected.tier.discount_value)
            ))
        }
        ActiveOffer::SingleDiscount(active) => {
            let source = match &active.source {
                DiscountSource::Code { code } => format!("Code {code}"),
                DiscountSource::Downsell { downsell_id } => format!("Downsell {downsell_id}"),
            };
            Some(format!(
                "{source} ({})",
                describe_value(active.discount.kind, active.discount.value)
            ))
        }
    }
}

impl fmt::Display for AuditNote<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cash on delivery order ({})", self.source)?;
        if let Some(ip) = self.client_ip {
            writeln!(f, "IP: {ip}")?;
        }
        writeln!(
            f,
            "Quantity: {} x {}",
            self.quote.quantity,
            format_amount(self.quote.unit_price)
        )?;
        if let Some(offer) = describe_offer(self.offer) {
            writeln!(f, "Offer: {offer}")?;
        }
        if let Some(rate) = self.shipping {
            writeln!(f, "Shipping: {} ({})", rate.name, format_amount(self.quote.shipping))?;
        }
        writeln!(f, "Total: {}", format_amount(self.quote.total))?;

        let address = self.customer.address_line();
        if !address.is_empty() {
            writeln!(f, "Address: {address}")?;
        }
        if !self.customer.note.is_empty() {
            writeln!(f, "Customer note: {}", self.customer.note)?;
        }
        if let Some(reason) = self.fallback_reason {
            writeln!(
                f,
                "Customer details were rejected by the platform ({reason}); order created without a customer."
            )?;
            let mut contact = String::new();
            if !self.customer.email.is_empty() {
                let _ = write!(contact, " email={}", self.customer.email);
            }
            if !self.customer.phone.is_empty() {
                let _ = write!(contact, " phone={}", self.customer.phone);
            }
            if !contact.is_empty() {
                writeln!(f, "Submitted contact:{contact}")?;
            }
        }
        Ok(())
    }
}

impl AuditNote<'_> {
    /// The note text, without the trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string().trim_end().to_string()
    }
}

/// Order summary used for WhatsApp redirects, e.g.
/// `Order #1001: 3 x Mug, total 240.00`.
#[must_use]
pub fn order_summary(order_number: &str, product_title: &str, quote: &PriceQuote) -> String {
    format!(
        "Order #{order_number}: {} x {product_title}, total {}",
        quote.quantity,
        format_amount(quote.total)
    )
}
