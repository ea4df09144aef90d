//! View model.
//!
//! Turns the checkout state into a flat list of keyed nodes in render order.
//! Nodes carry display-ready strings; a [`crate::render::Renderer`] only has
//! to lay them out. Keys are the field ids from the form configuration, so a
//! renderer can patch a single node (the totals) in place.

use codform_core::form::{
    Alignment, ButtonAnimation, DiscountCodeLabels, FieldKind, InputType, SectionSettings,
    ShippingLabels, TotalsLabels,
};
use codform_core::pricing::{ActiveOffer, DiscountSource, PriceQuote, SelectedTier, quote};
use codform_core::settings::ShopSettings;
use codform_core::{PlatformId, format_amount};
use rust_decimal::Decimal;

use crate::state::{CheckoutPhase, CheckoutState, OrderDraft};

/// Key of the totals node when the form has no totals section.
pub const TOTALS_KEY: &str = "totals";
/// Key of the message banner.
pub const BANNER_KEY: &str = "banner";

/// One tier card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCard {
    pub index: usize,
    pub text: String,
    pub quantity: u32,
    /// Discounted merchandise price for this tier.
    pub price: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateOption {
    pub id: String,
    pub name: String,
    pub price: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsLine {
    pub label: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantOption {
    pub id: PlatformId,
    pub title: String,
    pub selected: bool,
}

/// What a node displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Text {
        text: String,
        alignment: Alignment,
    },
    Input {
        name: String,
        label: String,
        placeholder: String,
        input_type: InputType,
        required: bool,
        value: String,
        error: Option<String>,
    },
    OfferTiers {
        title: String,
        tiers: Vec<TierCard>,
    },
    Shipping {
        title: String,
        rates: Vec<RateOption>,
    },
    DiscountCode {
        placeholder: String,
        apply: String,
        /// Code currently applied, if any.
        applied: Option<String>,
        applied_text: String,
        error: Option<String>,
    },
    Totals {
        lines: Vec<TotalsLine>,
        total: TotalsLine,
    },
    Button {
        text: String,
        icon: Option<String>,
        animation: ButtonAnimation,
        disabled: bool,
        busy: bool,
    },
    Subscribe {
        text: String,
        checked: bool,
    },
    Banner {
        message: String,
    },
    Downsell {
        title: String,
        message: String,
        new_total: String,
        accept: String,
        decline: String,
    },
    Upsell {
        title: String,
        description: String,
        product_title: String,
        price: String,
        variants: Vec<VariantOption>,
        accept: String,
        decline: String,
    },
    Complete {
        message: Option<String>,
        redirect_url: Option<String>,
    },
    Trigger {
        text: String,
    },
}

/// A keyed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: String,
    pub kind: NodeKind,
}

impl Node {
    fn new(key: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }
}

fn totals_kind(quote: &PriceQuote, labels: &TotalsLabels) -> NodeKind {
    let mut lines = vec![TotalsLine {
        label: labels.subtotal.clone(),
        amount: format_amount(quote.subtotal),
    }];
    if quote.discount_amount > Decimal::ZERO {
        lines.push(TotalsLine {
            label: labels.discount.clone(),
            amount: format!("-{}", format_amount(quote.discount_amount)),
        });
    }
    lines.push(TotalsLine {
        label: labels.shipping.clone(),
        amount: if quote.shipping > Decimal::ZERO {
            format_amount(quote.shipping)
        } else {
            labels.free_shipping.clone()
        },
    });
    NodeKind::Totals {
        lines,
        total: TotalsLine {
            label: labels.total.clone(),
            amount: format_amount(quote.total),
        },
    }
}

/// The totals node alone, for in-place patches.
#[must_use]
pub fn totals_node(state: &CheckoutState, settings: &ShopSettings) -> Option<Node> {
    let draft = state.draft.as_ref()?;
    let (key, labels) = settings
        .form
        .visible_fields()
        .find_map(|field| match &field.kind {
            FieldKind::Section(SectionSettings::Totals(labels)) => Some((field.id.clone(), labels.clone())),
            _ => None,
        })
        .unwrap_or_else(|| (TOTALS_KEY.to_string(), TotalsLabels::default()));
    Some(Node::new(key, totals_kind(&draft.quote, &labels)))
}

fn tier_cards(draft: &OrderDraft, settings: &ShopSettings) -> Vec<TierCard> {
    let Some(offer) = settings.offers.quantity_offer_for(&draft.product.id) else {
        return Vec::new();
    };
    offer
        .tiers
        .iter()
        .enumerate()
        .map(|(index, tier)| {
            let priced = ActiveOffer::QuantityTier(SelectedTier {
                offer_id: offer.id.clone(),
                tier_index: index,
                tier: tier.clone(),
            });
            let q = quote(draft.product.price, draft.base_quantity, &priced, Decimal::ZERO);
            TierCard {
                index,
                text: tier.text.clone(),
                quantity: tier.effective_quantity(),
                price: format_amount(q.merchandise_total()),
                selected: matches!(
                    &draft.offer,
                    ActiveOffer::QuantityTier(s) if s.offer_id == offer.id && s.tier_index == index
                ),
            }
        })
        .collect()
}

fn shipping_kind(draft: &OrderDraft, settings: &ShopSettings, labels: &ShippingLabels) -> NodeKind {
    let selected = codform_core::shipping::select_rate(&settings.shipping, draft.shipping_id.as_deref())
        .map(|r| r.id.as_str());
    NodeKind::Shipping {
        title: labels.title.clone(),
        rates: settings
            .shipping
            .iter()
            .map(|rate| RateOption {
                id: rate.id.clone(),
                name: rate.name.clone(),
                price: if rate.is_free() {
                    labels.free_label.clone()
                } else {
                    format_amount(rate.price)
                },
                selected: Some(rate.id.as_str()) == selected,
            })
            .collect(),
    }
}

fn discount_kind(state: &CheckoutState, draft: &OrderDraft, labels: &DiscountCodeLabels) -> NodeKind {
    let applied = match &draft.offer {
        ActiveOffer::SingleDiscount(active) => match &active.source {
            DiscountSource::Code { code } => Some(code.clone()),
            DiscountSource::Downsell { .. } => None,
        },
        _ => None,
    };
    NodeKind::DiscountCode {
        placeholder: labels.placeholder.clone(),
        apply: labels.apply.clone(),
        applied,
        applied_text: labels.applied.clone(),
        error: state.discount_code_error.clone(),
    }
}

fn form_nodes(state: &CheckoutState, draft: &OrderDraft, settings: &ShopSettings) -> Vec<Node> {
    let busy = state.phase == CheckoutPhase::Submitting;
    let mut nodes = Vec::new();

    if let Some(message) = &state.banner {
        nodes.push(Node::new(BANNER_KEY, NodeKind::Banner { message: message.clone() }));
    }

    for field in settings.form.visible_fields() {
        let kind = match &field.kind {
            FieldKind::Section(SectionSettings::Text(text)) => NodeKind::Text {
                text: text.text.clone(),
                alignment: text.alignment,
            },
            FieldKind::Section(SectionSettings::Totals(labels)) => totals_kind(&draft.quote, labels),
            FieldKind::Section(SectionSettings::Shipping(labels)) => {
                if settings.shipping.is_empty() {
                    continue;
                }
                shipping_kind(draft, settings, labels)
            }
            FieldKind::Section(SectionSettings::DiscountCode(labels)) => {
                discount_kind(state, draft, labels)
            }
            FieldKind::Section(SectionSettings::OfferTiers(labels)) => {
                let tiers = tier_cards(draft, settings);
                if tiers.is_empty() {
                    continue;
                }
                NodeKind::OfferTiers {
                    title: labels.title.clone(),
                    tiers,
                }
            }
            FieldKind::Input(input) => NodeKind::Input {
                name: input.name.clone(),
                label: input.label.clone(),
                placeholder: input.placeholder.clone(),
                input_type: input.input_type,
                required: input.required,
                value: draft.values.get(&input.name).cloned().unwrap_or_default(),
                error: state
                    .field_error
                    .as_ref()
                    .filter(|e| e.name == input.name)
                    .map(|e| e.message.clone()),
            },
            FieldKind::Button(button) => NodeKind::Button {
                text: button.text.clone(),
                icon: button.icon.clone(),
                animation: button.animation,
                disabled: busy,
                busy,
            },
            FieldKind::Subscribe(subscribe) => NodeKind::Subscribe {
                text: subscribe.text.clone(),
                checked: draft.subscribe,
            },
        };
        nodes.push(Node::new(field.id.clone(), kind));
    }
    nodes
}

/// Build the full node list for the current state.
#[must_use]
pub fn build(state: &CheckoutState, settings: &ShopSettings) -> Vec<Node> {
    match (state.phase, state.draft.as_ref()) {
        (CheckoutPhase::Closed, _) | (_, None) => vec![Node::new(
            "trigger",
            NodeKind::Trigger {
                text: settings.form.popup.trigger_text.clone(),
            },
        )],
        (CheckoutPhase::DownsellOffered, Some(draft)) => {
            let Some(downsell) = &state.downsell else {
                return form_nodes(state, draft, settings);
            };
            let discounted = downsell.discount.apply(draft.quote.merchandise_total()) + draft.quote.shipping;
            vec![Node::new(
                "downsell",
                NodeKind::Downsell {
                    title: downsell.title.clone(),
                    message: downsell.message.clone(),
                    new_total: format_amount(discounted),
                    accept: downsell.accept_text.clone(),
                    decline: downsell.decline_text.clone(),
                },
            )]
        }
        (CheckoutPhase::UpsellOffered, Some(draft)) => {
            let Some(offer) = &state.upsell else {
                return form_nodes(state, draft, settings);
            };
            let price = offer.upsell.discount.apply(offer.product.unit_price());
            vec![Node::new(
                "upsell",
                NodeKind::Upsell {
                    title: offer.upsell.title.clone(),
                    description: offer.upsell.description.clone(),
                    product_title: offer.product.title.clone(),
                    price: format_amount(price),
                    variants: offer
                        .product
                        .variants
                        .iter()
                        .map(|v| VariantOption {
                            id: v.id.clone(),
                            title: v.title.clone(),
                            selected: v.id == offer.product.selected_variant,
                        })
                        .collect(),
                    accept: offer.upsell.accept_text.clone(),
                    decline: offer.upsell.decline_text.clone(),
                },
            )]
        }
        (CheckoutPhase::Success, Some(_)) => {
            let mut nodes = Vec::new();
            if let Some(toast) = &state.toast {
                nodes.push(Node::new(BANNER_KEY, NodeKind::Banner { message: toast.clone() }));
            }
            let redirect = state.completion.as_ref().map(|c| &c.redirect);
            nodes.push(Node::new(
                "complete",
                NodeKind::Complete {
                    message: redirect.and_then(|r| r.thank_you_message.clone()),
                    redirect_url: redirect.and_then(|r| r.redirect_url.clone()),
                },
            ));
            nodes
        }
        (_, Some(draft)) => form_nodes(state, draft, settings),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::product::ProductContext;
    use crate::product::tests::mug;
    use crate::state::tests::settings;

    fn open(mode: &str) -> (CheckoutState, ShopSettings) {
        let settings = settings(mode);
        let mut state = CheckoutState::new();
        let mut ctx = ProductContext::from_product(&mug(), None).unwrap();
        for v in &mut ctx.variants {
            v.price = Decimal::new(100, 0);
        }
        state.open(&ctx, &settings);
        (state, settings)
    }

    #[test]
    fn test_closed_renders_trigger() {
        let settings = settings("popup");
        let nodes = build(&CheckoutState::new(), &settings);
        assert_eq!(nodes.len(), 1);
        assert!(matches!(nodes[0].kind, NodeKind::Trigger { .. }));
    }

    #[test]
    fn test_form_nodes_follow_field_order() {
        let (state, settings) = open("popup");
        let keys: Vec<_> = build(&state, &settings).into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec!["n", "p", "t", "d", "b"]);
    }

    #[test]
    fn test_totals_lines() {
        let (mut state, settings) = open("popup");
        state.select_tier(1, &settings);
        let node = totals_node(&state, &settings).unwrap();
        assert_eq!(node.key, "t");
        let NodeKind::Totals { lines, total } = node.kind else {
            panic!("expected totals");
        };
        assert_eq!(lines[0].amount, "300.00");
        assert_eq!(lines[1].amount, "-60.00");
        assert_eq!(lines[2].amount, "10.00");
        assert_eq!(total.amount, "250.00");
    }

    #[test]
    fn test_inline_error_on_failing_field() {
        let (mut state, settings) = open("popup");
        state.validate(&settings);
        let nodes = build(&state, &settings);
        let NodeKind::Input { error, .. } = &nodes[0].kind else {
            panic!("expected input");
        };
        assert_eq!(error.as_deref(), Some("Name please"));
    }

    #[test]
    fn test_downsell_replaces_form() {
        let (mut state, settings) = open("popup");
        state.request_close(&settings);
        let nodes = build(&state, &settings);
        assert_eq!(nodes.len(), 1);
        let NodeKind::Downsell { new_total, .. } = &nodes[0].kind else {
            panic!("expected downsell");
        };
        assert_eq!(new_total, "105.00");
    }
}
