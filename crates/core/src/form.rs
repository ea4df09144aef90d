//! Merchant form configuration.
//!
//! A form is an ordered list of fields; the list order is the render order.
//! Each field is one of four kinds (`section`, `input`, `button`,
//! `subscribe`) with its own typed settings payload:
//!
//! ```json
//! {
//!   "mode": "popup",
//!   "fields": [
//!     {"id": "f1", "type": "section", "settings": {"section": "text", "text": "Order now"}},
//!     {"id": "f2", "type": "input", "settings": {"name": "firstName", "label": "First name", "required": true}},
//!     {"id": "f3", "type": "button", "settings": {"text": "Complete order"}}
//!   ]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Email;

/// How the form is presented on the product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    /// Hidden behind a trigger button, opened as a modal.
    #[default]
    Popup,
    /// Rendered inline on the page, always open.
    Embedded,
}

/// The full form configuration for a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormConfiguration {
    #[serde(default)]
    pub mode: FormMode,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub popup: PopupSettings,
}

/// Copy for the popup trigger and modal header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupSettings {
    #[serde(default = "default_trigger_text")]
    pub trigger_text: String,
    #[serde(default)]
    pub title: String,
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            trigger_text: default_trigger_text(),
            title: String::new(),
        }
    }
}

/// A single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Whether the editor lets the merchant reorder this field.
    #[serde(default = "default_true")]
    pub movable: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Field kind plus its settings payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "settings", rename_all = "snake_case")]
pub enum FieldKind {
    Section(SectionSettings),
    Input(InputSettings),
    Button(ButtonSettings),
    Subscribe(SubscribeSettings),
}

/// What a section field displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum SectionSettings {
    /// Free text (headline, reassurance copy).
    Text(TextSection),
    /// Subtotal / discount / shipping / total summary.
    Totals(TotalsLabels),
    /// Shipping-rate picker.
    Shipping(ShippingLabels),
    /// Discount-code entry.
    DiscountCode(DiscountCodeLabels),
    /// Quantity-offer tier cards.
    OfferTiers(OfferTierLabels),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSection {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TotalsLabels {
    pub subtotal: String,
    pub discount: String,
    pub shipping: String,
    pub total: String,
    pub free_shipping: String,
}

impl Default for TotalsLabels {
    fn default() -> Self {
        Self {
            subtotal: "Subtotal".to_string(),
            discount: "Discount".to_string(),
            shipping: "Shipping".to_string(),
            total: "Total".to_string(),
            free_shipping: "Free".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingLabels {
    pub title: String,
    pub free_label: String,
}

impl Default for ShippingLabels {
    fn default() -> Self {
        Self {
            title: "Shipping method".to_string(),
            free_label: "Free".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscountCodeLabels {
    pub placeholder: String,
    pub apply: String,
    pub invalid: String,
    pub applied: String,
}

impl Default for DiscountCodeLabels {
    fn default() -> Self {
        Self {
            placeholder: "Discount code".to_string(),
            apply: "Apply".to_string(),
            invalid: "This discount code is not valid".to_string(),
            applied: "Discount applied".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferTierLabels {
    pub title: String,
}

/// Kind of text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    Text,
    Email,
    Phone,
    Textarea,
    Number,
}

/// A customer-data input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSettings {
    /// Submission key, e.g. `firstName`, `phone`, `zip`, or a custom key.
    pub name: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Message shown when validation fails.
    #[serde(default = "default_error_text")]
    pub error_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAnimation {
    #[default]
    None,
    Pulse,
    Shake,
    Bounce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonSettings {
    #[serde(default = "default_button_text")]
    pub text: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub animation: ButtonAnimation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeSettings {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub checked_by_default: bool,
}

/// Problems found by [`FormConfiguration::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("form has {0} visible buttons, at most one may drive submission")]
    MultipleSubmitButtons(usize),
    #[error("form has no visible submit button")]
    MissingSubmitButton,
    #[error("input name {0} is used by more than one field")]
    DuplicateInputName(String),
    #[error("input {name} has min length {min} greater than max length {max}")]
    InvalidLengthBounds { name: String, min: usize, max: usize },
}

fn default_true() -> bool {
    true
}

fn default_trigger_text() -> String {
    "Buy with cash on delivery".to_string()
}

fn default_button_text() -> String {
    "Complete order".to_string()
}

fn default_error_text() -> String {
    "This field is required".to_string()
}

impl FormConfiguration {
    /// Visible fields in render order.
    pub fn visible_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.visible)
    }

    /// Visible input fields in render order.
    pub fn inputs(&self) -> impl Iterator<Item = &InputSettings> {
        self.visible_fields().filter_map(|field| match &field.kind {
            FieldKind::Input(input) => Some(input),
            _ => None,
        })
    }

    /// The button that drives submission: the first visible one.
    #[must_use]
    pub fn submit_button(&self) -> Option<(&Field, &ButtonSettings)> {
        self.visible_fields().find_map(|field| match &field.kind {
            FieldKind::Button(button) => Some((field, button)),
            _ => None,
        })
    }

    /// Whether a visible section of the given kind exists.
    #[must_use]
    pub fn has_section(&self, predicate: impl Fn(&SectionSettings) -> bool) -> bool {
        self.visible_fields().any(|field| match &field.kind {
            FieldKind::Section(section) => predicate(section),
            _ => false,
        })
    }

    /// The visible subscribe field, if any.
    #[must_use]
    pub fn subscribe(&self) -> Option<&SubscribeSettings> {
        self.visible_fields().find_map(|field| match &field.kind {
            FieldKind::Subscribe(settings) => Some(settings),
            _ => None,
        })
    }

    /// Check the structural invariants the widget relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigValidationError`] found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let buttons = self
            .visible_fields()
            .filter(|field| matches!(field.kind, FieldKind::Button(_)))
            .count();
        match buttons {
            0 => return Err(ConfigValidationError::MissingSubmitButton),
            1 => {}
            n => return Err(ConfigValidationError::MultipleSubmitButtons(n)),
        }

        let mut seen = HashSet::new();
        for input in self.inputs() {
            if !seen.insert(input.name.as_str()) {
                return Err(ConfigValidationError::DuplicateInputName(input.name.clone()));
            }
            if let (Some(min), Some(max)) = (input.min_length, input.max_length)
                && min > max
            {
                return Err(ConfigValidationError::InvalidLengthBounds {
                    name: input.name.clone(),
                    min,
                    max,
                });
            }
        }

        Ok(())
    }
}

/// A validation failure on one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{name}: {message}")]
pub struct FieldError {
    /// Submission key of the failing input.
    pub name: String,
    pub message: String,
}

fn is_email_input(input: &InputSettings) -> bool {
    input.input_type == InputType::Email || input.name == "email"
}

/// Validate one value against its input settings.
///
/// # Errors
///
/// Returns a [`FieldError`] carrying the input's error text.
pub fn validate_field(input: &InputSettings, value: &str) -> Result<(), FieldError> {
    let fail = || FieldError {
        name: input.name.clone(),
        message: input.error_text.clone(),
    };

    let value = value.trim();
    if value.is_empty() {
        return if input.required { Err(fail()) } else { Ok(()) };
    }

    let length = value.chars().count();
    if input.min_length.is_some_and(|min| length < min) {
        return Err(fail());
    }
    if input.max_length.is_some_and(|max| length > max) {
        return Err(fail());
    }
    if is_email_input(input) && Email::parse(value).is_err() {
        return Err(fail());
    }
    Ok(())
}

/// Validate every visible input in render order, stopping at the first
/// failure.
///
/// `value_of` returns the submitted value for an input name, or `None` when
/// the caller cannot see that input; such inputs are skipped.
///
/// # Errors
///
/// Returns the first [`FieldError`] in render order.
pub fn validate_values<'v>(
    form: &FormConfiguration,
    value_of: impl Fn(&str) -> Option<&'v str>,
) -> Result<(), FieldError> {
    form.inputs().try_for_each(|input| match value_of(&input.name) {
        Some(value) => validate_field(input, value),
        None => Ok(()),
    })
}
