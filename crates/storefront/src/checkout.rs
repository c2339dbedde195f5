//! Checkout state machine.
//!
//! ```text
//! Address ──submit_address──▶ Payment ──submit──▶ Confirmation(order)
//!    ▲                           │
//!    └──────back_to_address──────┘
//! ```
//!
//! A failed submission stays in `Payment` so the customer can retry. The
//! summary shown on the payment step and the submitted order share
//! [`checkout_pricing`], so the displayed total is the persisted one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use vitrine_core::{Email, PaymentMethod, Phone, PostalCode};

use crate::backend::{CouponBackend, OrderBackend};
use crate::models::{Order, Session, ShippingAddress};
use crate::pricing::OrderPricing;
use crate::services::coupons::{AppliedCoupon, CouponOutcome, CouponValidator};
use crate::services::orders::{CheckoutDetails, OrderError, OrderService, checkout_pricing};
use crate::services::shipping::ShippingOption;
use crate::stores::CartStore;

/// `NNNNN-NNN` or `NNNNNNNN`.
static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}-?\d{3}$").expect("Invalid regex"));

/// `(NN) NNNNN-NNNN`, `(NN) NNNN-NNNN` and unpunctuated variants.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?\d{2}\)?\s?\d{4,5}-?\d{4}$").expect("Invalid regex")
});

/// Brazilian federative units.
const STATES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB",
    "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

// =============================================================================
// Address form
// =============================================================================

/// Raw address input, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

/// A field of [`AddressForm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressField {
    FullName,
    Email,
    Phone,
    PostalCode,
    Street,
    Number,
    Neighborhood,
    City,
    State,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FullName => "full_name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::PostalCode => "postal_code",
            Self::Street => "street",
            Self::Number => "number",
            Self::Neighborhood => "neighborhood",
            Self::City => "city",
            Self::State => "state",
        };
        f.write_str(name)
    }
}

/// Validation messages keyed by field.
pub type AddressErrors = BTreeMap<AddressField, &'static str>;

impl AddressForm {
    /// Validate every field and build the address.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self) -> Result<ShippingAddress, AddressErrors> {
        let mut errors = AddressErrors::new();
        let mut required = |field: AddressField, value: &str| -> String {
            let value = value.trim();
            if value.is_empty() {
                errors.insert(field, "Required");
            }
            value.to_string()
        };

        let full_name = required(AddressField::FullName, &self.full_name);
        let street = required(AddressField::Street, &self.street);
        let number = required(AddressField::Number, &self.number);
        let neighborhood = required(AddressField::Neighborhood, &self.neighborhood);
        let city = required(AddressField::City, &self.city);

        let email = Email::parse(&self.email)
            .map_err(|_| errors.insert(AddressField::Email, "Invalid email"))
            .ok();

        let phone = self.phone.trim();
        let phone = if PHONE_RE.is_match(phone) {
            Phone::parse(phone).ok()
        } else {
            None
        };
        if phone.is_none() {
            errors.insert(AddressField::Phone, "Invalid phone number");
        }

        let postal_code = self.postal_code.trim();
        let postal_code = if POSTAL_CODE_RE.is_match(postal_code) {
            PostalCode::parse(postal_code).ok()
        } else {
            None
        };
        if postal_code.is_none() {
            errors.insert(AddressField::PostalCode, "Invalid postal code");
        }

        let state = self.state.trim().to_uppercase();
        if !STATES.contains(&state.as_str()) {
            errors.insert(AddressField::State, "Invalid state");
        }

        let complement = Some(self.complement.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        match (email, phone, postal_code) {
            (Some(email), Some(phone), Some(postal_code)) if errors.is_empty() => {
                Ok(ShippingAddress {
                    full_name,
                    email,
                    phone,
                    postal_code,
                    street,
                    number,
                    complement,
                    neighborhood,
                    city,
                    state,
                })
            }
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Flow
// =============================================================================

/// Current checkout step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStep {
    Address,
    Payment,
    Confirmation(Box<Order>),
}

impl CheckoutStep {
    const fn name(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Payment => "payment",
            Self::Confirmation(_) => "confirmation",
        }
    }
}

/// Whether checkout may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    SignInRequired,
    EmptyCart,
    Ready,
}

/// Errors that can occur while checking out.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout is at the {actual} step, expected {expected}")]
    WrongStep {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("the shipping address has invalid fields")]
    InvalidAddress(AddressErrors),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// One customer's way through checkout.
#[derive(Debug, Clone)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    address: Option<ShippingAddress>,
    payment_method: PaymentMethod,
    shipping: Option<ShippingOption>,
    coupon: Option<AppliedCoupon>,
    payment_delay: Duration,
}

impl CheckoutFlow {
    /// Start at the address step; `payment_delay` simulates payment processing.
    #[must_use]
    pub const fn new(payment_delay: Duration) -> Self {
        Self {
            step: CheckoutStep::Address,
            address: None,
            payment_method: PaymentMethod::CreditCard,
            shipping: None,
            coupon: None,
            payment_delay,
        }
    }

    #[must_use]
    pub const fn step(&self) -> &CheckoutStep {
        &self.step
    }

    #[must_use]
    pub const fn address(&self) -> Option<&ShippingAddress> {
        self.address.as_ref()
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    #[must_use]
    pub const fn shipping(&self) -> Option<&ShippingOption> {
        self.shipping.as_ref()
    }

    #[must_use]
    pub const fn coupon(&self) -> Option<&AppliedCoupon> {
        self.coupon.as_ref()
    }

    /// Checkout needs a session and, before confirmation, a non-empty cart.
    #[must_use]
    pub fn gate(&self, session: Option<&Session>, cart: &CartStore) -> Gate {
        if session.is_none() {
            Gate::SignInRequired
        } else if cart.is_empty() && !matches!(self.step, CheckoutStep::Confirmation(_)) {
            Gate::EmptyCart
        } else {
            Gate::Ready
        }
    }

    fn expect_step(&self, expected: &CheckoutStep) -> Result<(), CheckoutError> {
        if std::mem::discriminant(&self.step) == std::mem::discriminant(expected) {
            Ok(())
        } else {
            Err(CheckoutError::WrongStep {
                expected: expected.name(),
                actual: self.step.name(),
            })
        }
    }

    /// Validate the address and advance to payment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidAddress`] with per-field messages and
    /// stays on the address step.
    pub fn submit_address(&mut self, form: &AddressForm) -> Result<(), CheckoutError> {
        self.expect_step(&CheckoutStep::Address)?;
        let address = form.validate().map_err(|errors| {
            tracing::warn!(fields = errors.len(), "Address rejected");
            CheckoutError::InvalidAddress(errors)
        })?;
        self.address = Some(address);
        self.step = CheckoutStep::Payment;
        tracing::info!(step = "payment", "Checkout step changed");
        Ok(())
    }

    /// Return to the address step from payment. Returns whether it moved.
    pub fn back_to_address(&mut self) -> bool {
        if self.step != CheckoutStep::Payment {
            return false;
        }
        self.step = CheckoutStep::Address;
        tracing::info!(step = "address", "Checkout step changed");
        true
    }

    pub const fn select_payment(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    pub fn select_shipping(&mut self, option: Option<ShippingOption>) {
        self.shipping = option;
    }

    /// Validate a coupon code; a valid coupon replaces the applied one.
    pub async fn apply_coupon<B: CouponBackend>(
        &mut self,
        validator: &CouponValidator<B>,
        code: &str,
        subtotal: Decimal,
    ) -> CouponOutcome {
        let outcome = validator.validate(code, subtotal).await;
        if let CouponOutcome::Valid(applied) = &outcome {
            self.coupon = Some(applied.clone());
        }
        outcome
    }

    pub fn remove_coupon(&mut self) {
        self.coupon = None;
    }

    /// Price breakdown of `cart` with the current choices.
    #[must_use]
    pub fn summary(&self, cart: &CartStore) -> OrderPricing {
        checkout_pricing(
            cart.total_price(),
            self.payment_method,
            self.shipping.as_ref(),
            self.coupon.as_ref(),
        )
    }

    /// Process the payment and place the order.
    ///
    /// On success the flow moves to `Confirmation` and the cart is empty. On
    /// failure it stays on the payment step and the cart is untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when not on the payment step or when the order could
    /// not be placed.
    #[instrument(skip_all, fields(payment = %self.payment_method))]
    pub async fn submit<B: OrderBackend + CouponBackend>(
        &mut self,
        orders: &OrderService<B>,
        session: Option<&Session>,
        cart: &mut CartStore,
    ) -> Result<Order, CheckoutError> {
        self.expect_step(&CheckoutStep::Payment)?;
        let Some(shipping_address) = self.address.clone() else {
            self.step = CheckoutStep::Address;
            return Err(CheckoutError::WrongStep {
                expected: "payment",
                actual: "address",
            });
        };
        let details = CheckoutDetails {
            shipping_address,
            payment_method: self.payment_method,
            shipping: self.shipping.clone(),
            coupon: self.coupon.clone(),
        };

        tokio::time::sleep(self.payment_delay).await;
        let order = orders.place_order(session, cart, &details).await?;

        tracing::info!(step = "confirmation", order_id = %order.id, "Checkout step changed");
        self.step = CheckoutStep::Confirmation(Box::new(order.clone()));
        Ok(order)
    }

    /// Start over after a confirmation.
    pub fn reset(&mut self) {
        *self = Self::new(self.payment_delay);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use vitrine_core::{Category, ProductId};

    use super::*;
    use crate::backend::{AuthBackend, InMemoryBackend};
    use crate::models::{Credentials, Product};
    use crate::storage::MemoryStore;

    fn form() -> AddressForm {
        AddressForm {
            full_name: "Ana Souza".to_string(),
            email: "ana@example.com".to_string(),
            phone: "(11) 98765-4321".to_string(),
            postal_code: "01310-100".to_string(),
            street: "Av. Paulista".to_string(),
            number: "1000".to_string(),
            complement: String::new(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "sp".to_string(),
        }
    }

    fn product(stock: u32) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Mochila".to_string(),
            price: Decimal::new(100, 0),
            original_price: None,
            category: Category::Accessories,
            stock,
            image_url: String::new(),
            description: None,
            rating: None,
        }
    }

    async fn session(backend: &InMemoryBackend) -> Session {
        backend
            .sign_up(
                &Credentials {
                    email: Email::parse("ana@example.com").unwrap(),
                    password: SecretString::from("correct-horse"),
                },
                "Ana",
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_address_validation_is_field_keyed() {
        let address = form().validate().unwrap();
        assert_eq!(address.state, "SP");
        assert_eq!(address.complement, None);

        let bad = AddressForm {
            phone: "12345".to_string(),
            postal_code: "0131-0100".to_string(),
            state: "XX".to_string(),
            city: "  ".to_string(),
            ..form()
        };
        let errors = bad.validate().unwrap_err();
        let fields: Vec<AddressField> = errors.keys().copied().collect();
        assert_eq!(
            fields,
            [
                AddressField::Phone,
                AddressField::PostalCode,
                AddressField::City,
                AddressField::State
            ]
        );
    }

    #[test]
    fn test_phone_and_postal_variants() {
        for phone in ["11987654321", "(11) 3456-7890", "(21)98765-4321"] {
            let candidate = AddressForm {
                phone: phone.to_string(),
                ..form()
            };
            assert!(candidate.validate().is_ok(), "{phone} should be accepted");
        }
        let plain_cep = AddressForm {
            postal_code: "01310100".to_string(),
            ..form()
        };
        assert!(plain_cep.validate().is_ok());
    }

    #[test]
    fn test_gate() {
        let store = MemoryStore::shared();
        let mut cart = CartStore::load(store);
        let flow = CheckoutFlow::new(Duration::ZERO);
        let session = Session {
            user_id: vitrine_core::UserId::generate(),
            email: Email::parse("ana@example.com").unwrap(),
            display_name: "Ana".to_string(),
            role: vitrine_core::UserRole::Customer,
            access_token: "token".to_string(),
        };

        assert_eq!(flow.gate(None, &cart), Gate::SignInRequired);
        assert_eq!(flow.gate(Some(&session), &cart), Gate::EmptyCart);
        cart.add_item(&product(3));
        assert_eq!(flow.gate(Some(&session), &cart), Gate::Ready);
    }

    #[test]
    fn test_step_transitions() {
        let mut flow = CheckoutFlow::new(Duration::ZERO);
        assert!(!flow.back_to_address());
        assert!(matches!(
            flow.submit_address(&AddressForm::default()),
            Err(CheckoutError::InvalidAddress(_))
        ));
        assert_eq!(flow.step(), &CheckoutStep::Address);

        flow.submit_address(&form()).unwrap();
        assert_eq!(flow.step(), &CheckoutStep::Payment);
        assert!(flow.back_to_address());
        assert_eq!(flow.step(), &CheckoutStep::Address);
        assert!(flow.address().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_matches_submitted_order() {
        let backend = InMemoryBackend::new();
        let item = product(5);
        backend.insert_product(item.clone());
        let session = session(&backend).await;
        let store = MemoryStore::shared();
        let orders = OrderService::new(backend.clone(), store.clone());
        let mut cart = CartStore::load(store);
        cart.add_item(&item);
        cart.add_item(&item);

        let mut flow = CheckoutFlow::new(Duration::from_secs(2));
        flow.submit_address(&form()).unwrap();
        flow.select_payment(PaymentMethod::Pix);
        let standard = crate::services::shipping::quote("01310-100")
            .unwrap()
            .into_iter()
            .nth(1);
        flow.select_shipping(standard);
        let summary = flow.summary(&cart);
        assert_eq!(summary.shipping, Decimal::new(2290, 2));

        let started = tokio::time::Instant::now();
        let order = flow.submit(&orders, Some(&session), &mut cart).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(order.total, summary.total);
        assert_eq!(order.shipping_option.as_deref(), Some("standard"));
        assert!(cart.is_empty());
        assert!(matches!(flow.step(), CheckoutStep::Confirmation(_)));
        assert_eq!(flow.gate(Some(&session), &cart), Gate::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submit_stays_on_payment() {
        let backend = InMemoryBackend::new();
        let item = product(1);
        backend.insert_product(item.clone());
        let session = session(&backend).await;
        let store = MemoryStore::shared();
        let orders = OrderService::new(backend, store.clone());
        let mut cart = CartStore::load(store);
        cart.add_item(&item);
        cart.update_quantity(item.id, 2);

        let mut flow = CheckoutFlow::new(Duration::ZERO);
        flow.submit_address(&form()).unwrap();
        let result = flow.submit(&orders, Some(&session), &mut cart).await;
        assert!(matches!(result, Err(CheckoutError::Order(_))));
        assert_eq!(flow.step(), &CheckoutStep::Payment);
        assert_eq!(cart.item_quantity(item.id), 2);
    }
}
