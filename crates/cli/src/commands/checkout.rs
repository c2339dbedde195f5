//! One-shot checkout: address, payment, shipping and coupon in one command.

use clap::Args;

use vitrine_core::PaymentMethod;
use vitrine_storefront::Storefront;
use vitrine_storefront::backend::Backend;
use vitrine_storefront::checkout::{AddressForm, CheckoutError, Gate};
use vitrine_storefront::pricing::format_price;
use vitrine_storefront::routes::Route;
use vitrine_storefront::services::{CouponOutcome, ShippingQuote};

use super::{CommandResult, fail};

#[derive(Args)]
pub struct CheckoutArgs {
    /// Recipient's full name
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    /// e.g. (11) 98765-4321
    #[arg(long)]
    pub phone: String,
    /// Postal code (CEP), e.g. 01310-100
    #[arg(long)]
    pub cep: String,
    #[arg(long)]
    pub street: String,
    #[arg(long)]
    pub number: String,
    #[arg(long, default_value = "")]
    pub complement: String,
    #[arg(long)]
    pub neighborhood: String,
    #[arg(long)]
    pub city: String,
    /// Two-letter state (UF)
    #[arg(long)]
    pub state: String,
    /// credit_card, pix or boleto
    #[arg(long, default_value = "credit_card")]
    pub payment: String,
    /// Shipping option id from `vitrine shipping`
    #[arg(long)]
    pub shipping: Option<String>,
    /// Coupon code
    #[arg(long)]
    pub coupon: Option<String>,
}

impl CheckoutArgs {
    fn address_form(&self) -> AddressForm {
        AddressForm {
            full_name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            postal_code: self.cep.clone(),
            street: self.street.clone(),
            number: self.number.clone(),
            complement: self.complement.clone(),
            neighborhood: self.neighborhood.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
        }
    }
}

/// Run the checkout and place the order.
///
/// # Errors
///
/// Returns an error when signed out, with an empty cart, for an invalid
/// address or shipping option, or when the order cannot be created.
pub async fn run<B: Backend>(storefront: &mut Storefront<B>, args: CheckoutArgs) -> CommandResult {
    match storefront
        .checkout()
        .gate(storefront.session(), storefront.cart())
    {
        Gate::SignInRequired => return Err("not signed in (run `vitrine login`)".into()),
        Gate::EmptyCart => return Err("your cart is empty".into()),
        Gate::Ready => {}
    }

    let payment: PaymentMethod = args.payment.parse()?;

    storefront.checkout_mut().reset();
    if let Err(e) = storefront.checkout_mut().submit_address(&args.address_form()) {
        if let CheckoutError::InvalidAddress(errors) = &e {
            for (field, message) in errors {
                println!("  {field}: {message}");
            }
        }
        return Err(fail(e));
    }
    storefront.checkout_mut().select_payment(payment);

    if let Some(wanted) = &args.shipping {
        let option = match storefront.shipping().calculate(&args.cep).await {
            ShippingQuote::Options(options) => options
                .into_iter()
                .find(|o| &o.id == wanted)
                .ok_or_else(|| format!("unknown shipping option: {wanted}"))?,
            ShippingQuote::Invalid(reason) => return Err(reason.into()),
        };
        storefront.checkout_mut().select_shipping(Some(option));
    }

    if let Some(code) = &args.coupon {
        match storefront.apply_coupon(code).await {
            CouponOutcome::Valid(applied) => println!("{}", applied.message),
            CouponOutcome::Invalid(reason) => println!("Coupon not applied: {reason}"),
        }
    }

    let summary = storefront.checkout().summary(storefront.cart());
    println!("Subtotal:  {:>14}", format_price(summary.subtotal));
    println!("Shipping:  {:>14}", format_price(summary.shipping));
    if !summary.pix_discount.is_zero() {
        println!("PIX:       {:>14}", format!("-{}", format_price(summary.pix_discount)));
    }
    if !summary.coupon_discount.is_zero() {
        println!("Coupon:    {:>14}", format!("-{}", format_price(summary.coupon_discount)));
    }
    println!("Total:     {:>14}", format_price(summary.total));

    let order = storefront.submit_checkout().await.map_err(fail)?;
    println!("\nOrder {} placed ({}, {})", order.id, order.status, order.payment_method);
    println!("{}", Route::Order(order.id));
    Ok(())
}
