//! Browsing, cart, shipping, coupons, compare, favorites and notifications.

use vitrine_core::{Category, NotificationId, ProductId};
use vitrine_storefront::Storefront;
use vitrine_storefront::backend::Backend;
use vitrine_storefront::models::Product;
use vitrine_storefront::pricing::format_price;
use vitrine_storefront::routes::Route;
use vitrine_storefront::services::{CouponOutcome, ProductQuery, ShippingQuote, SortOrder};
use vitrine_storefront::stores::AddOutcome;
use vitrine_storefront::stores::favorites::resolve_shared;

use super::{
    CartAction, CommandResult, CompareAction, FavoritesAction, NotificationsAction, fail, parse_id,
    require_session,
};

fn product_line(product: &Product) -> String {
    let mut line = format!(
        "{}  {:<32} {:>14}",
        product.id,
        product.name,
        format_price(product.price)
    );
    if let Some(percent) = product.discount_percentage() {
        line.push_str(&format!("  -{percent}%"));
    }
    if product.in_stock() {
        line.push_str(&format!("  ({} in stock)", product.stock));
    } else {
        line.push_str("  (out of stock)");
    }
    line
}

async fn fetch_product<B: Backend>(
    storefront: &Storefront<B>,
    raw_id: &str,
) -> Result<Product, Box<dyn std::error::Error>> {
    let id: ProductId = parse_id(raw_id, "product")?;
    storefront
        .catalog()
        .get(id)
        .await
        .map_err(fail)?
        .ok_or_else(|| format!("product not found: {id}").into())
}

/// List products matching the filters.
///
/// # Errors
///
/// Returns an error for an unknown category or sort, or a backend failure.
pub async fn products<B: Backend>(
    storefront: &mut Storefront<B>,
    search: Option<String>,
    category: Option<String>,
    sort: &str,
) -> CommandResult {
    let query = ProductQuery {
        search: search.filter(|s| !s.trim().is_empty()),
        category: category.map(|c| c.parse::<Category>()).transpose()?,
        sort: sort.parse::<SortOrder>()?,
    };
    if let Some(search) = &query.search {
        storefront.recent_searches_mut().record(search);
    }

    let products = storefront.catalog().list(&query).await.map_err(fail)?;
    if products.is_empty() {
        println!("No products found");
    }
    for product in &products {
        println!("{}", product_line(product));
    }
    println!("\n{}", Route::Products(query));
    Ok(())
}

/// Show one product and record it in the browsing history.
///
/// # Errors
///
/// Returns an error if the product does not exist.
pub async fn product<B: Backend>(storefront: &mut Storefront<B>, raw_id: &str) -> CommandResult {
    let product = fetch_product(storefront, raw_id).await?;
    storefront.browsing_history_mut().record(product.id);

    println!("{}", product.name);
    println!("  Price:    {}", format_price(product.price));
    if let Some(original) = product.original_price
        && let Some(percent) = product.discount_percentage()
    {
        println!("  Was:      {} (-{percent}%)", format_price(original));
    }
    println!("  Category: {}", product.category);
    println!("  Stock:    {}", product.stock);
    if let Some(description) = &product.description {
        println!("  {description}");
    }
    let reviews = storefront.reviews().for_product(product.id);
    if let Some(average) = storefront.reviews().average_rating(product.id) {
        println!("  Reviews:  {average:.1} / 5 ({} reviews)", reviews.len());
    }
    if storefront.favorites().is_favorite(product.id) {
        println!("  ♥ In your wishlist");
    }
    println!("\n{}", Route::Product(product.id));
    Ok(())
}

fn print_cart<B: Backend>(storefront: &Storefront<B>) {
    let cart = storefront.cart();
    if cart.is_empty() {
        println!("Your cart is empty");
        return;
    }
    for line in cart.items() {
        println!(
            "{}  {:<32} {:>3} × {:>12} = {:>12}",
            line.product.id,
            line.product.name,
            line.quantity,
            format_price(line.product.price),
            format_price(line.line_total())
        );
    }
    println!(
        "{} items, subtotal {}",
        cart.total_items(),
        format_price(cart.total_price())
    );
}

/// Cart subcommands.
///
/// # Errors
///
/// Returns an error for an unknown product or a backend failure.
pub async fn cart<B: Backend>(storefront: &mut Storefront<B>, action: CartAction) -> CommandResult {
    match action {
        CartAction::Show => {
            if let Err(e) = storefront.refresh_cart_stock().await {
                e.report();
                tracing::warn!("Stock could not be refreshed: {}", e.user_message());
            }
        }
        CartAction::Add { product_id } => {
            let product = fetch_product(storefront, &product_id).await?;
            match storefront.cart_mut().add_item(&product) {
                AddOutcome::Added { quantity } => {
                    println!("Added {} (now {quantity} in cart)", product.name);
                }
                AddOutcome::Rejected(reason) => println!("{reason}"),
            }
        }
        CartAction::Remove { product_id } => {
            let id: ProductId = parse_id(&product_id, "product")?;
            storefront.cart_mut().remove_item(id);
        }
        CartAction::Set {
            product_id,
            quantity,
        } => {
            let id: ProductId = parse_id(&product_id, "product")?;
            storefront.cart_mut().update_quantity(id, quantity);
        }
        CartAction::Clear => storefront.cart_mut().clear(),
    }
    print_cart(storefront);
    Ok(())
}

/// Print shipping options for a postal code.
pub async fn shipping<B: Backend>(storefront: &Storefront<B>, postal_code: &str) {
    match storefront.shipping().calculate(postal_code).await {
        ShippingQuote::Options(options) => {
            for option in options {
                println!("{:<14} {option}", option.id);
            }
        }
        ShippingQuote::Invalid(reason) => println!("{reason}"),
    }
}

/// Check a coupon against the current cart.
///
/// # Errors
///
/// Never fails; an invalid coupon is printed, not returned.
pub async fn coupon<B: Backend>(storefront: &Storefront<B>, code: &str) -> CommandResult {
    let subtotal = storefront.cart().total_price();
    match storefront.coupons().validate(code, subtotal).await {
        CouponOutcome::Valid(applied) => println!(
            "{} (-{} on {})",
            applied.message,
            format_price(applied.discount),
            format_price(subtotal)
        ),
        CouponOutcome::Invalid(reason) => println!("{reason}"),
    }
    Ok(())
}

/// Notification subcommands.
///
/// # Errors
///
/// Returns an error when signed out or for a malformed id.
pub fn notifications<B: Backend>(
    storefront: &mut Storefront<B>,
    action: NotificationsAction,
) -> CommandResult {
    let center = storefront
        .notifications_mut()
        .ok_or("not signed in (run `vitrine login`)")?;
    match action {
        NotificationsAction::List => {
            if center.items().is_empty() {
                println!("No notifications");
            }
            for note in center.items() {
                let marker = if note.read { " " } else { "•" };
                println!(
                    "{marker} {}  {}  {}: {}",
                    note.id,
                    note.created_at.format("%d/%m %H:%M"),
                    note.title,
                    note.message
                );
                if let Some(link) = &note.link {
                    println!("    {link}");
                }
            }
            println!("{} unread", center.unread_count());
        }
        NotificationsAction::Read { id } => {
            center.mark_read(parse_id::<NotificationId>(&id, "notification")?);
        }
        NotificationsAction::ReadAll => center.mark_all_read(),
        NotificationsAction::Remove { id } => {
            center.remove(parse_id::<NotificationId>(&id, "notification")?);
        }
        NotificationsAction::Clear => center.clear(),
    }
    Ok(())
}

/// Compare subcommands.
///
/// # Errors
///
/// Returns an error for an unknown product.
pub async fn compare<B: Backend>(
    storefront: &mut Storefront<B>,
    action: CompareAction,
) -> CommandResult {
    match action {
        CompareAction::List => {}
        CompareAction::Add { product_id } => {
            let product = fetch_product(storefront, &product_id).await?;
            if let Err(reason) = storefront.compare_mut().add(&product) {
                println!("{reason}");
            }
        }
        CompareAction::Remove { product_id } => {
            let id: ProductId = parse_id(&product_id, "product")?;
            storefront.compare_mut().remove(id);
        }
        CompareAction::Clear => storefront.compare_mut().clear(),
    }

    let products = storefront.compare().products();
    if products.is_empty() {
        println!("Nothing to compare");
    }
    for product in products {
        let rating = product
            .rating
            .map_or_else(|| "-".to_string(), |r| format!("{r:.1}"));
        println!(
            "{:<32} {:>14}  {:<12} stock {:>4}  rating {rating}",
            product.name,
            format_price(product.price),
            product.category.to_string(),
            product.stock
        );
    }
    Ok(())
}

async fn print_products<B: Backend>(
    storefront: &Storefront<B>,
    ids: &[ProductId],
) -> CommandResult {
    let products = storefront
        .catalog()
        .list(&ProductQuery::default())
        .await
        .map_err(fail)?;
    let listed: Vec<&Product> = products.iter().filter(|p| ids.contains(&p.id)).collect();
    if listed.is_empty() {
        println!("No favorites yet");
    }
    for product in listed {
        println!("{}", product_line(product));
    }
    Ok(())
}

/// Favorites subcommands.
///
/// # Errors
///
/// Returns an error when signed out (except for shared lists) or on a
/// backend failure.
pub async fn favorites<B: Backend>(
    storefront: &mut Storefront<B>,
    action: FavoritesAction,
) -> CommandResult {
    match action {
        FavoritesAction::List => {
            require_session(storefront.session())?;
            let ids = storefront.favorites().ids().to_vec();
            print_products(storefront, &ids).await?;
        }
        FavoritesAction::Toggle { product_id } => {
            let id: ProductId = parse_id(&product_id, "product")?;
            let now_favorite = storefront.toggle_favorite(id).await.map_err(fail)?;
            println!(
                "{}",
                if now_favorite {
                    "Added to your wishlist"
                } else {
                    "Removed from your wishlist"
                }
            );
        }
        FavoritesAction::Share => {
            require_session(storefront.session())?;
            let code = storefront
                .favorites()
                .share_code()
                .ok_or("favorites are not loaded")?;
            println!("{}", Route::SharedWishlist(code));
        }
        FavoritesAction::Shared { code } => {
            let ids = resolve_shared(storefront.backend(), &code)
                .await
                .map_err(fail)?;
            print_products(storefront, &ids).await?;
        }
    }
    Ok(())
}
