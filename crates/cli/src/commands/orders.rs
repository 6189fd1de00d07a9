//! Pre-order commands.
//!
//! # Usage
//!
//! ```bash
//! bistro orders create -n "Ada Lovelace" -e ada@example.com -p 555-0100 \
//!     --pickup-date 2026-10-20 --pickup-time 18:30 --item 1x2 --item 3
//! bistro orders list
//! bistro orders status 1760000000000 confirmed
//! ```
//!
//! Orders are kept in `BISTRO_DATA_DIR`; menu items are looked up in
//! `BISTRO_MENU_PATH`.

use std::io::Write;
use std::str::FromStr;

use bistro_core::{Cart, Customer, Email, MenuItemId, OrderId, OrderStatus, PreOrder};
use bistro_storefront::config::StorefrontConfig;
use bistro_storefront::error::{Result, StorefrontError, add_breadcrumb};
use bistro_storefront::menu::Menu;
use bistro_storefront::orders::OrderStore;
use bistro_storefront::storage::{FileStorage, LocalStorage};
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

/// A menu item and how many of it to order, written `<id>` or `<id>x<qty>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSpec {
    pub id: MenuItemId,
    pub quantity: u32,
}

impl FromStr for ItemSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (id, quantity) = match s.split_once(['x', 'X']) {
            Some((id, quantity)) => (id, quantity),
            None => (s, "1"),
        };
        let id: i32 = id
            .trim()
            .parse()
            .map_err(|_| format!("invalid menu item id in '{s}'"))?;
        let quantity: u32 = quantity
            .trim()
            .parse()
            .map_err(|_| format!("invalid quantity in '{s}'"))?;
        if quantity == 0 {
            return Err(format!("quantity must be at least 1 in '{s}'"));
        }
        Ok(Self {
            id: MenuItemId::new(id),
            quantity,
        })
    }
}

/// Parse a pickup time given as `HH:MM` or `HH:MM:SS`.
///
/// # Errors
///
/// Returns a message naming the expected format.
pub fn parse_pickup_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}

/// Everything `orders create` collects from the command line.
#[derive(Debug, Clone)]
pub struct NewOrderArgs {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub items: Vec<ItemSpec>,
    pub instructions: Option<String>,
}

fn open_store(config: &StorefrontConfig) -> Result<OrderStore<FileStorage>> {
    Ok(OrderStore::open(FileStorage::new(&config.data_dir))?)
}

/// Place a pre-order and print it.
///
/// # Errors
///
/// Returns an error if the menu cannot be loaded, an item is not on the menu,
/// or the order cannot be saved.
pub fn create(config: &StorefrontConfig, args: NewOrderArgs, out: &mut impl Write) -> Result<()> {
    let menu = Menu::load(&config.menu_path)?;
    let store = open_store(config)?;

    let order = place_order(&store, &menu, args)?;
    render_order(out, &order)?;
    Ok(())
}

/// Fill a cart from the menu and check it out into `store`.
///
/// # Errors
///
/// Returns `StorefrontError::BadRequest` for items missing from the menu and
/// propagates store failures.
pub fn place_order<S: LocalStorage>(
    store: &OrderStore<S>,
    menu: &Menu,
    args: NewOrderArgs,
) -> Result<PreOrder> {
    let mut cart = Cart::new();
    for spec in &args.items {
        let item = menu
            .find(spec.id)
            .ok_or_else(|| StorefrontError::BadRequest(format!("menu item {} not found", spec.id)))?;
        cart.add_quantity(item.clone(), spec.quantity);
    }

    let customer = Customer {
        name: args.name,
        email: args.email,
        phone: args.phone,
    };
    let input = cart.checkout(customer, args.pickup_date, args.pickup_time, args.instructions)?;
    let order = store.create_order(input)?;

    info!(order_id = %order.id, total = %order.total_amount, "Pre-order placed");
    add_breadcrumb("orders", "Placed pre-order", Some(&[("order_id", order.id.as_str())]));
    Ok(order)
}

/// Print every stored order.
///
/// # Errors
///
/// Returns an error if storage cannot be read or output fails.
pub fn list(config: &StorefrontConfig, out: &mut impl Write) -> Result<()> {
    let store = open_store(config)?;
    render_orders(out, &store.orders())?;
    Ok(())
}

/// Set an order's status and print the updated order.
///
/// # Errors
///
/// Returns `StorefrontError::NotFound` for unknown ids and propagates store
/// failures.
pub fn set_status(
    config: &StorefrontConfig,
    order_id: &OrderId,
    status: OrderStatus,
    out: &mut impl Write,
) -> Result<()> {
    let store = open_store(config)?;
    let order = store
        .update_order_status(order_id, status)?
        .ok_or_else(|| StorefrontError::NotFound(format!("order {order_id}")))?;

    add_breadcrumb(
        "orders",
        "Updated order status",
        Some(&[("order_id", order.id.as_str()), ("status", status.as_str())]),
    );
    render_order(out, &order)?;
    Ok(())
}

fn render_order(out: &mut impl Write, order: &PreOrder) -> std::io::Result<()> {
    writeln!(out, "Order {} [{}]", order.id, order.status)?;
    writeln!(
        out,
        "  Pickup: {} {} for {} <{}>, {}",
        order.pickup_date,
        order.pickup_time.format("%H:%M"),
        order.customer.name,
        order.customer.email,
        order.customer.phone
    )?;
    for item in &order.items {
        writeln!(
            out,
            "  {} x {}  {}",
            item.quantity,
            item.menu_item.name,
            item.line_total()
        )?;
    }
    if let Some(instructions) = &order.special_instructions {
        writeln!(out, "  Note: {instructions}")?;
    }
    writeln!(out, "  Total: {}", order.total_amount)
}

fn render_orders(out: &mut impl Write, orders: &[PreOrder]) -> std::io::Result<()> {
    if orders.is_empty() {
        return writeln!(out, "No orders.");
    }
    for order in orders {
        writeln!(
            out,
            "{}  {:<10} {} {}  {:<20} {}",
            order.id,
            order.status.as_str(),
            order.pickup_date,
            order.pickup_time.format("%H:%M"),
            order.customer.name,
            order.total_amount
        )?;
    }
    Ok(())
}
