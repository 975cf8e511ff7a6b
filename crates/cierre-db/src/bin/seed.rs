//! # Seed Data Generator
//!
//! Populates a database with a paint-store catalog and one business day of
//! delivered orders, so the closing flow can be tried end to end.
//!
//! ## Usage
//! ```bash
//! # Seed ./cierre_dev.db with today's orders
//! cargo run -p cierre-db --bin seed
//!
//! # Pick the database and the business day
//! cargo run -p cierre-db --bin seed -- --db ./data/cierre.db --date 2024-06-01
//!
//! # More orders
//! cargo run -p cierre-db --bin seed -- --orders 60
//! ```
//!
//! ## Generated Orders
//! - Spread over three couriers plus a few unassigned ones
//! - Half carry structured line items, half only the legacy summary text
//! - Some include a shipping line ("Envío")
//! - Payment methods rotate through efectivo / transferencia / tarjeta / none
//! - Orders are inserted out for delivery, then marked delivered the way a
//!   courier would

use chrono::{Duration, Utc};
use std::env;

use cierre_core::validation::{validate_date_key, validate_product_name, validate_stock};
use cierre_core::{
    DateKey, LineItem, Order, PaymentMethod, Product, DEFAULT_UTC_OFFSET_MINUTES,
};
use cierre_db::repository::product::generate_product_id;
use cierre_db::{Database, DbConfig};

/// (name, price, stock, min threshold)
const CATALOG: &[(&str, i64, i64, i64)] = &[
    ("LATEX BLANCO 20L", 42000, 40, 8),
    ("LATEX BLANCO 4L", 11500, 60, 10),
    ("ESMALTE SINTETICO NEGRO 1L", 9800, 25, 5),
    ("ESMALTE SINTETICO BLANCO 1L", 9800, 30, 5),
    ("ENDUIDO PLASTICO 10L", 18500, 15, 4),
    ("FIJADOR SELLADOR 4L", 12300, 20, 4),
    ("RODILLO LANA 22CM", 4500, 50, 10),
    ("PINCEL N°20", 2100, 80, 15),
    ("CINTA DE PAPEL 24MM", 1200, 120, 20),
    ("LIJA AL AGUA 180", 450, 200, 40),
    ("MEMBRANA LIQUIDA 20KG", 56000, 6, 3),
    ("Envío", 3000, 10000, 0),
];

const COURIERS: &[&str] = &[
    "repartidor1@pintureria.com",
    "repartidor2@pintureria.com",
    "repartidor3@pintureria.com",
];

const SELLERS: &[&str] = &["ventas1@pintureria.com", "ventas2@pintureria.com"];

const PAYMENT_METHODS: &[PaymentMethod] = &[
    PaymentMethod::Cash,
    PaymentMethod::Transfer,
    PaymentMethod::Card,
    PaymentMethod::Cash,
    PaymentMethod::Unspecified,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut order_count: usize = 24;
    let mut db_path = String::from("./cierre_dev.db");
    let mut date_arg: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--orders" | "-n" => {
                if i + 1 < args.len() {
                    order_count = args[i + 1].parse().unwrap_or(24);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--date" => {
                if i + 1 < args.len() {
                    date_arg = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cierre de Caja Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --orders <N>      Orders to generate (default: 24)");
                println!("  -d, --db <PATH>       Database file path (default: ./cierre_dev.db)");
                println!("      --date <DATE>     Business day, yyyy-mm-dd (default: today)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let date_key = match date_arg {
        Some(value) => validate_date_key(&value)?,
        None => DateKey::containing(Utc::now(), DEFAULT_UTC_OFFSET_MINUTES)?,
    };

    println!("🌱 Cierre de Caja Seed Data Generator");
    println!("=====================================");
    println!("Database: {}", db_path);
    println!("Business day: {}", date_key);
    println!("Orders: {}", order_count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Catalog: only when empty
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Catalog already has {} products, keeping it", existing);
    } else {
        for (name, price, stock, min) in CATALOG {
            validate_product_name(name)?;
            validate_stock("stock_quantity", *stock)?;
            validate_stock("min_stock_threshold", *min)?;

            let mut product = Product::new(generate_product_id(), *name, *price, *stock);
            product.min_stock_threshold = *min;
            db.products().insert(&product).await?;
        }
        println!("✓ Inserted {} products", CATALOG.len());
    }

    // Orders spread across the business day
    let (start, _) = date_key.bounds(DEFAULT_UTC_OFFSET_MINUTES)?;
    let mut inserted = 0;
    let mut delivered = 0;

    for n in 0..order_count {
        let order = generate_order(date_key, n, start + Duration::minutes(9 * 60 + 17 * n as i64));
        if let Err(e) = db.orders().insert(&order).await {
            eprintln!("Failed to insert {}: {}", order.id, e);
            continue;
        }
        inserted += 1;

        if let Some(method) = delivery(n) {
            db.orders().mark_delivered(&order.id, method).await?;
            delivered += 1;
        }
    }

    println!("✓ Inserted {} orders, {} delivered", inserted, delivered);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// How the n-th order was paid on delivery. Every 6th is still out for delivery.
fn delivery(n: usize) -> Option<PaymentMethod> {
    (n % 6 != 5).then(|| PAYMENT_METHODS[n % PAYMENT_METHODS.len()])
}

/// Builds the n-th order of the day, out for delivery.
fn generate_order(date_key: DateKey, n: usize, at: chrono::DateTime<Utc>) -> Order {
    let mut order = Order::new(format!("{}-{:03}", date_key, n + 1), at);

    // Every 8th order stays unassigned
    if n % 8 != 7 {
        order.assigned_to = vec![COURIERS[n % COURIERS.len()].to_string()];
    }

    order.seller_email = (n % 5 != 4).then(|| SELLERS[n % SELLERS.len()].to_string());
    order.customer_name = Some(format!("Cliente {}", n + 1));
    order.address = Some(format!("Calle {} {}", 10 + n % 40, 100 + n * 13));
    order.phone = Some(format!("11-5{:03}-{:04}", n, n * 37 % 10000));

    // Three catalog lines per order, cycling through the goods
    let goods = &CATALOG[..CATALOG.len() - 1];
    let mut items: Vec<LineItem> = (0..3)
        .map(|k| {
            let (name, price, _, _) = goods[(n * 3 + k) % goods.len()];
            LineItem::new(name, 1 + ((n + k) % 3) as i64, price)
        })
        .collect();
    if n % 3 == 0 {
        let (name, price, _, _) = CATALOG[CATALOG.len() - 1];
        items.push(LineItem::new(name, 1, price));
    }

    let total: i64 = items.iter().map(|item| item.quantity * item.price).sum();
    let summary = items
        .iter()
        .map(|item| {
            format!(
                "{} x{} (${})",
                item.product_name,
                item.quantity,
                item.quantity * item.price
            )
        })
        .collect::<Vec<_>>()
        .join(" - ");
    order.summary_text = Some(format!("{} | TOTAL: ${}", summary, total));

    // Legacy orders only carry the text
    if n % 2 == 0 {
        order.line_items = Some(items);
    }

    order
}
