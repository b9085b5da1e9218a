use chrono::{Duration, Utc};
use storefront_core::{config::AppConfig, db::create_pool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let customer_id = ensure_customer(
        &pool,
        "ada@example.com",
        "Ada Lovelace",
        "1 Analytical Way",
    )
    .await?;
    seed_catalog(&pool).await?;
    seed_time_slots(&pool).await?;

    println!("Seed completed. Customer ID: {customer_id}");
    Ok(())
}

async fn ensure_customer(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    address: &str,
) -> anyhow::Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO customers (name, email, address)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET address = EXCLUDED.address
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(address)
    .fetch_optional(pool)
    .await?;

    // If the customer already exists, fetch the id
    let customer_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (i64,) = sqlx::query_as("SELECT id FROM customers WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured customer {email}");
    Ok(customer_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let items = vec![
        ("Walnut Desk Organizer", "Keeps the chaos contained", 550000, 50),
        ("Ceramic Pour-Over Set", "Morning coffee done properly", 120000, 100),
        ("Linen Notebook", "Lies flat, takes ink well", 50000, 200),
        ("Brass Bookends", "Heavy enough for hardcovers", 250000, 75),
    ];

    for (name, desc, price, stock) in items {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (name, description, price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog items");
    Ok(())
}

async fn seed_time_slots(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let tomorrow = (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(9, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("failed to build seed slot time"))?
        .and_utc();

    for hour in 0..6i64 {
        let starts_at = tomorrow + Duration::hours(hour);
        sqlx::query(
            r#"
            INSERT INTO time_slots (starts_at)
            VALUES ($1)
            ON CONFLICT (starts_at) DO NOTHING
            "#,
        )
        .bind(starts_at)
        .execute(pool)
        .await?;
    }

    println!("Seeded time slots");
    Ok(())
}
