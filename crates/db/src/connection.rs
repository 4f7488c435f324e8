use alerta_config::settings::DatabaseSettings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::info;

const APP_NAME: &str = "alerta";

/// Opens the pool and pings the alert database before handing it out, so a
/// bad URL fails at startup rather than on the first alert.
pub async fn connect(database: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let mut options = ClientOptions::parse(&database.url).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.max_pool_size = database.max_pool_size.or(options.max_pool_size);
    options.min_pool_size = database.min_pool_size.or(options.min_pool_size);

    let db = Client::with_options(options)?.database(&database.name);
    db.run_command(bson::doc! { "ping": 1 }).await?;

    info!(
        db = %database.name,
        max_pool = ?database.max_pool_size,
        "Alert store connected"
    );
    Ok(db)
}
