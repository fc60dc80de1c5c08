use anyhow::Result;
use top_holders::config::Config;
use top_holders::repository::Database;

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let config = Config::from_env()?;

    println!("Running migrations on database: {}", config.database_url);

    let _db = Database::new(&config.database_url)?;

    println!("Migrations completed successfully!");

    Ok(())
}
