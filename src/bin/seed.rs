use std::path::PathBuf;

use clap::Parser;
use portuguese_tutor::{seed::seed_demo, storage::SqliteStorage, utils::init_log};

#[derive(Parser)]
#[command(author, version, about = "Fill a database with the demo curriculum", long_about = None)]
struct Cli {
    /// Path to database file
    #[arg(short, long, default_value = "./database/portuguese.db")]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_log(None, "info")?;
    let args = Cli::parse();
    let storage = SqliteStorage::connect(&args.database).await?;
    seed_demo(&storage).await?;
    Ok(())
}
