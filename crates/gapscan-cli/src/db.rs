//! Database utility commands.

use sqlx::PgPool;

pub(crate) async fn run_ping(pool: &PgPool) -> anyhow::Result<()> {
    gapscan_db::ping(pool).await?;
    println!("database ok");
    Ok(())
}

pub(crate) async fn run_migrate(pool: &PgPool) -> anyhow::Result<()> {
    let applied = gapscan_db::run_migrations(pool).await?;
    if applied == 0 {
        println!("database is up to date");
    } else {
        println!("applied {applied} migrations");
    }
    Ok(())
}
