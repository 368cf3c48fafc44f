//! `report` command: print the week's ranked gap scores.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::resolve_week;

/// Print the week's gap scores across all platforms as a markdown table,
/// highest gap first.
///
/// # Errors
///
/// Returns an error if the week argument is invalid or the query fails.
pub(crate) async fn run_report(
    pool: &PgPool,
    week: Option<NaiveDate>,
    limit: i64,
) -> anyhow::Result<()> {
    let week_start = resolve_week(week)?;
    let limit = limit.clamp(1, 100);

    let rows = gapscan_db::list_top_gap_scores(pool, week_start, limit).await?;
    if rows.is_empty() {
        println!("no gap scores recorded for week {week_start}");
        return Ok(());
    }

    println!("## Gap scores for week {week_start}");
    println!();
    println!("| # | Platform | Category | Demand | Supply | Gap | Verdict |");
    println!("|---|----------|----------|--------|--------|-----|---------|");
    for (rank, row) in rows.iter().enumerate() {
        let category = row.category.replace('|', "\\|");
        println!(
            "| {} | {} | {} | {:.3} | {:.3} | {:.3} | {} |",
            rank + 1,
            row.platform,
            category,
            row.demand_score,
            row.supply_score,
            row.gap_score,
            row.verdict
        );
    }

    Ok(())
}
