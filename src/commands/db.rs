//! Database maintenance

use anyhow::{bail, Result};

use crate::Draftsmith;

/// Open the draft database and report its health
pub fn check(app: &Draftsmith) -> Result<()> {
    let db = app.open_database()?;
    let status = db.health_check()?;
    db.shutdown();

    println!("Database: {}", db.location());
    println!("  Healthy: {}", status.healthy);
    println!("  Latency: {:.2}ms", status.latency.as_secs_f64() * 1000.0);
    println!("  Drafts:  {}", status.draft_count);

    if !status.healthy {
        bail!("draft database at {} is unhealthy", db.location());
    }
    Ok(())
}
