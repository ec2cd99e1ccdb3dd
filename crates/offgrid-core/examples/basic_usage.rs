//! Basic usage example - list offline regions and search them

use offgrid_core::{OfflineSession, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Data directory and query from args
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./offgrid-data".to_string());
    let query = std::env::args().nth(2).unwrap_or_else(|| "main".to_string());

    println!("Opening offline session at: {}", path);

    let session = OfflineSession::builder(&path)
        .auto_create_dirs(true)
        .load_config_file()?
        .with_sweeper(false)
        .build()
        .await?;

    let regions = session.regions().list()?;
    if regions.is_empty() {
        println!("No regions downloaded yet.");
    } else {
        println!("Found {} regions:", regions.len());
        for region in &regions {
            println!(
                "  - {} ({}, {}, expires {})",
                region.name, region.id, region.status, region.expires_at
            );
        }
    }

    let results = session.search_task().run(&query).await?;
    println!("{} results for {:?}:", results.len(), query);
    for entry in results.entries() {
        println!("  - {} [{}]", entry.name, entry.kind.as_str());
    }

    session.shutdown().await;
    Ok(())
}
