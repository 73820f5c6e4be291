//! System status: catalog counts and queue state.

use console::style;

use super::{open_catalog, open_queue};
use crate::config::Settings;
use crate::repository::CatalogStore;

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", style("courseharvest status").bold());
    println!("data dir: {}", settings.data_dir.display());
    println!();

    if settings.catalog_db_path().exists() {
        let store = open_catalog(settings)?;
        println!("{}", style("Catalog").underlined());
        println!("  courses:      {}", store.count_courses().await?);
        println!("  universities: {}", store.count_universities().await?);
    } else {
        println!("Catalog database not created yet.");
    }
    println!();

    if settings.queue_db_path().exists() {
        let queue = open_queue(settings)?;
        let stats = queue.stats()?;
        println!(
            "{}{}",
            style("Queue").underlined(),
            if queue.is_paused()? {
                style(" (paused)").yellow().to_string()
            } else {
                String::new()
            }
        );
        println!("  waiting:   {} ({} delayed)", stats.waiting, stats.delayed);
        println!("  active:    {}", stats.active);
        println!("  completed: {}", stats.completed);
        println!("  failed:    {}", stats.failed);
    } else {
        println!("Queue database not created yet.");
    }
    Ok(())
}
