//! `aperture stats`: a thin read-only wrapper over `Store::stats()`,
//! generalizing the teacher's `config show` inspection habit to the
//! Store itself.

use aperture_core::Config;

pub async fn execute(config: &Config) -> anyhow::Result<()> {
    let path = config.store_path();
    if !path.exists() {
        println!("No store found at {}", path.display());
        return Ok(());
    }
    let store = aperture_core::Store::open(&path, config.store.busy_timeout_ms, config.store.busy_retries)?;
    let stats = store.stats()?;

    println!("Store: {}", path.display());
    println!("Tables:");
    for (name, count) in &stats.table_counts {
        println!("  {name}: {count}");
    }
    if !stats.run_status_counts.is_empty() {
        println!("Phase runs by status:");
        for (status, count) in &stats.run_status_counts {
            println!("  {status}: {count}");
        }
    }
    Ok(())
}
