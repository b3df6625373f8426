//! Store status overview.
//!
//! A quick summary of which backend is configured and how many profiles
//! it holds. Used by `prosync status` to confirm a sync landed.

use anyhow::Result;

use crate::store::ProfileStore;

pub async fn run_status(store: &dyn ProfileStore) -> Result<()> {
    let count = store.count().await?;

    println!("Profile Sync — Store Status");
    println!("===========================");
    println!();
    println!("  Store:     {}", store.describe());
    println!("  Profiles:  {}", count);
    println!();

    Ok(())
}
