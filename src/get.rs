//! Point lookups from the local store.
//!
//! Used by the `prosync get` and `prosync ids` CLI commands. Output is
//! pretty-printed JSON so results can be piped into other tooling.

use anyhow::{bail, Result};

use crate::store::ProfileStore;

/// Look up one profile (or one of its sub-documents) and print it.
pub async fn run_get(store: &dyn ProfileStore, id: i64, part: &str) -> Result<()> {
    let value = match part {
        "profile" => store.profile(id).await?,
        "presentations" => store.presentations(id).await?,
        "publications" => store.publications(id).await?,
        "processing" => store.processing(id).await?,
        other => bail!(
            "Unknown part: '{}'. Available: profile, presentations, publications, processing",
            other
        ),
    };

    match value {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => {
            eprintln!("profile {id} has no stored {part}");
            std::process::exit(1);
        }
    }
}

/// Print all stored profile ids, one per line.
pub async fn run_ids(store: &dyn ProfileStore) -> Result<()> {
    for id in store.ids().await? {
        println!("{id}");
    }
    Ok(())
}
