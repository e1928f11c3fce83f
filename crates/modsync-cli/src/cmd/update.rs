use anyhow::Result;

use super::manager;

/// Show available updates without changing anything.
pub async fn check() -> Result<()> {
    let manager = manager()?;
    let updates = manager.check_for_updates().await?;
    if updates.is_empty() {
        println!("all mods are up to date");
        return Ok(());
    }
    for update in updates {
        println!(
            "{:<32} {} -> {}",
            update.item, update.current_version, update.new_version
        );
    }
    Ok(())
}

/// Update the named mods, or everything with a newer version.
pub async fn apply(mods: &[String]) -> Result<()> {
    let manager = manager()?;
    let targets: Vec<String> = if mods.is_empty() {
        manager
            .check_for_updates()
            .await?
            .into_iter()
            .map(|update| update.item)
            .collect()
    } else {
        mods.to_vec()
    };
    if targets.is_empty() {
        println!("nothing to update");
        return Ok(());
    }

    match manager.update_mods(&targets).await {
        Ok(()) => {
            println!("updated {} mod(s)", targets.len());
            Ok(())
        }
        Err(error) if error.is_resolution_conflict() => {
            // Constraint conflicts carry the clashing requirements;
            // surface them verbatim instead of a generic failure.
            anyhow::bail!("{error}")
        }
        Err(error) => Err(error.into()),
    }
}
