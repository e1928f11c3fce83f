use anyhow::Result;

use super::manager;

pub fn list() -> Result<()> {
    let manager = manager()?;
    let Some(installation) = manager.selected_installation() else {
        println!("no installation selected");
        return Ok(());
    };
    let profile = manager.active_profile()?;
    let lockfile = installation.load_lockfile()?.unwrap_or_default();

    println!(
        "profile '{}' on {} (game build {})",
        profile.name,
        installation.path.display(),
        installation.game_version
    );
    if profile.mods.is_empty() {
        println!("no mods declared");
        return Ok(());
    }
    for (reference, declared) in &profile.mods {
        let locked = lockfile
            .mods
            .get(reference)
            .map_or_else(|| "-".to_string(), |locked| locked.version.to_string());
        let state = if declared.enabled { "enabled" } else { "disabled" };
        println!(
            "{reference:<32} {state:<9} {:<12} {locked}",
            declared.constraint
        );
    }
    Ok(())
}
