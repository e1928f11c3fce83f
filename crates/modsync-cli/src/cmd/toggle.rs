use anyhow::Result;

use super::manager;

pub async fn toggle(mods: &[String], enabled: bool) -> Result<()> {
    let manager = manager()?;
    for reference in mods {
        if enabled {
            manager.enable_mod(reference).await?;
            println!("enabled {reference}");
        } else {
            manager.disable_mod(reference).await?;
            println!("disabled {reference}");
        }
    }
    Ok(())
}
