use anyhow::Result;

use super::manager;

pub async fn remove(mods: &[String]) -> Result<()> {
    let manager = manager()?;
    for reference in mods {
        manager.remove_mod(reference).await?;
        println!("removed {reference}");
    }
    Ok(())
}
