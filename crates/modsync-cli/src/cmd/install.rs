use anyhow::{Result, bail};

use super::manager;

pub async fn install(mods: &[String], version: Option<&str>) -> Result<()> {
    let manager = manager()?;
    if let Some(constraint) = version {
        let [reference] = mods else {
            bail!("--version requires exactly one mod");
        };
        manager.install_mod_version(reference, constraint).await?;
        println!("installed {reference} ({constraint})");
    } else {
        for reference in mods {
            manager.install_mod(reference).await?;
            println!("installed {reference}");
        }
    }
    Ok(())
}
