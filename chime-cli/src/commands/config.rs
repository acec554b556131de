use anyhow::{Result, bail};
use chime_core::config::ChimeConfig;

pub fn init() -> Result<()> {
    let path = ChimeConfig::config_path()?;
    if path.exists() {
        bail!("Config file already exists at {}", path.display());
    }

    ChimeConfig::create_default_config(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
