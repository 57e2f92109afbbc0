use rootward_domain::Config;

pub fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    let config = Config::load(config_path)?;
    Ok(config)
}
