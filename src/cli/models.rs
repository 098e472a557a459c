use anyhow::Result;

use crate::ai::load_models;
use crate::core::AppConfig;

pub async fn run(config: AppConfig) -> Result<()> {
    let models = load_models(config.catalog_url.as_deref()).await;
    for model in models {
        println!("{:<24} {:<18} {}", model.id, model.name, model.description);
    }
    Ok(())
}
