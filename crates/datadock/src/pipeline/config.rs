use crate::config::Config;
use crate::schema::AliasTable;

/// The slice of the application config the analysis pipeline needs.
pub struct PipelineConfig {
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub sample_rows: usize,
    pub aliases: AliasTable,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            similarity_threshold: config.matching.similarity_threshold,
            top_k: config.matching.top_k,
            sample_rows: config.preview.sample_rows,
            aliases: AliasTable::from_config(&config.aliases),
        }
    }
}
