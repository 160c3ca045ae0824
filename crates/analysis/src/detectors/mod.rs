pub mod conduct;
pub mod fluency;
pub mod grammar;

pub use conduct::ConductDetector;
pub use fluency::FluencyDetector;
pub use grammar::GrammarDetector;

use std::sync::Arc;

use interpmon_config::ScoringConfig;

use crate::Detector;

/// Builds the standard detector set from configured rule lists.
pub fn default_detectors(config: &ScoringConfig) -> anyhow::Result<Vec<Arc<dyn Detector>>> {
    Ok(vec![
        Arc::new(FluencyDetector::new(&config.filler_rules)),
        Arc::new(GrammarDetector::new(&config.grammar_rules)?),
        Arc::new(ConductDetector::new(&config.conduct_rules)),
    ])
}
