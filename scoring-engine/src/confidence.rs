use painminer_core::{
    AggregatedPainPoint, ConfidenceConfig, ConfidenceTier, ConfigError, CrossPlatformStrength,
};

/// Step-function classifier over an aggregate's platforms, merge count,
/// intensity and payment signal. Both outputs are monotonic in platform
/// count and merge count.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceClassifier {
    config: ConfidenceConfig,
}

impl Default for ConfidenceClassifier {
    fn default() -> Self {
        Self {
            config: ConfidenceConfig::default(),
        }
    }
}

impl ConfidenceClassifier {
    pub fn new(config: ConfidenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn classify(&self, point: &AggregatedPainPoint) -> (ConfidenceTier, CrossPlatformStrength) {
        let platforms = point.platforms.len();
        (
            self.tier(
                platforms,
                point.merge_count,
                point.emotional_intensity,
                point.payment_signal,
            ),
            self.strength(platforms, point.merge_count),
        )
    }

    /// Classify in place.
    pub fn apply(&self, point: &mut AggregatedPainPoint) {
        let (tier, strength) = self.classify(point);
        point.confidence_tier = tier;
        point.cross_platform_strength = strength;
    }

    pub fn strength(&self, platforms: usize, merge_count: u32) -> CrossPlatformStrength {
        match platforms {
            0 | 1 => CrossPlatformStrength::None,
            2 if merge_count <= self.config.weak_max_merges => CrossPlatformStrength::Weak,
            2 => CrossPlatformStrength::Moderate,
            _ if merge_count >= self.config.strong_min_merges => CrossPlatformStrength::Strong,
            _ => CrossPlatformStrength::Moderate,
        }
    }

    pub fn tier(
        &self,
        platforms: usize,
        merge_count: u32,
        intensity: u8,
        payment_signal: bool,
    ) -> ConfidenceTier {
        let c = &self.config;
        if platforms >= 2 || (merge_count >= c.high_volume_min_merges && payment_signal) {
            ConfidenceTier::High
        } else if merge_count >= c.medium_min_merges || intensity >= c.medium_min_intensity {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}
