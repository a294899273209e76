use serde::{Deserialize, Serialize};

use crate::{Catalog, Direction, FieldValue, MetricDefinition};

/// Coarse classification of a single metric value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLightStatus {
    Green,
    Amber,
    Red,
    Unknown,
}

impl TrafficLightStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficLightStatus::Green => "green",
            TrafficLightStatus::Amber => "amber",
            TrafficLightStatus::Red => "red",
            TrafficLightStatus::Unknown => "unknown",
        }
    }

    /// Dashboard glyph.
    pub fn symbol(self) -> &'static str {
        match self {
            TrafficLightStatus::Green => "🟢",
            TrafficLightStatus::Amber => "🔶",
            TrafficLightStatus::Red => "🔴",
            TrafficLightStatus::Unknown => "⚪",
        }
    }
}

impl std::fmt::Display for TrafficLightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricDefinition {
    /// Band for `value`. Non-finite input is `Unknown`.
    pub fn classify(&self, value: f64) -> TrafficLightStatus {
        if !value.is_finite() {
            return TrafficLightStatus::Unknown;
        }

        let green = self.green_max.limit(self.direction);
        let amber = self.amber_max.limit(self.direction);
        match self.direction {
            Direction::HigherIsWorse if value <= green => TrafficLightStatus::Green,
            Direction::HigherIsWorse if value <= amber => TrafficLightStatus::Amber,
            Direction::HigherIsWorse => TrafficLightStatus::Red,
            Direction::LowerIsWorse if value >= green => TrafficLightStatus::Green,
            Direction::LowerIsWorse if value >= amber => TrafficLightStatus::Amber,
            Direction::LowerIsWorse => TrafficLightStatus::Red,
        }
    }
}

/// Classify `value` against the catalog entry for `metric`.
///
/// Total: an unknown metric or a value with no numeric reading yields
/// `Unknown`.
pub fn classify(catalog: &Catalog, metric: &str, value: &FieldValue) -> TrafficLightStatus {
    let Some(definition) = catalog.metric(metric) else {
        tracing::trace!(metric, "no metric definition, status unknown");
        return TrafficLightStatus::Unknown;
    };
    value
        .as_number()
        .map_or(TrafficLightStatus::Unknown, |number| {
            definition.classify(number)
        })
}

impl Catalog {
    pub fn classify(&self, metric: &str, value: &FieldValue) -> TrafficLightStatus {
        classify(self, metric, value)
    }
}
