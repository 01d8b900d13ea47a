use crate::extract::Candidate;
use crate::models::Availability;

pub const DEFAULT_OUT_OF_STOCK_MARKERS: &[&str] = &["out of stock", "sold out", "currently unavailable"];

/// Flags a candidate as out of stock only on an explicit textual marker.
#[derive(Debug, Clone)]
pub struct AvailabilityClassifier {
    markers: Vec<String>,
}

impl Default for AvailabilityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_OUT_OF_STOCK_MARKERS.iter().map(|m| m.to_string()))
    }
}

impl AvailabilityClassifier {
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Classify using the candidate's own scope only.
    pub fn classify(&self, candidate: &Candidate<'_>) -> Availability {
        self.classify_text(&candidate.scope_text())
    }

    pub fn classify_text(&self, text: &str) -> Availability {
        let text_lower = text.to_lowercase();

        if self.markers.iter().any(|marker| text_lower.contains(marker.as_str())) {
            Availability::OutOfStock
        } else {
            Availability::InStock
        }
    }
}
