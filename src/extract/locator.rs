use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::error::SetupError;
use crate::extract::{Candidate, CandidateOrigin};
use crate::parsers::{clean_text, has_currency_marker, truncate_chars};

/// Ranked structural lookups used when no strategies are configured.
pub const DEFAULT_STRATEGIES: &[(&str, &str)] = &[
    (
        "product-card",
        r#"div[class*="product-card"], div[class*="product-item"], div[class*="ProductCard"]"#,
    ),
    ("sku-container", "div[data-sku]"),
    ("product-container", r#"div[class*="product"]"#),
    ("item-container", "div.item"),
    ("article", "article"),
    ("list-product", r#"li[class*="product"]"#),
];

static NAME_RUN: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span, div, h2, h3, a")
        .expect("Invalid name run selector")
});

// Text under these never renders as a visible price.
const NON_VISIBLE_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

// How far up from a price text node the name search may climb.
const MAX_ANCESTOR_LEVELS: usize = 3;

#[derive(Debug)]
pub struct StructuralStrategy {
    pub label: String,
    selector: Selector,
}

impl StructuralStrategy {
    pub fn parse(label: &str, selector: &str) -> Result<Self, SetupError> {
        let parsed = Selector::parse(selector).map_err(|e| SetupError::InvalidSelector {
            label: label.to_string(),
            selector: selector.to_string(),
            reason: format!("{:?}", e),
        })?;

        Ok(Self {
            label: label.to_string(),
            selector: parsed,
        })
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

/// Finds speculative product regions on a rendered page.
#[derive(Debug)]
pub struct CandidateLocator {
    strategies: Vec<StructuralStrategy>,
    currency_markers: Vec<String>,
    text_scan_limit: usize,
    min_name_chars: usize,
    max_name_chars: usize,
}

impl CandidateLocator {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, SetupError> {
        let strategies = config
            .structural_strategies
            .iter()
            .map(|s| StructuralStrategy::parse(&s.label, &s.selector))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            strategies,
            currency_markers: config.currency_markers.clone(),
            text_scan_limit: config.text_scan_limit,
            min_name_chars: config.min_name_chars,
            max_name_chars: config.max_name_chars,
        })
    }

    pub fn strategies(&self) -> &[StructuralStrategy] {
        &self.strategies
    }

    /// Human-readable name of the strategy that produced `origin`.
    pub fn origin_label(&self, origin: CandidateOrigin) -> &str {
        match origin {
            CandidateOrigin::Structural(rank) => self
                .strategies
                .get(rank)
                .map(|s| s.label.as_str())
                .unwrap_or("structural"),
            CandidateOrigin::TextScan => "text-scan",
        }
    }

    /// Candidates of the first structural strategy with any match, or the
    /// text-scan fallback when none matches. The iterator is lazy; the
    /// candidates it yields borrow only `document`.
    pub fn locate<'s, 'doc: 's>(
        &'s self,
        document: &'doc Html,
    ) -> Box<dyn Iterator<Item = Candidate<'doc>> + 's> {
        for (rank, strategy) in self.strategies.iter().enumerate() {
            let mut matches = document.select(&strategy.selector).peekable();
            if matches.peek().is_some() {
                info!("Structural strategy '{}' matched", strategy.label);
                return Box::new(matches.map(move |block| Candidate::structural(block, rank)));
            }
            debug!("Structural strategy '{}' found nothing", strategy.label);
        }

        info!("No structural strategy matched, scanning text for currency markers");
        Box::new(self.text_scan(document))
    }

    fn text_scan<'s, 'doc: 's>(
        &'s self,
        document: &'doc Html,
    ) -> impl Iterator<Item = Candidate<'doc>> + 's {
        let mut seen_prices = HashSet::new();

        document
            .root_element()
            .descendants()
            .filter_map(move |node| {
                let text = node.value().as_text()?;
                let parent = node.parent().and_then(ElementRef::wrap)?;
                if NON_VISIBLE_PARENTS.contains(&parent.value().name()) {
                    return None;
                }

                let price_text = clean_text(text);
                if price_text.is_empty() || !has_currency_marker(&price_text, &self.currency_markers) {
                    return None;
                }
                Some((parent, price_text))
            })
            .filter(move |(_, price_text)| seen_prices.insert(price_text.clone()))
            .filter_map(move |(parent, price_text)| match self.nearby_name(parent) {
                Some((scope, name)) => Some(Candidate {
                    block: scope,
                    name_text: Some(name),
                    price_text: Some(price_text),
                    origin: CandidateOrigin::TextScan,
                }),
                None => {
                    debug!("No name found near price text '{}'", price_text);
                    None
                }
            })
            .take(self.text_scan_limit)
    }

    /// First qualifying text run under the price's parent, then its ancestors.
    fn nearby_name<'doc>(&self, start: ElementRef<'doc>) -> Option<(ElementRef<'doc>, String)> {
        std::iter::once(start)
            .chain(start.ancestors().filter_map(ElementRef::wrap))
            .take(MAX_ANCESTOR_LEVELS)
            .find_map(|scope| {
                scope
                    .select(&NAME_RUN)
                    .map(|el| clean_text(&el.text().collect::<String>()))
                    .find(|text| self.is_name_like(text))
                    .map(|name| (scope, truncate_chars(&name, self.max_name_chars)))
            })
    }

    fn is_name_like(&self, text: &str) -> bool {
        text.chars().count() > self.min_name_chars && !has_currency_marker(text, &self.currency_markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn locator() -> CandidateLocator {
        CandidateLocator::from_config(&ExtractionConfig::default()).unwrap()
    }

    fn names(candidates: Vec<Candidate<'_>>) -> Vec<Option<String>> {
        candidates.into_iter().map(|c| c.name_text).collect()
    }

    #[test]
    fn first_matching_strategy_wins_exclusively() {
        let html = Html::parse_document(
            r#"<div class="product-card"><h3>Dolo 650</h3></div>
               <div class="item"><h3>Not used</h3></div>
               <article><h3>Not used either</h3></article>"#,
        );
        let locator = locator();
        let candidates: Vec<_> = locator.locate(&html).collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].origin, CandidateOrigin::Structural(0));
        assert_eq!(locator.origin_label(candidates[0].origin), "product-card");
    }

    #[test]
    fn lower_ranked_strategy_used_when_higher_ones_miss() {
        let html = Html::parse_document(
            r#"<ul><li class="product-tile">A</li><li class="product-tile">B</li></ul>"#,
        );
        let locator = locator();
        let candidates: Vec<_> = locator.locate(&html).collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(locator.origin_label(candidates[0].origin), "list-product");
    }

    #[test]
    fn text_scan_pairs_prices_with_nearby_names() {
        let html = Html::parse_document(
            r#"<main>
                 <section><span>Dolo 650mg Tablet 15's</span><span>₹35.50</span></section>
                 <section><span>Calpol 650mg Tablet</span><span>₹30.00</span></section>
               </main>"#,
        );
        let candidates: Vec<_> = locator().locate(&html).collect();

        assert!(candidates.iter().all(|c| c.origin == CandidateOrigin::TextScan));
        let pairs: Vec<_> = candidates
            .iter()
            .map(|c| (c.name_text.clone().unwrap(), c.price_text.clone().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Dolo 650mg Tablet 15's".to_string(), "₹35.50".to_string()),
                ("Calpol 650mg Tablet".to_string(), "₹30.00".to_string()),
            ]
        );
    }

    #[test]
    fn text_scan_is_capped_and_skips_repeated_prices() {
        let html = Html::parse_document(
            r#"<main>
                 <section><span>Medicine number one</span><span>₹10</span></section>
                 <section><span>Medicine number one</span><span>₹10</span></section>
                 <section><span>Medicine number two</span><span>₹20</span></section>
                 <section><span>Medicine number three</span><span>₹30</span></section>
                 <section><span>Medicine number four</span><span>₹40</span></section>
               </main>"#,
        );
        let candidates: Vec<_> = locator().locate(&html).collect();

        assert_eq!(
            names(candidates),
            vec![
                Some("Medicine number one".to_string()),
                Some("Medicine number two".to_string()),
                Some("Medicine number three".to_string()),
            ]
        );
    }

    #[test]
    fn text_scan_ignores_scripts_and_short_names() {
        let html = Html::parse_document(
            r#"<script>window.state = {"price": "₹99"}</script>
               <p><span>Short</span><span>₹45</span></p>"#,
        );
        assert_eq!(locator().locate(&html).count(), 0);
    }

    #[test]
    fn candidates_outlive_the_locator() {
        let html = Html::parse_document(
            r#"<div><span>Dolo 650mg Tablet 15's</span><span>₹35.50</span></div>"#,
        );
        let candidates: Vec<Candidate<'_>> = {
            let scoped = locator();
            scoped.locate(&html).collect()
        };

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].price_text.as_deref(), Some("₹35.50"));
    }

    #[test]
    fn empty_page_yields_nothing() {
        let html = Html::parse_document("<html><body><p>No results</p></body></html>");
        assert_eq!(locator().locate(&html).count(), 0);
    }

    #[test]
    fn invalid_configured_selector_is_rejected() {
        let mut config = ExtractionConfig::default();
        config.structural_strategies[0].selector = "div[".to_string();

        let err = CandidateLocator::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("product-card"));
    }
}
