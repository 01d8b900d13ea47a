use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::extract::Candidate;
use crate::parsers::{clean_text, has_currency_marker, truncate_chars};

/// One attempt at reading a field from a candidate scope.
pub type FieldStrategy = fn(&FieldExtractor, ElementRef<'_>) -> Option<String>;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid field selector")
}

static HEADING: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3"));
static PRODUCT_NAME_CLASS: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="product-name"]"#));
static TITLE_CLASS: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="title"]"#));
static PRODUCT_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"a[class*="product"]"#));
static MINOR_HEADING: Lazy<Selector> = Lazy::new(|| selector("h4"));
static ANY_LINK: Lazy<Selector> = Lazy::new(|| selector("a"));

static PRICE_SPAN: Lazy<Selector> = Lazy::new(|| selector(r#"span[class*="price"]"#));
static SPAN: Lazy<Selector> = Lazy::new(|| selector("span"));
static PRICE_BOX_SPAN: Lazy<Selector> = Lazy::new(|| selector(r#"div[class*="price"] span"#));

const NAME_CASCADE: &[(&str, FieldStrategy)] = &[
    ("heading", FieldExtractor::heading_name),
    ("product-name class", FieldExtractor::product_name_class),
    ("title class", FieldExtractor::title_class),
    ("product link", FieldExtractor::product_link),
    ("minor heading", FieldExtractor::minor_heading),
    ("any link", FieldExtractor::any_link),
];

const PRICE_CASCADE: &[(&str, FieldStrategy)] = &[
    ("price span", FieldExtractor::price_span),
    ("currency span", FieldExtractor::currency_span),
    ("price box span", FieldExtractor::price_box_span),
    ("currency text", FieldExtractor::currency_text),
];

/// Reads name and raw price strings from inside a candidate's scope.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    currency_markers: Vec<String>,
    max_name_chars: usize,
}

impl FieldExtractor {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            currency_markers: config.currency_markers.clone(),
            max_name_chars: config.max_name_chars,
        }
    }

    pub fn extract_name(&self, candidate: &Candidate<'_>) -> Option<String> {
        if let Some(name) = candidate.name_text.as_ref().filter(|n| !n.is_empty()) {
            return Some(name.clone());
        }
        self.first_success(candidate.block, NAME_CASCADE, "name")
            .map(|name| truncate_chars(&name, self.max_name_chars))
    }

    pub fn extract_price(&self, candidate: &Candidate<'_>) -> Option<String> {
        if let Some(price) = candidate.price_text.as_ref().filter(|p| !p.is_empty()) {
            return Some(price.clone());
        }
        self.first_success(candidate.block, PRICE_CASCADE, "price")
    }

    fn first_success(
        &self,
        scope: ElementRef<'_>,
        cascade: &[(&str, FieldStrategy)],
        field: &str,
    ) -> Option<String> {
        cascade.iter().find_map(|(label, strategy)| {
            let value = strategy(self, scope);
            if value.is_some() {
                debug!("{} found by '{}' strategy", field, label);
            }
            value
        })
    }

    fn heading_name(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &HEADING, |_| true)
    }

    fn product_name_class(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &PRODUCT_NAME_CLASS, |_| true)
    }

    fn title_class(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &TITLE_CLASS, |_| true)
    }

    fn product_link(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &PRODUCT_LINK, |_| true)
    }

    fn minor_heading(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &MINOR_HEADING, |_| true)
    }

    fn any_link(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &ANY_LINK, |text| !self.has_marker(text))
    }

    fn price_span(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &PRICE_SPAN, has_digit)
    }

    fn currency_span(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &SPAN, |text| self.has_marker(text) && has_digit(text))
    }

    fn price_box_span(&self, scope: ElementRef<'_>) -> Option<String> {
        first_text(scope, &PRICE_BOX_SPAN, has_digit)
    }

    fn currency_text(&self, scope: ElementRef<'_>) -> Option<String> {
        scope
            .descendants()
            .filter_map(|node| node.value().as_text().map(|text| clean_text(text)))
            .find(|text| self.has_marker(text) && has_digit(text))
    }

    fn has_marker(&self, text: &str) -> bool {
        has_currency_marker(text, &self.currency_markers)
    }
}

fn first_text(scope: ElementRef<'_>, selector: &Selector, accept: impl Fn(&str) -> bool) -> Option<String> {
    scope
        .select(selector)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .find(|text| !text.is_empty() && accept(text))
}

fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}
