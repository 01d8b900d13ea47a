//! Candidate discovery and record assembly over a rendered page.
//!
//! Everything here borrows from a parsed `scraper::Html` and is synchronous;
//! the document never crosses an await point.

pub mod aggregator;
pub mod fields;
pub mod locator;

pub use aggregator::{Rejection, ResultAggregator};
pub use fields::FieldExtractor;
pub use locator::{CandidateLocator, StructuralStrategy};

use scraper::ElementRef;

use crate::parsers::clean_text;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    Structural(usize),
    TextScan,
}

/// A speculative product region; nothing in it has been validated yet.
#[derive(Debug, Clone)]
pub struct Candidate<'doc> {
    pub block: ElementRef<'doc>,
    pub name_text: Option<String>,
    pub price_text: Option<String>,
    pub origin: CandidateOrigin,
}

impl<'doc> Candidate<'doc> {
    pub fn structural(block: ElementRef<'doc>, strategy: usize) -> Self {
        Self {
            block,
            name_text: None,
            price_text: None,
            origin: CandidateOrigin::Structural(strategy),
        }
    }

    pub fn scope_text(&self) -> String {
        clean_text(&self.block.text().collect::<String>())
    }
}

/// True when `inner` is `outer` or one of its descendants.
pub(crate) fn contains(outer: ElementRef<'_>, inner: ElementRef<'_>) -> bool {
    outer.id() == inner.id() || inner.ancestors().any(|node| node.id() == outer.id())
}
