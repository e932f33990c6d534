//! Priority-ordered extraction probes over a render-tree snapshot
//!
//! A probe is one structural query. The pipeline short-circuits at the
//! first probe yielding matches; when every probe misses it falls back to
//! locating category links and synthesizing element groups from their
//! nearest sufficiently-large ancestor container. Field parsing failures
//! skip the record, never the batch.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::domain::constants::{MIN_CONTAINER_DESCENDANTS, MIN_CONTAINER_TEXT_LEN};
use crate::domain::EntityRecord;
use crate::error::{EngineError, ParseFailure};

use super::parse;

/// Configuration for one page layout: the probe cascade plus the link
/// vocabulary identifying the target category. Extraction rules are
/// configuration, not engine logic; these defaults exist for tests and as
/// a template.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    /// Structural queries in priority order.
    pub container_selectors: Vec<String>,
    /// Path fragment that marks a link as pointing at a target entity,
    /// e.g. "/groups/".
    pub link_path_fragment: String,
    /// Base used to resolve relative hrefs into `source_url`.
    pub base_url: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            container_selectors: vec![
                r#"div[role="article"]"#.to_string(),
                r#"[data-testid="entity-card"]"#.to_string(),
                ".group-list-item".to_string(),
                "li.discovery-card".to_string(),
            ],
            link_path_fragment: "/groups/".to_string(),
            base_url: "https://social.example".to_string(),
        }
    }
}

struct Probe {
    raw: String,
    selector: Selector,
}

/// Compiled probe cascade. Pure: reads the snapshot, mutates nothing.
pub struct ExtractionPipeline {
    probes: Vec<Probe>,
    anchor_selector: Selector,
    heading_selector: Selector,
    rules: ExtractionRules,
}

impl ExtractionPipeline {
    /// Compiles the configured selectors. Individually invalid selectors
    /// are skipped with a warning; construction fails only when none
    /// compile.
    pub fn new(rules: ExtractionRules) -> Result<Self, EngineError> {
        let mut probes = Vec::new();
        let mut errors = Vec::new();
        for raw in &rules.container_selectors {
            match Selector::parse(raw) {
                Ok(selector) => probes.push(Probe {
                    raw: raw.clone(),
                    selector,
                }),
                Err(e) => {
                    warn!(selector = %raw, "skipping uncompilable probe selector: {e}");
                    errors.push(format!("'{raw}': {e}"));
                }
            }
        }
        if probes.is_empty() {
            return Err(EngineError::NoProbes(errors.join(", ")));
        }

        let anchor_selector = Selector::parse("a[href]")
            .map_err(|e| EngineError::NoProbes(e.to_string()))?;
        let heading_selector = Selector::parse("h1, h2, h3, h4, h5, h6")
            .map_err(|e| EngineError::NoProbes(e.to_string()))?;

        Ok(Self {
            probes,
            anchor_selector,
            heading_selector,
            rules,
        })
    }

    /// Runs the cascade against one snapshot and returns every candidate
    /// record that parsed.
    pub fn extract(&self, html: &Html) -> Vec<EntityRecord> {
        let containers = {
            let primary = self.probe_containers(html);
            if primary.is_empty() {
                self.fallback_containers(html)
            } else {
                primary
            }
        };

        let mut records = Vec::new();
        for container in containers {
            match self.record_from(container) {
                Ok(record) => records.push(record),
                Err(e) => debug!("skipping element group: {e}"),
            }
        }
        records
    }

    /// First probe with one or more matches wins.
    fn probe_containers<'a>(&self, html: &'a Html) -> Vec<ElementRef<'a>> {
        for probe in &self.probes {
            let matches: Vec<ElementRef<'a>> = html.select(&probe.selector).collect();
            if !matches.is_empty() {
                debug!(
                    selector = %probe.raw,
                    count = matches.len(),
                    "probe matched"
                );
                return matches;
            }
        }
        Vec::new()
    }

    /// Fallback: synthesize element groups from category links. Each link
    /// climbs to its nearest sufficiently-large ancestor; ancestors that
    /// contain another synthesized container are dropped (keep the
    /// innermost, the outer one is a feed wrapper).
    fn fallback_containers<'a>(&self, html: &'a Html) -> Vec<ElementRef<'a>> {
        let mut picked: Vec<ElementRef<'a>> = Vec::new();
        let mut seen = HashSet::new();

        for anchor in html.select(&self.anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.contains(&self.rules.link_path_fragment) {
                continue;
            }
            let container = anchor
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(Self::is_sufficiently_large);
            if let Some(el) = container {
                if seen.insert(el.id()) {
                    picked.push(el);
                }
            }
        }

        // Innermost-only dedupe across distinct links.
        let ids: Vec<_> = picked.iter().map(|el| el.id()).collect();
        picked
            .into_iter()
            .filter(|el| {
                // Drop `el` if another picked container lives inside it.
                !ids.iter().any(|other| {
                    *other != el.id()
                        && html
                            .tree
                            .get(*other)
                            .map(|node| node.ancestors().any(|a| a.id() == el.id()))
                            .unwrap_or(false)
                })
            })
            .collect()
    }

    /// Size heuristic for a detached snapshot: text mass and descendant
    /// count stand in for bounding boxes.
    fn is_sufficiently_large(el: &ElementRef<'_>) -> bool {
        let text_len: usize = el.text().map(str::len).sum();
        if text_len < MIN_CONTAINER_TEXT_LEN {
            return false;
        }
        let descendants = el
            .descendants()
            .filter(|node| node.value().is_element())
            .count();
        descendants >= MIN_CONTAINER_DESCENDANTS
    }

    /// Parses one element group into a candidate record.
    fn record_from(&self, container: ElementRef<'_>) -> Result<EntityRecord, ParseFailure> {
        let fragment = &self.rules.link_path_fragment;

        let mut id = None;
        let mut href = None;
        let mut link_text = None;
        for anchor in container.select(&self.anchor_selector) {
            let Some(raw_href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(candidate) = parse::canonical_id(raw_href, fragment) {
                id = Some(candidate);
                href = Some(raw_href.to_string());
                let text = anchor.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    link_text = Some(text);
                }
                break;
            }
        }
        let id = id.ok_or(ParseFailure::MissingIdentifier)?;

        let display_name = link_text
            .or_else(|| {
                container
                    .select(&self.heading_selector)
                    .map(|h| h.text().collect::<String>().trim().to_string())
                    .find(|t| !t.is_empty())
            })
            .unwrap_or_else(|| id.clone());

        let group_text = container.text().collect::<Vec<_>>().join(" ");
        let scale = parse::parse_scale(&group_text).unwrap_or(0);

        let source_url = href
            .as_deref()
            .map(|h| self.resolve_url(h))
            .unwrap_or_default();

        Ok(EntityRecord {
            category: parse::detect_category(&group_text),
            activity: parse::estimate_activity(&group_text, scale),
            discovered_at: chrono::Utc::now(),
            id,
            display_name,
            source_url,
            scale,
        })
    }

    fn resolve_url(&self, href: &str) -> String {
        if let Ok(absolute) = url::Url::parse(href) {
            return absolute.to_string();
        }
        url::Url::parse(&self.rules.base_url)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}
