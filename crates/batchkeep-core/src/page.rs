//! Page records written to result segments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Kind of page, derived from title markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageType {
    /// Ordinary article.
    Regular,
    /// Project namespace page.
    Wikipedia,
    /// Template page.
    Template,
    /// Category page.
    Category,
    /// Portal page.
    Portal,
    /// Template talk page.
    Talk,
}

/// Title markers checked in order; the first match decides.
const TYPE_MARKERS: [(&str, PageType); 5] = [
    ("Wikipedia", PageType::Wikipedia),
    ("Sjabloon", PageType::Template),
    ("Categorie", PageType::Category),
    ("Portaal", PageType::Portal),
    ("Overleg sjabloon", PageType::Talk),
];

impl PageType {
    /// Classify a page by its title.
    #[must_use]
    pub fn classify(title: &str) -> Self {
        TYPE_MARKERS
            .iter()
            .find(|(marker, _)| title.contains(marker))
            .map_or(Self::Regular, |&(_, kind)| kind)
    }

    /// Upper-case tag used in result lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::Wikipedia => "WIKIPEDIA",
            Self::Template => "TEMPLATE",
            Self::Category => "CATEGORY",
            Self::Portal => "PORTAL",
            Self::Talk => "TALK",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One crawled page as stored in a result segment.
///
/// Serializes to `{"title", "exists", "type"?, "num_links", "links"}`;
/// `type` is omitted for pages that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page title, also the ledger key.
    pub title: String,
    /// Whether the page exists.
    pub exists: bool,
    /// Derived page kind; only set for existing pages.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub page_type: Option<PageType>,
    /// Number of outgoing links, `None` when there are none.
    pub num_links: Option<usize>,
    /// Outgoing link titles.
    pub links: Option<Vec<String>>,
}

impl PageRecord {
    /// Build a record, deriving type and link count.
    #[must_use]
    pub fn new(title: impl Into<String>, exists: bool, links: Option<Vec<String>>) -> Self {
        let title = title.into();
        let (page_type, num_links) = if exists {
            let count = links.as_ref().map(Vec::len).filter(|&n| n > 0);
            (Some(PageType::classify(&title)), count)
        } else {
            (None, None)
        };

        Self {
            title,
            exists,
            page_type,
            num_links,
            links,
        }
    }

    /// Record for a page that does not exist.
    #[must_use]
    pub fn missing(title: impl Into<String>) -> Self {
        Self::new(title, false, None)
    }

    /// Title as it appears in a URL path.
    #[must_use]
    pub fn url_title(&self) -> String {
        self.title.replace(' ', "_")
    }

    /// Serialize as one JSON line without the trailing newline.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for PageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.page_type, self.num_links) {
            (Some(kind), Some(n)) => write!(f, "{} [{kind}, {n} links]", self.title),
            (Some(kind), None) => write!(f, "{} [{kind}]", self.title),
            _ => write!(f, "{} [missing]", self.title),
        }
    }
}
