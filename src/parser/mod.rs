pub mod extract;

use scraper::{ElementRef, Html, Selector};

/// A fetched title document. Built once per row and only ever read.
pub struct TitlePage {
    id: String,
    html: Html,
}

impl TitlePage {
    pub fn parse(id: &str, body: &str) -> Self {
        TitlePage {
            id: id.to_string(),
            html: Html::parse_document(body),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// First element matching `selector`, in document order.
    pub fn find(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    pub fn find_all<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> {
        self.html.select(selector)
    }
}

/// Element text with whitespace runs collapsed, like a browser's innerText.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty text of every `selector` match under `scope`.
pub fn texts_under(scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    scope
        .select(selector)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect()
}
