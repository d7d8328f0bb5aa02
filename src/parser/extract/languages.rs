use std::sync::LazyLock;

use scraper::Selector;
use tracing::debug;

use super::{label_of, LINK};
use crate::parser::{texts_under, TitlePage};

static DETAILS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"section[data-testid="Details"]"#).unwrap());
static ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

pub fn extract(page: &TitlePage) -> Vec<String> {
    let Some(details) = page.find(&DETAILS) else {
        debug!("Details section not found for {}", page.id());
        return Vec::new();
    };

    let languages: Vec<String> = details
        .select(&ITEM)
        .filter(|li| label_of(*li).is_some_and(|l| l.contains("Language")))
        .flat_map(|li| texts_under(li, &LINK))
        .collect();

    debug!("Languages for {}: {}", page.id(), languages.join(", "));
    languages
}
