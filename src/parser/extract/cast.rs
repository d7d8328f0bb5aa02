use std::sync::LazyLock;

use scraper::Selector;
use tracing::debug;

use crate::parser::{text_of, TitlePage};

static CAST_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"section[data-testid="title-cast"]"#).unwrap());
static CAST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="title-cast-item"]"#).unwrap());
static ACTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[data-testid="title-cast-item__actor"]"#).unwrap());

/// Actor names from the first `limit` cast rows. Rows without an actor link
/// still count against the limit.
pub fn extract(page: &TitlePage, limit: usize) -> Vec<String> {
    let Some(section) = page.find(&CAST_SECTION) else {
        debug!("Cast section not found for {}", page.id());
        return Vec::new();
    };

    let cast: Vec<String> = section
        .select(&CAST_ITEM)
        .take(limit)
        .filter_map(|row| row.select(&ACTOR).next())
        .map(text_of)
        .filter(|name| !name.is_empty())
        .collect();

    debug!("Cast for {}: {}", page.id(), cast.join(", "));
    cast
}
