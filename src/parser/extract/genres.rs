use std::sync::LazyLock;

use scraper::Selector;
use tracing::debug;

use crate::parser::{texts_under, TitlePage};

static INTERESTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="interests"]"#).unwrap());
static CHIP: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.ipc-chip__text").unwrap());

pub fn extract(page: &TitlePage) -> Vec<String> {
    let Some(section) = page.find(&INTERESTS) else {
        debug!("Genres section not found for {}", page.id());
        return Vec::new();
    };

    let genres = texts_under(section, &CHIP);
    debug!("Genres for {}: {}", page.id(), genres.join(", "));
    genres
}
