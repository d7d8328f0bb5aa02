use std::sync::LazyLock;

use scraper::Selector;
use tracing::debug;

use super::{label_of, LINK};
use crate::parser::{texts_under, TitlePage};

static PRINCIPAL_CREDIT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"li[data-testid="title-pc-principal-credit"]"#).unwrap());

pub fn directors(page: &TitlePage) -> Vec<String> {
    let names = names_for(page, "Director");
    debug!("Directors for {}: {}", page.id(), names.join(", "));
    names
}

/// "Writer" also covers the plural "Writers" label.
pub fn writers(page: &TitlePage) -> Vec<String> {
    let names = names_for(page, "Writer");
    debug!("Writers for {}: {}", page.id(), names.join(", "));
    names
}

/// Link texts of every principal-credit row whose label contains `role`.
fn names_for(page: &TitlePage, role: &str) -> Vec<String> {
    page.find_all(&PRINCIPAL_CREDIT)
        .filter(|li| label_of(*li).is_some_and(|l| l.contains(role)))
        .flat_map(|li| texts_under(li, &LINK))
        .collect()
}
