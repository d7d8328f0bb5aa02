use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use tracing::debug;

use crate::parser::TitlePage;

static POSTER_IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="hero-media__poster"] img"#).unwrap());
// Resize / crop / quality modifiers the image CDN appends to file names.
static MODIFIER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(?:QL|UX|UY|SX|SY)\d").unwrap());

pub fn extract(page: &TitlePage) -> String {
    let Some(img) = page.find(&POSTER_IMG) else {
        debug!("Poster not found for {}", page.id());
        return String::new();
    };

    let src = img.value().attr("src").unwrap_or_default().trim();
    let url = full_size(src);
    debug!("Poster URL for {}: {}", page.id(), url);
    url
}

/// Drop the CDN modifier chain so the original-resolution image is served:
/// `.../M/xyz_QL75_UY281_.jpg` becomes `.../M/xyz.jpg`.
pub fn full_size(src: &str) -> String {
    let name_start = src.rfind('/').map_or(0, |i| i + 1);
    let Some(m) = MODIFIER_RE.find(&src[name_start..]) else {
        return src.to_string();
    };

    let base = src[..name_start + m.start()].trim_end_matches('_');
    let base = base.strip_suffix("._V1").unwrap_or(base);
    format!("{}.jpg", base)
}
