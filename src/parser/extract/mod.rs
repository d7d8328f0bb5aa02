pub mod cast;
pub mod credits;
pub mod genres;
pub mod languages;
pub mod poster;

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{text_of, TitlePage};

pub(crate) static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.ipc-metadata-list-item__label").unwrap());

/// Everything the static document yields for one title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticFields {
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub directors: Vec<String>,
    pub writers: Vec<String>,
    pub cast: Vec<String>,
    pub poster_url: String,
}

pub fn extract_all(page: &TitlePage, cast_limit: usize) -> StaticFields {
    StaticFields {
        genres: genres::extract(page),
        languages: languages::extract(page),
        directors: credits::directors(page),
        writers: credits::writers(page),
        cast: cast::extract(page, cast_limit),
        poster_url: poster::extract(page),
    }
}

/// Label text of a metadata list item, if it has one.
fn label_of(item: ElementRef<'_>) -> Option<String> {
    item.select(&LABEL).next().map(text_of)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page(fixture: &str) -> TitlePage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        TitlePage::parse(fixture, &html)
    }

    #[test]
    fn full_title_genres() {
        let p = page("title_full");
        assert_eq!(genres::extract(&p), vec!["Epic", "Period Drama", "Drama"]);
    }

    #[test]
    fn full_title_languages() {
        let p = page("title_full");
        assert_eq!(languages::extract(&p), vec!["English", "Spanish"]);
    }

    #[test]
    fn full_title_credits() {
        let p = page("title_full");
        assert_eq!(credits::directors(&p), vec!["Frank Darabont"]);
        assert_eq!(credits::writers(&p), vec!["Stephen King", "Frank Darabont"]);
    }

    #[test]
    fn cast_respects_limit_and_skips_rows_without_actor() {
        let p = page("title_full");
        // Third row has no actor link, so five rows give four names.
        assert_eq!(
            cast::extract(&p, 5),
            vec!["Tim Robbins", "Morgan Freeman", "William Sadler", "Clancy Brown"]
        );
        assert_eq!(cast::extract(&p, 2), vec!["Tim Robbins", "Morgan Freeman"]);
        assert!(cast::extract(&p, 0).is_empty());
    }

    #[test]
    fn full_title_poster_is_full_size() {
        let p = page("title_full");
        assert_eq!(
            poster::extract(&p),
            "https://m.media-amazon.com/images/M/MV5BMDAyY2FhYjctNDc5OS00MDNlLThiMGUtY2UxYWVkNGY2ZjljXkEyXkFqcGc@.jpg"
        );
    }

    #[test]
    fn sparse_title_defaults_everywhere() {
        let p = page("title_sparse");
        let fields = extract_all(&p, 5);
        assert_eq!(fields, StaticFields::default());
    }

    #[test]
    fn empty_document_never_panics() {
        let p = TitlePage::parse("tt0", "");
        assert_eq!(extract_all(&p, 5), StaticFields::default());
    }
}
