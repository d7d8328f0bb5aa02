use serde::Serialize;

use crate::parser::extract::StaticFields;

pub const URL_COLUMN: &str = "IMDB URL";
pub const CERTIFICATION_COLUMN: &str = "Certification";
pub const NOT_RATED: &str = "Not Rated";

/// Pass-one columns, in the order they are appended.
pub const ENRICHED_COLUMNS: [&str; 8] = [
    URL_COLUMN,
    "Genre",
    "Languages",
    "Directors",
    "Writers",
    "Cast",
    "Poster",
    "StreamingLogo",
];

const TEXT_SEPARATOR: &str = ", ";
const URL_SEPARATOR: &str = " | ";

/// Everything gathered for one title. Absent data is empty, never missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TitleRecord {
    pub id: String,
    pub url: String,
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub directors: Vec<String>,
    pub writers: Vec<String>,
    pub cast: Vec<String>,
    pub poster_url: String,
    pub streaming_badges: Vec<String>,
    pub certification: String,
}

impl TitleRecord {
    pub fn new(id: &str, url: String) -> Self {
        TitleRecord {
            id: id.to_string(),
            url,
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: StaticFields) -> Self {
        self.genres = fields.genres;
        self.languages = fields.languages;
        self.directors = fields.directors;
        self.writers = fields.writers;
        self.cast = fields.cast;
        self.poster_url = fields.poster_url;
        self
    }

    /// Cell values lined up with [`ENRICHED_COLUMNS`].
    pub fn enriched_cells(&self) -> [String; 8] {
        [
            self.url.clone(),
            self.genres.join(TEXT_SEPARATOR),
            self.languages.join(TEXT_SEPARATOR),
            self.directors.join(TEXT_SEPARATOR),
            self.writers.join(TEXT_SEPARATOR),
            self.cast.join(TEXT_SEPARATOR),
            self.poster_url.clone(),
            self.streaming_badges.join(URL_SEPARATOR),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_serializes_to_empty_cells() {
        let r = TitleRecord::new("tt1", "https://www.imdb.com/title/tt1/".into());
        let cells = r.enriched_cells();
        assert_eq!(cells[0], "https://www.imdb.com/title/tt1/");
        assert!(cells[1..].iter().all(String::is_empty));
    }

    #[test]
    fn lists_use_their_separators() {
        let mut r = TitleRecord::new("tt1", String::new());
        r.genres = vec!["Drama".into(), "Crime".into()];
        r.streaming_badges = vec!["https://a/1.png".into(), "https://a/2.png".into()];
        let cells = r.enriched_cells();
        assert_eq!(cells[1], "Drama, Crime");
        assert_eq!(cells[7], "https://a/1.png | https://a/2.png");
    }
}
