use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::badges::{BadgeExtractor, Renderer};
use crate::certification::CertificationFetcher;
use crate::config::{title_url, Settings};
use crate::error::{EnrichError, FetchError};
use crate::fetcher::PageFetcher;
use crate::pacing::Delay;
use crate::parser::extract::extract_all;
use crate::record::{TitleRecord, CERTIFICATION_COLUMN, ENRICHED_COLUMNS, NOT_RATED};
use crate::table::Table;

/// What to do with a row whose document could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep the row with empty document fields and move on.
    #[default]
    Continue,
    /// Stop the whole run with the fetch error.
    Abort,
}

/// Per-pass counters. For the certification pass `errors` counts titles
/// left "Not Rated".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

pub struct Enricher {
    base_url: String,
    id_column: String,
    cast_limit: usize,
    after_row: Duration,
    fetcher: PageFetcher,
    certifier: CertificationFetcher,
    badges: Option<BadgeExtractor>,
    delay: Arc<dyn Delay>,
    policy: FailurePolicy,
}

impl Enricher {
    /// `renderer: None` skips badge extraction; the badge column stays empty.
    pub fn new(
        settings: &Settings,
        renderer: Option<Arc<dyn Renderer>>,
        delay: Arc<dyn Delay>,
        policy: FailurePolicy,
    ) -> Result<Self, reqwest::Error> {
        Ok(Enricher {
            base_url: settings.base_url.clone(),
            id_column: settings.id_column.clone(),
            cast_limit: settings.cast_limit,
            after_row: settings.pacing.after_row(),
            fetcher: PageFetcher::new(settings, delay.clone())?,
            certifier: CertificationFetcher::new(settings)?,
            badges: renderer.map(|r| BadgeExtractor::new(settings, r, delay.clone())),
            delay,
            policy,
        })
    }

    /// Pass one: document fields and badges for every row, in row order.
    pub async fn enrich_table(&self, mut table: Table) -> Result<(Table, PassStats), EnrichError> {
        let col = table.column(&self.id_column)?;
        let ids = table.values(col);
        let total = ids.len();
        let mut stats = PassStats { total, ..Default::default() };
        let mut records = Vec::with_capacity(total);

        let pb = progress_bar(total);
        for (idx, id) in ids.iter().enumerate() {
            pb.suspend(|| info!("Processing {}/{}: {}", idx + 1, total, id));
            let (record, fetched) = match self.enrich_row(id, &pb).await {
                Ok(row) => row,
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.into());
                }
            };
            if fetched {
                stats.ok += 1;
            } else {
                stats.errors += 1;
            }
            pb.suspend(|| {
                info!(
                    "{} | Genre: {} | Directors: {} | StreamingLogo: {} badge(s)",
                    id,
                    record.genres.join(", "),
                    record.directors.join(", "),
                    record.streaming_badges.len()
                )
            });
            records.push(record);

            pb.inc(1);
            self.delay.wait(self.after_row).await;
        }
        pb.finish_and_clear();

        let cells: Vec<[String; 8]> = records.iter().map(TitleRecord::enriched_cells).collect();
        for (i, name) in ENRICHED_COLUMNS.iter().enumerate() {
            table.set_column(name, cells.iter().map(|c| c[i].clone()).collect());
        }

        info!("Enriched {} titles ({} ok, {} fetch errors)", stats.total, stats.ok, stats.errors);
        Ok((table, stats))
    }

    /// Pass two: certification for every row, in row order.
    pub async fn certify_table(&self, mut table: Table) -> Result<(Table, PassStats), EnrichError> {
        let col = table.column(&self.id_column)?;
        let ids = table.values(col);
        let total = ids.len();
        let mut stats = PassStats { total, ..Default::default() };
        let mut certifications = Vec::with_capacity(total);

        let pb = progress_bar(total);
        for (idx, id) in ids.iter().enumerate() {
            pb.suspend(|| info!("Processing {}/{}: {}", idx + 1, total, id));
            let cert = self.certifier.get(id).await;
            if cert == NOT_RATED {
                stats.errors += 1;
            } else {
                stats.ok += 1;
            }
            pb.suspend(|| info!("{} | Certification: {}", id, cert));
            certifications.push(cert);

            pb.inc(1);
            self.delay.wait(self.after_row).await;
        }
        pb.finish_and_clear();

        table.set_column(CERTIFICATION_COLUMN, certifications);
        info!("Certified {} titles ({} rated, {} not rated)", stats.total, stats.ok, stats.errors);
        Ok((table, stats))
    }

    /// Everything for a single title, certification included. A failed
    /// document fetch is an error here whatever the policy.
    pub async fn enrich_title(&self, id: &str) -> Result<TitleRecord, EnrichError> {
        let page = self.fetcher.fetch(id).await?;
        let fields = extract_all(&page, self.cast_limit);
        drop(page);

        let mut record = TitleRecord::new(id, title_url(&self.base_url, id)).with_fields(fields);
        if let Some(badges) = &self.badges {
            record.streaming_badges = badges.extract_badges(id).await;
        }
        record.certification = self.certifier.get(id).await;
        Ok(record)
    }

    /// One pass-one row. `Ok((record, false))` means the document fetch
    /// failed and the row carries defaults for document fields.
    async fn enrich_row(&self, id: &str, pb: &ProgressBar) -> Result<(TitleRecord, bool), FetchError> {
        let mut record = TitleRecord::new(id, title_url(&self.base_url, id));

        let fetched = match self.fetcher.fetch(id).await {
            Ok(page) => {
                record = record.with_fields(extract_all(&page, self.cast_limit));
                true
            }
            Err(e) if self.policy == FailurePolicy::Abort => return Err(e),
            Err(e) => {
                pb.suspend(|| {
                    warn!(
                        "Keeping {} with empty fields after {} attempt(s): {}",
                        id,
                        e.attempts(),
                        e
                    )
                });
                false
            }
        };

        if let Some(badges) = &self.badges {
            record.streaming_badges = badges.extract_badges(id).await;
        }
        Ok((record, fetched))
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}
