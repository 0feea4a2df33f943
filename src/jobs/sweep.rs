//! Sweeps: enrich items earlier runs left unscraped.

use serde::Serialize;
use tracing::{info, warn};

use super::{JobError, JobRunner};
use crate::fetch::PageFetcher;
use crate::models::ItemKind;
use crate::parse::PageParser;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub attempted: u32,
    pub enriched: u32,
    pub failed: u32,
}

impl<F: PageFetcher, P: PageParser> JobRunner<F, P> {
    /// Enrich every unscraped item of `kind`. Items that fail stay unscraped
    /// and are retried by the next sweep.
    pub(crate) async fn sweep(&self, kind: ItemKind) -> Result<SweepReport, JobError> {
        let items = self.harvester.store().unscraped_items(kind)?;
        let mut report = SweepReport::default();

        for item in &items {
            report.attempted += 1;
            match self.harvester.enrich(item).await {
                Ok(_) => report.enriched += 1,
                Err(e) if e.is_item_local() => {
                    report.failed += 1;
                    warn!(item_id = item.id, url = %item.url, "Sweep enrichment failed: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if report.attempted > 0 {
            info!(
                kind = kind.as_str(),
                attempted = report.attempted,
                enriched = report.enriched,
                failed = report.failed,
                "Sweep finished"
            );
        }
        Ok(report)
    }
}
