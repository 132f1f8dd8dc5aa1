//! Poster prefetch: after a catalog load, every poster is pushed through
//! the resize cache so later shuffles do not wait on the upstream host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::util::ImageResizer;

/// URL of the resized poster as served by the `/image` route.
pub fn poster_url(poster: &str, width: u32, quality: u32) -> String {
    format!(
        "/image?url={}&w={}&q={}",
        urlencoding::encode(poster),
        width,
        quality
    )
}

pub fn poster_urls(catalog: &Catalog, width: u32, quality: u32) -> Vec<String> {
    catalog
        .items
        .iter()
        .map(|item| poster_url(&item.poster_url, width, quality))
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchReport {
    pub warmed: usize,
    pub failed: usize,
}

pub struct Prefetcher {
    resizer: Arc<ImageResizer>,
    width: u32,
    quality: u32,
    running: AtomicBool,
}

impl Prefetcher {
    pub fn new(resizer: Arc<ImageResizer>, width: u32, quality: u32) -> Self {
        Self {
            resizer,
            width,
            quality,
            running: AtomicBool::new(false),
        }
    }

    /// Warm the cache for every poster, one at a time.
    pub async fn warm(&self, catalog: &Catalog) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        for item in &catalog.items {
            match self
                .resizer
                .resize_url(&item.poster_url, Some(self.width), None, Some(self.quality))
                .await
            {
                Ok(path) => {
                    debug!("Prefetched poster for {} -> {:?}", item.id, path);
                    report.warmed += 1;
                }
                Err(e) => {
                    warn!("Failed to prefetch poster for {}: {}", item.id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run `warm` in the background. A run already in progress absorbs the
    /// request, and `None` is returned.
    pub fn spawn(self: &Arc<Self>, catalog: Arc<Catalog>) -> Option<JoinHandle<PrefetchReport>> {
        if catalog.is_empty() {
            return None;
        }
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("Poster prefetch already running");
            return None;
        }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let report = this.warm(&catalog).await;
            info!(
                warmed = report.warmed,
                failed = report.failed,
                "Poster prefetch finished"
            );
            this.running.store(false, Ordering::Release);
            report
        }))
    }
}
