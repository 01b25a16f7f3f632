// src/fetch.rs

use crate::model::SeriesType;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use std::future::Future;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Free-user download endpoint of the trade statistics portal.
pub const PORTAL_URL: &str = "https://ftddp.dgciskol.gov.in/dgcis/freeuserDownload";

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Month token used by the portal's date pickers, e.g. `Nov-2021`.
pub fn month_token(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b-%Y").to_string())
        .unwrap_or_else(|| format!("{:02}-{}", month, year))
}

/// `PK\x03\x04` prefix check plus a full central-directory parse. The portal
/// answers some out-of-range months with an HTML error page and HTTP 200, so
/// status alone proves nothing.
pub fn is_well_formed_archive(bytes: &[u8]) -> bool {
    bytes.len() >= 4
        && bytes.starts_with(b"PK")
        && ZipArchive::new(Cursor::new(bytes)).is_ok()
}

/// One bounded fetch per `(year, month, series)`. `None` means "no archive
/// for this month", whatever the underlying reason; the crawler counts it
/// against the series' failure streak.
pub trait ArchiveSource {
    fn fetch_month(
        &self,
        year: i32,
        month: u32,
        series: SeriesType,
    ) -> impl Future<Output = Option<Vec<u8>>> + Send;
}

/// Live portal client.
pub struct HttpArchiveSource {
    client: Client,
}

impl HttpArchiveSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

impl ArchiveSource for HttpArchiveSource {
    async fn fetch_month(&self, year: i32, month: u32, series: SeriesType) -> Option<Vec<u8>> {
        let token = month_token(year, month);
        debug!(series = %series, month = %token, "fetching");

        // The portal wants the month repeated in both datepicker fields, plus
        // fixed selectors for all commodities/countries/ports in INR+USD.
        let query = [
            ("eximp", series.discriminator().to_string()),
            ("datepicker", token.clone()),
            ("datepicker1", token.clone()),
            ("commodities", "A".to_string()),
            ("countries", "A".to_string()),
            ("type", "10".to_string()),
            ("ports", "A".to_string()),
            ("regions", "undefined".to_string()),
            ("sorted", "Order By HS_CODE,CTY,Value DESC".to_string()),
            ("currency", "B".to_string()),
            ("reg", "2".to_string()),
        ];

        let response = match self.client.get(PORTAL_URL).query(&query).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(series = %series, month = %token, error = %e, "request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(series = %series, month = %token, status = %response.status(), "fetch rejected");
            return None;
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(series = %series, month = %token, error = %e, "reading body failed");
                return None;
            }
        };

        if bytes.len() < 4 {
            warn!(series = %series, month = %token, "empty response");
            return None;
        }
        if !bytes.starts_with(b"PK") {
            warn!(series = %series, month = %token, "response is not a zip file");
            return None;
        }
        if ZipArchive::new(Cursor::new(&bytes[..])).is_err() {
            warn!(series = %series, month = %token, "response is a corrupt zip file");
            return None;
        }

        Some(bytes.to_vec())
    }
}
