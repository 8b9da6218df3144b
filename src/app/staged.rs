use std::path::PathBuf;

use crate::constants::EMPLOYEE_KEY;
use crate::domain::Domain;
use crate::error::{EtlError, Result};
use crate::pipeline::frame::Frame;
use crate::pipeline::layout::{extract_date_of, DataLayout};
use crate::pipeline::locator::BatchLocator;

/// A dataset read back from the staging area.
#[derive(Debug, Clone)]
pub struct StagedBatch {
    pub extract_date: String,
    pub path: PathBuf,
    pub frame: Frame,
}

fn batch_date(batch_dir: &std::path::Path) -> Result<String> {
    extract_date_of(batch_dir)
        .ok_or_else(|| EtlError::not_found("extract date folder name", batch_dir))
}

fn read_staged(extract_date: String, path: PathBuf) -> Result<StagedBatch> {
    if !path.is_file() {
        return Err(EtlError::not_found("staged dataset", &path));
    }
    let frame = Frame::read_csv_typed(&path, &[EMPLOYEE_KEY])?;
    Ok(StagedBatch {
        extract_date,
        path,
        frame,
    })
}

/// Latest cleaned batch of `domain`, typed, with a text `employee_id`.
pub fn latest_cleaned(layout: &DataLayout, locator: &BatchLocator, domain: Domain) -> Result<StagedBatch> {
    let batch_dir = locator.latest_batch_dir(&layout.staging_domain_dir(domain))?;
    let extract_date = batch_date(&batch_dir)?;
    let path = layout.cleaned_file(domain, &extract_date);
    read_staged(extract_date, path)
}

/// Latest master dataset.
pub fn latest_master(layout: &DataLayout, locator: &BatchLocator) -> Result<StagedBatch> {
    let batch_dir = locator.latest_batch_dir(&layout.master_dir())?;
    let extract_date = batch_date(&batch_dir)?;
    let path = layout.master_file(&extract_date);
    read_staged(extract_date, path)
}
