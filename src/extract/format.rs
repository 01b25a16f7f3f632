// src/extract/format.rs

use anyhow::Result;
use calamine::{open_workbook_auto_from_rs, Reader, Sheets, Xls, Xlsx};
use std::io::Cursor;
use tracing::debug;

/// OLE2 compound-document signature carried by legacy `.xls` workbooks.
const OLE2_MAGIC: [u8; 8] = [0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];

/// Binary encoding of a spreadsheet blob, judged from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Legacy OLE2 binary workbook.
    Xls,
    /// Zip-container workbook.
    Xlsx,
    Unknown,
}

pub fn detect(data: &[u8]) -> SheetFormat {
    if data.len() < 8 {
        return SheetFormat::Unknown;
    }
    if data.starts_with(b"PK") {
        SheetFormat::Xlsx
    } else if data[..8] == OLE2_MAGIC {
        SheetFormat::Xls
    } else {
        SheetFormat::Unknown
    }
}

/// Open a workbook with the backend the signature selects; if that backend
/// refuses the blob, fall back to auto-detection exactly once. Unknown
/// signatures go straight to auto-detection.
pub fn open_workbook(data: &[u8]) -> Result<Sheets<Cursor<&[u8]>>> {
    let detected = detect(data);
    match detected {
        SheetFormat::Xlsx => match Xlsx::new(Cursor::new(data)) {
            Ok(wb) => Ok(Sheets::Xlsx(wb)),
            Err(e) => {
                debug!(format = ?detected, error = %e, "detected backend failed, auto-detecting");
                Ok(open_workbook_auto_from_rs(Cursor::new(data))?)
            }
        },
        SheetFormat::Xls => match Xls::new(Cursor::new(data)) {
            Ok(wb) => Ok(Sheets::Xls(wb)),
            Err(e) => {
                debug!(format = ?detected, error = %e, "detected backend failed, auto-detecting");
                Ok(open_workbook_auto_from_rs(Cursor::new(data))?)
            }
        },
        SheetFormat::Unknown => Ok(open_workbook_auto_from_rs(Cursor::new(data))?),
    }
}
