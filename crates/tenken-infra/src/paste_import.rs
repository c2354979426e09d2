//! Checklist import from pasted text or a local file
//!
//! One vehicle per line: `station, model, plate` separated by tabs or commas
//! (a spreadsheet copy pastes as tabs). Lines without a station are skipped.
//! Files may be UTF-8 or CP932 (Shift-JIS).

use std::fs;
use std::path::Path;

use encoding_rs::SHIFT_JIS;
use tracing::warn;

use tenken_types::{Error, Result, VehicleRecord};

fn is_header(fields: &[&str]) -> bool {
    fields.iter().any(|h| {
        let lower = h.to_lowercase();
        lower == "station"
            || lower == "plate"
            || lower == "model"
            || h.contains("ステーション")
            || h.contains("ナンバー")
            || h.contains("車種")
    })
}

/// Parse pasted checklist text
pub fn parse_pasted(text: &str) -> Vec<VehicleRecord> {
    let mut records = Vec::new();
    for (line_no, line) in text.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
        let fields: Vec<&str> = line.split(['\t', ',']).map(str::trim).collect();
        if line_no == 0 && is_header(&fields) {
            continue;
        }
        let station = fields.first().copied().unwrap_or("");
        if station.is_empty() {
            continue;
        }
        records.push(VehicleRecord {
            station: station.to_string(),
            model: fields.get(1).copied().unwrap_or("").to_string(),
            plate: fields.get(2).copied().unwrap_or("").to_string(),
            ..Default::default()
        });
    }
    records
}

/// Decode file bytes: UTF-8 (BOM tolerated), otherwise CP932
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = SHIFT_JIS.decode(bytes);
            if had_errors {
                warn!("Some characters could not be decoded from CP932");
            }
            decoded.into_owned()
        }
    }
}

/// Load a checklist file
pub fn load_file(path: &Path) -> Result<Vec<VehicleRecord>> {
    let bytes = fs::read(path)
        .map_err(|e| Error::Import(format!("Failed to read {}: {}", path.display(), e)))?;
    let records = parse_pasted(&decode_text(&bytes));
    if records.is_empty() {
        return Err(Error::Import(format!("No rows found in {}", path.display())));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tabs_and_commas() {
        let text = "A駅\tプリウス\t111\nB駅,アクア,222\n\n  \nC駅\n";
        let records = parse_pasted(text);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].model, "プリウス");
        assert_eq!(records[1].plate, "222");
        assert_eq!(records[2].station, "C駅");
        assert_eq!(records[2].plate, "");
    }

    #[test]
    fn test_line_without_station_skipped() {
        let records = parse_pasted(",ノート,333\nD駅,ノート,444");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].plate, "444");
    }

    #[test]
    fn test_header_row_skipped() {
        let records = parse_pasted("ステーション\t車種\tナンバー\nA駅\tプリウス\t111");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].station, "A駅");
    }

    #[test]
    fn test_decode_cp932() {
        let (encoded, _, _) = SHIFT_JIS.encode("大和駅,プリウス,111");
        let text = decode_text(&encoded);
        assert_eq!(text, "大和駅,プリウス,111");
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("A駅".as_bytes());
        assert_eq!(decode_text(&bytes), "A駅");
    }

    #[test]
    fn test_load_empty_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(load_file(&path).is_err());
    }
}
