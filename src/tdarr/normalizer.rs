//! Converts both Tdarr statistics shapes into [`GroupStat`] records.
//!
//! Older servers embed per-library rows in the `pies` field of the
//! statistics document as 13-element positional arrays. Newer servers leave
//! `pies` empty and serve keyed per-library documents from a separate
//! endpoint. [`WireShape`] is resolved once per cycle and each arm yields the
//! same canonical record.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{
    AudioBreakdown, GroupInfo, GroupStat, PieSlice, PieStat, StatusBreakdown, VideoBreakdown,
};
use crate::error::ShapeError;

/// Label value substituted for the all-libraries id.
pub const ALL_LIBRARIES_ID: &str = "all_libraries";
/// Name given to the synthetic all-libraries request.
pub const ALL_LIBRARIES_NAME: &str = "All";

/// Statistics layout served by the upstream version.
#[derive(Debug, Clone, PartialEq)]
pub enum WireShape {
    /// Non-empty positional `pies` rows.
    Legacy(Vec<Value>),
    /// Per-library documents must be fetched separately.
    Keyed,
}

impl WireShape {
    pub fn resolve(pies: Option<Value>) -> Self {
        match pies {
            Some(Value::Array(rows)) if !rows.is_empty() => WireShape::Legacy(rows),
            _ => WireShape::Keyed,
        }
    }
}

/// Result of a legacy parse: every row that survived plus what was dropped.
#[derive(Debug, Default)]
pub struct Normalized {
    pub stats: Vec<GroupStat>,
    pub shape_errors: Vec<ShapeError>,
}

/// Rewrites the all-libraries id (any casing, or empty) to the sentinel.
pub fn normalize_library_id(id: &str) -> String {
    if id.is_empty() || id.eq_ignore_ascii_case("all") {
        ALL_LIBRARIES_ID.to_string()
    } else {
        id.to_string()
    }
}

/// `"Transcode Success "` becomes `"success"`; names without the prefix are
/// only lower-cased and trimmed.
pub fn clean_transcode_status(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.strip_prefix("transcode") {
        Some(rest) => rest.trim().to_string(),
        None => lower.trim().to_string(),
    }
}

pub fn breakdown_label(name: &str) -> String {
    name.to_lowercase()
}

/// Builds the canonical record for one keyed `get-pies` response.
pub fn from_pie_stat(info: &GroupInfo, stat: PieStat) -> GroupStat {
    GroupStat {
        group_name: info.group_name.clone(),
        group_id: normalize_library_id(&info.group_id),
        total_files: stat.total_files,
        total_transcode_count: stat.total_transcode_count,
        size_diff_gb: stat.size_diff_gb,
        total_health_check_count: stat.total_health_check_count,
        status: stat.status,
        video: stat.video,
        audio: stat.audio,
    }
}

/// Parses positional rows. A row with a bad name or id is dropped; a bad
/// counter defaults to 0 and a bad breakdown is left empty.
pub fn parse_legacy(rows: &[Value]) -> Normalized {
    let mut out = Normalized::default();
    for (row_index, row) in rows.iter().enumerate() {
        debug!(row = row_index, "Parsing legacy pie row");
        match parse_row(row_index, row, &mut out.shape_errors) {
            Ok(stat) => out.stats.push(stat),
            Err(e) => {
                warn!(error = %e, "Dropping legacy pie row");
                out.shape_errors.push(e);
            }
        }
    }
    out
}

const BREAKDOWN_FIELDS: [&str; 7] = [
    "transcode status",
    "health check status",
    "video codecs",
    "video containers",
    "video resolutions",
    "audio codecs",
    "audio containers",
];

fn parse_row(
    row_index: usize,
    row: &Value,
    errors: &mut Vec<ShapeError>,
) -> Result<GroupStat, ShapeError> {
    let fields = row.as_array().ok_or(ShapeError {
        row: row_index,
        index: 0,
        field: "row",
        expected: "array",
        found: json_type(Some(row)),
    })?;
    let cell = |index: usize| fields.get(index);

    let string_at = |index: usize, field: &'static str| -> Result<String, ShapeError> {
        match cell(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            other => Err(ShapeError {
                row: row_index,
                index,
                field,
                expected: "string",
                found: json_type(other),
            }),
        }
    };
    let number_at = |index: usize, field: &'static str| -> Result<f64, ShapeError> {
        match cell(index).and_then(Value::as_f64) {
            Some(n) => Ok(n),
            None => Err(ShapeError {
                row: row_index,
                index,
                field,
                expected: "number",
                found: json_type(cell(index)),
            }),
        }
    };

    // Identity fields label every series, so without them the row is unusable.
    let group_name = string_at(0, "library name")?;
    let group_id = string_at(1, "library id")?;

    let mut counter = |index: usize, field: &'static str| match number_at(index, field) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Defaulting legacy counter to 0");
            errors.push(e);
            0.0
        }
    };
    let total_files = counter(2, "total files");
    let total_transcode_count = counter(3, "total transcodes");
    let size_diff_gb = counter(4, "size diff");
    let total_health_check_count = counter(5, "total health checks");

    let mut breakdowns: [Vec<PieSlice>; 7] = Default::default();
    for (offset, slot) in breakdowns.iter_mut().enumerate() {
        let index = 6 + offset;
        match parse_breakdown(row_index, index, BREAKDOWN_FIELDS[offset], cell(index)) {
            Ok(slices) => *slot = slices,
            Err(e) => {
                warn!(error = %e, "Skipping legacy breakdown");
                errors.push(e);
            }
        }
    }
    let [transcode, health_check, video_codecs, video_containers, video_resolutions, audio_codecs, audio_containers] =
        breakdowns;

    Ok(GroupStat {
        group_name,
        group_id: normalize_library_id(&group_id),
        total_files,
        total_transcode_count,
        size_diff_gb,
        total_health_check_count,
        status: StatusBreakdown {
            transcode,
            health_check,
        },
        video: VideoBreakdown {
            codecs: video_codecs,
            containers: video_containers,
            resolutions: video_resolutions,
        },
        audio: AudioBreakdown {
            codecs: audio_codecs,
            containers: audio_containers,
        },
    })
}

fn parse_breakdown(
    row: usize,
    index: usize,
    field: &'static str,
    value: Option<&Value>,
) -> Result<Vec<PieSlice>, ShapeError> {
    let shape_error = |expected, found| ShapeError {
        row,
        index,
        field,
        expected,
        found,
    };
    let items = match value {
        Some(Value::Array(items)) => items,
        other => return Err(shape_error("array", json_type(other))),
    };
    items
        .iter()
        .map(|item| {
            if !item.is_object() {
                return Err(shape_error("{name, value} object", json_type(Some(item))));
            }
            PieSlice::deserialize(item)
                .map_err(|_| shape_error("{name, value} object", "malformed object"))
        })
        .collect()
}

fn json_type(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_row(id: &str) -> Value {
        json!([
            "Movies", id, 10, 4, 1.5, 6,
            [{"name": "Transcode success", "value": 3}, {"name": "Not required", "value": 1}],
            [{"name": "Success", "value": 6}],
            [{"name": "HEVC", "value": 7}],
            [{"name": "MKV", "value": 8}],
            [{"name": "1080p", "value": 9}],
            [{"name": "AAC", "value": 5}],
            [{"name": "MKV", "value": 5}]
        ])
    }

    #[test]
    fn test_resolve_wire_shape() {
        assert_eq!(WireShape::resolve(None), WireShape::Keyed);
        assert_eq!(WireShape::resolve(Some(json!([]))), WireShape::Keyed);
        assert_eq!(WireShape::resolve(Some(Value::Null)), WireShape::Keyed);
        assert!(matches!(
            WireShape::resolve(Some(json!([legacy_row("x")]))),
            WireShape::Legacy(rows) if rows.len() == 1
        ));
    }

    #[test]
    fn test_all_library_ids_become_sentinel() {
        for id in ["all", "ALL", "All", "aLl", ""] {
            assert_eq!(normalize_library_id(id), ALL_LIBRARIES_ID);
        }
        assert_eq!(normalize_library_id("lib-1"), "lib-1");
        assert_eq!(normalize_library_id("allmovies"), "allmovies");
    }

    #[test]
    fn test_clean_transcode_status() {
        assert_eq!(clean_transcode_status("Transcode Success "), "success");
        assert_eq!(clean_transcode_status("Ignored"), "ignored");
        assert_eq!(clean_transcode_status("transcode error/cancelled"), "error/cancelled");
        assert_eq!(clean_transcode_status("Queued"), "queued");
    }

    #[test]
    fn test_parse_legacy_full_row() {
        let parsed = parse_legacy(&[legacy_row("lib-1")]);
        assert!(parsed.shape_errors.is_empty());
        let stat = &parsed.stats[0];
        assert_eq!(stat.group_name, "Movies");
        assert_eq!(stat.group_id, "lib-1");
        assert_eq!(stat.total_files, 10.0);
        assert_eq!(stat.size_diff_gb, 1.5);
        assert_eq!(stat.status.transcode.len(), 2);
        assert_eq!(stat.video.resolutions, vec![PieSlice::new("1080p", 9.0)]);
        assert_eq!(stat.audio.containers, vec![PieSlice::new("MKV", 5.0)]);
    }

    #[test]
    fn test_parse_legacy_all_row_is_renamed() {
        let parsed = parse_legacy(&[legacy_row("all")]);
        assert_eq!(parsed.stats[0].group_id, ALL_LIBRARIES_ID);
    }

    #[test]
    fn test_breakdown_shape_error_keeps_rest_of_row() {
        let mut row = legacy_row("lib-1");
        row[8] = json!("HEVC");
        let parsed = parse_legacy(&[row]);

        assert_eq!(parsed.stats.len(), 1);
        assert_eq!(parsed.shape_errors.len(), 1);
        let err = &parsed.shape_errors[0];
        assert_eq!(err.index, 8);
        assert_eq!(err.expected, "array");
        assert_eq!(err.found, "string");

        let stat = &parsed.stats[0];
        assert!(stat.video.codecs.is_empty());
        assert_eq!(stat.total_files, 10.0);
        assert_eq!(stat.video.containers, vec![PieSlice::new("MKV", 8.0)]);
        assert_eq!(stat.status.health_check, vec![PieSlice::new("Success", 6.0)]);
    }

    #[test]
    fn test_breakdown_with_bad_slice_is_skipped() {
        let mut row = legacy_row("lib-1");
        row[11] = json!([{"name": "AAC", "value": 5}, 42]);
        let parsed = parse_legacy(&[row]);
        assert_eq!(parsed.shape_errors.len(), 1);
        assert_eq!(parsed.shape_errors[0].index, 11);
        assert!(parsed.stats[0].audio.codecs.is_empty());
    }

    #[test]
    fn test_short_row_skips_missing_breakdowns() {
        let row = json!(["TV", "lib-2", 3, 1, 0.0, 2]);
        let parsed = parse_legacy(&[row]);
        assert_eq!(parsed.stats.len(), 1);
        assert_eq!(parsed.shape_errors.len(), 7);
        assert!(parsed.shape_errors.iter().all(|e| e.found == "missing"));
    }

    #[test]
    fn test_bad_identity_drops_row() {
        let mut bad = legacy_row("lib-1");
        bad[1] = json!(17);
        let parsed = parse_legacy(&[bad, json!("not a row"), legacy_row("lib-3")]);

        assert_eq!(parsed.stats.len(), 1);
        assert_eq!(parsed.stats[0].group_id, "lib-3");
        assert_eq!(parsed.shape_errors.len(), 2);
        assert_eq!(parsed.shape_errors[0].field, "library id");
        assert_eq!(parsed.shape_errors[1].field, "row");
    }

    #[test]
    fn test_non_numeric_counter_keeps_row() {
        let mut bad = legacy_row("lib-1");
        bad[3] = json!("four");
        let parsed = parse_legacy(&[bad]);

        assert_eq!(parsed.stats.len(), 1);
        assert_eq!(parsed.shape_errors.len(), 1);
        assert_eq!(parsed.shape_errors[0].index, 3);
        assert_eq!(parsed.shape_errors[0].expected, "number");
        assert_eq!(parsed.shape_errors[0].found, "string");

        let stat = &parsed.stats[0];
        assert_eq!(stat.total_transcode_count, 0.0);
        assert_eq!(stat.total_files, 10.0);
        assert_eq!(stat.size_diff_gb, 1.5);
        assert_eq!(stat.status.transcode.len(), 2);
        assert_eq!(stat.video.codecs.len(), 1);
        assert_eq!(stat.audio.containers.len(), 1);
    }

    #[test]
    fn test_short_row_defaults_missing_counters() {
        let parsed = parse_legacy(&[json!(["TV", "lib-2", 3])]);
        assert_eq!(parsed.stats.len(), 1);
        assert_eq!(parsed.stats[0].total_files, 3.0);
        let counter_errors = parsed
            .shape_errors
            .iter()
            .filter(|e| (3..=5).contains(&e.index))
            .count();
        assert_eq!(counter_errors, 3);
    }

    #[test]
    fn test_from_pie_stat_uses_inventory_identity() {
        let info = GroupInfo {
            group_id: String::new(),
            group_name: ALL_LIBRARIES_NAME.to_string(),
        };
        let stat = from_pie_stat(
            &info,
            PieStat {
                total_files: 12.0,
                ..Default::default()
            },
        );
        assert_eq!(stat.group_id, ALL_LIBRARIES_ID);
        assert_eq!(stat.group_name, "All");
        assert_eq!(stat.total_files, 12.0);
    }
}
