use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Storage format for every timestamp column.
///
/// Fixed width and always UTC, so lexicographic order in SQL matches
/// chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp. Falls back to RFC 3339 for rows written by
/// other tools (imports, manual edits).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

/// Midnight UTC of the given calendar day.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Lowercase ASCII slug used for stored file names.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "cover".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn timestamps_sort_chronologically_as_text() {
        let earlier = Utc.with_ymd_and_hms(2025, 6, 9, 23, 59, 59).unwrap();
        let later = earlier + Duration::seconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(later), "2025-06-10T00:00:00Z");
    }

    #[test]
    fn parse_accepts_storage_format_and_rfc3339() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2025-01-02T03:04:05Z"), Some(at));
        assert_eq!(parse_timestamp("2025-01-02T05:04:05+02:00"), Some(at));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Laskar Pelangi: Edisi 2!"), "laskar-pelangi-edisi-2");
        assert_eq!(slugify("  --  "), "cover");
    }
}
