use crate::records::ShipmentRecord;

/// First record whose code (either field, any case) equals `code`.
///
/// Duplicate codes are not an error; list order decides.
pub fn find_shipment<'a>(
    code: &str,
    records: &'a [ShipmentRecord],
) -> Option<&'a ShipmentRecord> {
    records.iter().find(|r| r.matches(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, status: &str) -> ShipmentRecord {
        ShipmentRecord {
            tracking_code: code.to_string(),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn matches_case_insensitively() {
        let records = vec![record("msku1234567", "In Transit")];
        let found = find_shipment("MSKU1234567", &records).unwrap();
        assert_eq!(found.status.as_deref(), Some("In Transit"));
    }

    #[test]
    fn matches_legacy_alternate_code() {
        let records = vec![ShipmentRecord {
            tracking_code: "AB123456".to_string(),
            alternate_code: Some("cd654321".to_string()),
            ..Default::default()
        }];
        assert!(find_shipment("CD654321", &records).is_some());
    }

    #[test]
    fn first_duplicate_wins() {
        let records = vec![
            record("AB123456", "first"),
            record("ab123456", "second"),
        ];
        let found = find_shipment("AB123456", &records).unwrap();
        assert_eq!(found.status.as_deref(), Some("first"));
    }

    #[test]
    fn not_found_and_empty_list() {
        let records = vec![record("AB123456", "x")];
        assert!(find_shipment("AB1234567", &records).is_none());
        assert!(find_shipment("AB123456", &[]).is_none());
    }
}
