//! Reply text for shipment lookups.

use crate::records::ShipmentRecord;

/// Placeholder for any field missing from a record.
pub const PLACEHOLDER: &str = "N/A";

/// Render the reply for a lookup of `code`.
///
/// Total: every optional field has a placeholder, and a missing record yields
/// the fixed not-found line.
pub fn format_reply(code: &str, record: Option<&ShipmentRecord>) -> String {
    match record {
        Some(r) => format_found(r),
        None => format_not_found(code),
    }
}

pub fn format_found(r: &ShipmentRecord) -> String {
    [
        format!("📦 شحنة: {}", r.tracking_code),
        format!("- النوع: {}", or_placeholder(&r.kind)),
        format!("- الحالة: {}", or_placeholder(&r.status)),
        format!("- المغادرة: {}", or_placeholder(&r.departure_date)),
        format!("- ميناء/مطار الوصول: {}", or_placeholder(&r.arrival_location)),
        format!("- الوصول المتوقع: {}", or_placeholder(&r.expected_arrival)),
    ]
    .join("\n")
}

pub fn format_not_found(code: &str) -> String {
    format!("❌ لم يتم العثور على شحنة بالرمز: {code}")
}

fn or_placeholder(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or(PLACEHOLDER)
}
