//! Human-readable formatting utilities for byte sizes

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
const THRESHOLD: f64 = 1024.0;

/// Formats a size in bytes to a human-readable string with appropriate units
pub fn format_bytes(bytes: usize) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else if size.fract() == 0.0 {
        format!("{:.0}{}", size, UNITS[unit_index])
    } else if size >= 10.0 {
        format!("{:.1}{}", size, UNITS[unit_index])
    } else {
        format!("{:.2}{}", size, UNITS[unit_index])
    }
}

/// Parses strings such as `"25MB"`, `"512 KB"` or `"1048576"` into bytes
///
/// Units are binary (1KB = 1024B) and case-insensitive.
pub fn parse_bytes(value: &str) -> Option<usize> {
    let trimmed = value.trim();
    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split_at);
    let number: f64 = number.parse().ok()?;

    let unit = unit.trim().to_ascii_uppercase();
    let exponent = match unit.as_str() {
        "" | "B" => 0,
        "K" | "KB" | "KIB" => 1,
        "M" | "MB" | "MIB" => 2,
        "G" | "GB" | "GIB" => 3,
        "T" | "TB" | "TIB" => 4,
        _ => return None,
    };

    let bytes = number * THRESHOLD.powi(exponent);
    if !bytes.is_finite() || bytes < 0.0 || bytes > usize::MAX as f64 {
        return None;
    }
    Some(bytes.round() as usize)
}
