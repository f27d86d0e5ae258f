//! Number and label formatting shared by the charts and the PDF.

/// Formats a USD amount for prose and tables: `$2.85B`, `$2.8M`, `$60.2K`, `$412.50`.
pub fn format_usd(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();
    if value >= 1_000_000_000.0 {
        format!("{}${:.2}B", sign, value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("{}${:.1}M", sign, value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{}${:.1}K", sign, value / 1_000.0)
    } else {
        format!("{}${:.2}", sign, value)
    }
}

/// Axis tick labels: `$1.5M`, `$250K`, `$40`.
pub fn format_usd_axis(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.0}K", value / 1_000.0)
    } else {
        format!("${}", group_thousands(value.round().max(0.0) as u64))
    }
}

/// Integer with `,` thousands separators.
pub fn format_count(value: u64) -> String {
    group_thousands(value)
}

/// Signed percentage with one decimal place, e.g. `+12.5%`.
pub fn format_change(ratio: f64) -> String {
    format!("{:+.1}%", ratio * 100.0)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Uppercases the first character: `ethereum` -> `Ethereum`.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncates to at most `max_chars` characters.
pub fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_scales() {
        assert_eq!(format_usd(2_847_321.45), "$2.8M");
        assert_eq!(format_usd(3_250_000_000.0), "$3.25B");
        assert_eq!(format_usd(60_173.0), "$60.2K");
        assert_eq!(format_usd(412.5), "$412.50");
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(-1_500.0), "-$1.5K");
    }

    #[test]
    fn axis_labels() {
        assert_eq!(format_usd_axis(1_500_000.0), "$1.5M");
        assert_eq!(format_usd_axis(250_000.0), "$250K");
        assert_eq!(format_usd_axis(40.0), "$40");
    }

    #[test]
    fn counts_are_grouped() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_247), "1,247");
        assert_eq!(format_count(12_345_678), "12,345,678");
    }

    #[test]
    fn change_is_signed() {
        assert_eq!(format_change(0.125), "+12.5%");
        assert_eq!(format_change(-0.5), "-50.0%");
    }

    #[test]
    fn text_helpers() {
        assert_eq!(capitalize("ethereum"), "Ethereum");
        assert_eq!(capitalize(""), "");
        assert_eq!(truncate("UNKNOWN/lvlUSD(91.5%)", 7), "UNKNOWN");
    }
}
