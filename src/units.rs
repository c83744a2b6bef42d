const BYTE_UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

pub fn fmt_bytes(num: u64) -> String {
    fmt_real(num as f64, 1024.0, &BYTE_UNITS)
}

fn fmt_real(num: f64, factor: f64, units: &[&str]) -> String {
    let mut value = num;
    for (i, unit) in units.iter().enumerate() {
        if value.abs() < factor || i == units.len() - 1 {
            return format!("{value:.2}{unit}");
        }
        value /= factor;
    }
    format!("{value:.2}")
}

pub fn fmt_seconds(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as u64;
    format!(
        "{}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
