pub mod emissions_html;
pub mod social_cost_html;
pub mod summary_txt;
pub mod zip;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CHART_JS_URL: &str = "https://cdn.jsdelivr.net/npm/chart.js";

pub fn write_document(path: &Path, html: &str) -> Result<()> {
    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("create {} failed", path.display()))?,
    );
    w.write_all(html.as_bytes())?;
    w.flush()?;
    Ok(())
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// JSON for a `<script type="application/json">` block. `<` only occurs
/// inside string literals, so escaping it keeps `</script>` out of the markup.
pub fn script_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).context("failed to encode report payload")?;
    Ok(json.replace('<', "\\u003c"))
}

/// Two decimals, as `Number.prototype.toFixed(2)`. Exact ties round away
/// from zero; `{:.2}` alone would round them to even.
pub fn fmt_fixed2(v: f64) -> String {
    // A third-decimal tie that a double can hold exactly is an odd number of eighths.
    let eighths = v.abs() * 8.0;
    if eighths < 9.0e15 && eighths.fract() == 0.0 && eighths % 2.0 == 1.0 {
        let hundredths = (eighths as u64 as u128 * 100 + 7) / 8;
        let sign = if v < 0.0 { "-" } else { "" };
        return format!("{}{}.{:02}", sign, hundredths / 100, hundredths % 100);
    }
    format!("{:.2}", v)
}

/// At most two decimals with thousands separators, e.g. `1,589.98`.
pub fn fmt_num(v: f64) -> String {
    let s = fmt_fixed2(v.abs());
    let (int, frac) = s.split_once('.').unwrap_or((s.as_str(), ""));
    let frac = frac.trim_end_matches('0');
    let sign = if v < 0.0 && s.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    if frac.is_empty() {
        format!("{}{}", sign, group_thousands(int))
    } else {
        format!("{}{}.{}", sign, group_thousands(int), frac)
    }
}

/// Whole US dollars, e.g. `$27,030`.
pub fn fmt_money(v: f64) -> String {
    let rounded = v.round();
    let digits = format!("{:.0}", rounded.abs());
    if rounded < 0.0 {
        format!("-${}", group_thousands(&digits))
    } else {
        format!("${}", group_thousands(&digits))
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn fmt_timestamp(ts: u64) -> String {
    let days = (ts / 86_400) as i64;
    let secs = (ts % 86_400) as u32;
    let hour = secs / 3_600;
    let min = (secs % 3_600) / 60;

    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };
    let year = y + if m <= 2 { 1 } else { 0 };

    format!("{:04}-{:02}-{:02} {:02}:{:02} UTC", year, m, d, hour, min)
}
