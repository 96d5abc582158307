//! Text formatting helpers shared by the reports and the bot layer.
//!
//! All functions are pure and return plain strings ready to be embedded in Discord
//! messages (markdown code blocks, bar charts, aligned tables).

use chrono::Duration;

/// Renders `value / total` as a bar of `length` full blocks.
///
/// A remaining fraction of at least half a block is drawn as `▌`. Returns a single
/// space when `total` is zero so embed fields are never empty.
#[must_use]
pub fn bar_chart(value: i64, total: i64, length: usize) -> String {
    if total == 0 {
        return " ".to_string();
    }

    // Cast safety: amounts are far below 2^52, the ratio only drives a bar length.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (full, half) = {
        let blocks = (value as f64 * length as f64) / total as f64;
        let blocks = blocks.max(0.0);
        (blocks.trunc() as usize, blocks.fract() >= 0.5)
    };

    let mut bar = "█".repeat(full);
    if half {
        bar.push('▌');
    }
    bar
}

/// Share of `value` in `total`, rounded to a whole percent.
#[must_use]
pub fn percent(value: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    // Cast safety: result is within [0, 100] for non-negative inputs.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let percent = ((value as f64 / total as f64) * 100.0).round() as i64;
    percent
}

/// Truncates `text` to at most `length` characters, ending with `…` when cut.
#[must_use]
pub fn truncate(text: &str, length: usize) -> String {
    if text.chars().count() <= length {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(length.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Groups digits by three, e.g. `1234567` becomes `1 234 567`.
#[must_use]
pub fn humanize_number(number: i64) -> String {
    let digits = number.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    if number < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

/// Signed amount, e.g. `+50` or `-25`.
#[must_use]
pub fn signed(amount: i64) -> String {
    format!("{amount:+}")
}

/// Uppercases the first character.
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Wraps `text` in a markdown code block with an optional language tag.
#[must_use]
pub fn codeblock(text: &str, lang: &str) -> String {
    format!("```{lang}\n{text}\n```")
}

/// Lays rows out in left-aligned columns separated by two spaces.
///
/// When `headers` is given it is printed first, followed by a dashed rule.
#[must_use]
pub fn table(headers: Option<&[&str]>, rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(headers.map(<[&str]>::len))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0; columns];
    let header_cells = headers.map(|h| h.iter().map(|s| (*s).to_string()).collect::<Vec<_>>());
    for row in header_cells.iter().chain(rows) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render = |row: &[String]| {
        row.iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    if let Some(header) = &header_cells {
        lines.push(render(header));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
    }
    lines.extend(rows.iter().map(|row| render(row)));
    lines.join("\n")
}

/// Human-readable duration, e.g. `2 days 3 hours`. Only the two largest non-zero
/// units are kept; anything under a minute reads `just now`.
#[must_use]
pub fn duration(delta: Duration) -> String {
    let seconds = delta.num_seconds().max(0);
    let units = [
        (seconds / 86_400, "day"),
        (seconds / 3600 % 24, "hour"),
        (seconds / 60 % 60, "minute"),
    ];

    let parts: Vec<String> = units
        .iter()
        .filter(|(value, _)| *value > 0)
        .take(2)
        .map(|(value, unit)| {
            if *value == 1 {
                format!("{value} {unit}")
            } else {
                format!("{value} {unit}s")
            }
        })
        .collect();

    if parts.is_empty() {
        "just now".to_string()
    } else {
        parts.join(" ")
    }
}
