use std::fmt::{self, Write as _};

use chrono::TimeZone;
use ism_client::ListView;

const TIME_FORMAT: &str = "%m/%d/%y %I:%M %p";
const ID_WIDTH: usize = 28;
const DESCRIPTION_WIDTH: usize = 40;

/// Plain-text rendering of the policy table, timestamps shown in `tz`.
pub fn render_table<Tz>(view: &ListView, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<description_width$}  Last updated time",
        "Policy",
        "Description",
        id_width = ID_WIDTH,
        description_width = DESCRIPTION_WIDTH,
    );

    if let Some(prompt) = view.empty_prompt() {
        let _ = writeln!(out, "{}", prompt.message());
    }
    for item in &view.items {
        let updated = item
            .last_updated_time()
            .map(|time| time.with_timezone(tz).format(TIME_FORMAT).to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<description_width$}  {updated}",
            truncate(&item.id, ID_WIDTH),
            truncate(item.description().unwrap_or_default(), DESCRIPTION_WIDTH),
            id_width = ID_WIDTH,
            description_width = DESCRIPTION_WIDTH,
        );
    }

    let _ = write!(
        out,
        "page {} of {} ({} policies",
        view.page_index.saturating_add(1),
        view.page_count,
        view.total_count
    );
    if view.filter_applied {
        let _ = write!(out, " matching \"{}\"", view.query.search);
    }
    out.push(')');
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
