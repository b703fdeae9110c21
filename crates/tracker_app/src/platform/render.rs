use tracker_core::{AppViewModel, Highlight, SingleTaskView, SiteRowView};

/// Rows of the site table printed below the status block.
const TABLE_HEAD_ROWS: usize = 10;

/// Renders the view model as a block of terminal lines.
pub fn render(view: &AppViewModel) -> Vec<String> {
    let mut lines = Vec::new();

    let crawl_label = if view.crawl_running { "running" } else { "idle" };
    let mut status = format!(
        "Crawl: {} | Tracked: {} | Polling: {} | List sync: {}",
        crawl_label,
        view.tracked_tasks,
        on_off(view.polling),
        on_off(view.list_sync)
    );
    if view.reload_pending {
        status.push_str(" | reloading");
    }
    lines.push(status);

    if let Some(progress) = &view.full_progress {
        let line = match progress.current_item.as_deref() {
            Some(current) if !current.is_empty() => {
                format!("Full crawl: {} current: {}", progress.label(), current)
            }
            _ => format!("Full crawl: {}", progress.label()),
        };
        lines.push(line);
    }

    lines.extend(view.singles.iter().map(format_single));

    if !view.rows.is_empty() || view.total_count.is_some() {
        lines.push(match view.total_count {
            Some(total) => format!("Sites ({} total):", format_with_commas(total)),
            None => "Sites:".to_string(),
        });
        lines.extend(view.rows.iter().take(TABLE_HEAD_ROWS).map(format_row));
        if view.rows.len() > TABLE_HEAD_ROWS {
            lines.push(format!("  ... {} more", view.rows.len() - TABLE_HEAD_ROWS));
        }
    }

    lines
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn format_single(single: &SingleTaskView) -> String {
    let lock = if single.action_enabled { "" } else { " [locked]" };
    format!(
        "  site {}: {}{}",
        single.site_id,
        single.indicator.label(),
        lock
    )
}

fn format_row(row: &SiteRowView) -> String {
    let marker = match row.highlight {
        Some(Highlight::Added) => '+',
        Some(Highlight::Updated) => '~',
        None => ' ',
    };
    format!(
        "{} {:>6}  {}  {}  {}  {}",
        marker, row.site_id, row.name, row.country, row.category, row.updated_at
    )
}

fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
