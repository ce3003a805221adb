//! Plain-text rendering of the mirrored table.

use std::fmt::Write as _;

use livetable_client::ConnectionState;
use livetable_shared::Collection;

const HEADERS: [&str; 4] = ["PROJECT", "USER", "CREATED", "NAME"];

/// One row per item, in collection order, with aligned columns.
pub fn table(collection: &Collection) -> String {
    let rows: Vec<[&str; 4]> = collection
        .iter()
        .map(|item| {
            [
                item.project_id.as_str(),
                item.user_id.as_str(),
                item.created_at.as_str(),
                item.name.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, &HEADERS, &widths);
    for row in &rows {
        write_row(&mut out, row, &widths);
    }
    let _ = writeln!(out, "({} items)", rows.len());
    out
}

fn write_row(out: &mut String, cells: &[&str; 4], widths: &[usize; 4]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Short status line for a connection state.
pub fn status(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Connecting { attempt } => format!("[connecting, attempt {attempt}]"),
        ConnectionState::Open => "[live]".to_string(),
        ConnectionState::Closing => "[closing]".to_string(),
        ConnectionState::WaitingToReconnect { delay } => {
            format!("[disconnected, retrying in {}ms]", delay.as_millis())
        }
        ConnectionState::Stopped => "[stopped]".to_string(),
    }
}
