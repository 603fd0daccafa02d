//! Plain-text rendering of a finished run.

use std::fmt::Write;

use battlefield_core::snapshot::{LeaderboardEntry, SimulationResults};
use chrono::TimeDelta;

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Render the winner banner followed by the leaderboard in service order.
pub fn render_results(results: &SimulationResults, elapsed: Option<TimeDelta>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Winner: {} ({} ROI)",
        results.winner.name,
        format_roi(results.winner.roi)
    );
    if let Some(elapsed) = elapsed {
        let _ = writeln!(out, "Finished in {}", format_elapsed(elapsed));
    }

    if results.leaderboard.is_empty() {
        return out;
    }

    let width = results
        .leaderboard
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0);

    out.push('\n');
    for (rank, entry) in results.leaderboard.iter().enumerate() {
        let _ = writeln!(out, "{}", leaderboard_line(rank, entry, width));
    }
    out
}

fn leaderboard_line(rank: usize, entry: &LeaderboardEntry, width: usize) -> String {
    let badge = MEDALS
        .get(rank)
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("{:>2}", rank + 1));
    let mut line = format!(
        "{badge} {:<width$}  {:>9}  ${:.2}",
        entry.name,
        format_roi(entry.roi),
        entry.current_value,
    );
    if let Some(trades) = entry.trades {
        let _ = write!(line, "  {trades} trades");
    }
    line
}

/// Signed percentage, e.g. `+15.30%`.
pub fn format_roi(roi: f64) -> String {
    format!("{roi:+.2}%")
}

/// Compact duration, e.g. `4m 07s`.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    match secs {
        s if s >= 3600 => format!("{}h {:02}m {:02}s", s / 3600, (s % 3600) / 60, s % 60),
        s if s >= 60 => format!("{}m {:02}s", s / 60, s % 60),
        s => format!("{s}s"),
    }
}
