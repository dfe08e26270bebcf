use crate::error::{HostsyncError, Result};
use crate::report::HostSummary;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 420;
const RADIUS: f64 = 150.0;
const CENTER: (f64, f64) = (190.0, 230.0);

const PALETTE: &[&str] = &[
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#feca57", "#a29bfe", "#fd79a8", "#636e72",
];
const FRESHNESS_COLORS: &[&str] = &["#ff9999", "#66b3ff"];

pub const OS_CHART: &str = "os_distribution.svg";
pub const FRESHNESS_CHART: &str = "host_age_pie.svg";
pub const SOURCE_CHART: &str = "source_distribution.svg";
pub const SUMMARY_FILE: &str = "summary.json";

/// Writes the summary charts as SVG pie charts
pub struct ChartRenderer {
    output_dir: PathBuf,
    stale_after_days: i64,
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, stale_after_days: i64) -> Self {
        Self {
            output_dir: output_dir.into(),
            stale_after_days,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render every chart that has data plus `summary.json`; returns the paths written
    pub fn render(&self, summary: &HostSummary) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| HostsyncError::Io {
            source: e,
            context: format!(
                "Failed to create chart directory: {}",
                self.output_dir.display()
            ),
        })?;

        let mut written = Vec::new();

        if !summary.by_os.is_empty() {
            let slices: Vec<_> = summary
                .by_os
                .iter()
                .map(|(label, count)| (label.clone(), *count))
                .collect();
            let svg = pie_chart("Host OS Distribution", &slices, PALETTE);
            written.push(self.write(OS_CHART, &svg)?);
        }

        if summary.old_hosts > 0 || summary.recent_hosts > 0 {
            let slices = vec![
                (format!("Old Hosts (>{} days)", self.stale_after_days), summary.old_hosts),
                (
                    format!("Recent Hosts (<={} days)", self.stale_after_days),
                    summary.recent_hosts,
                ),
            ];
            let svg = pie_chart("Host Freshness Distribution", &slices, FRESHNESS_COLORS);
            written.push(self.write(FRESHNESS_CHART, &svg)?);
        }

        let slices: Vec<_> = summary
            .by_source
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect();
        let svg = pie_chart("Host Distribution by Source", &slices, PALETTE);
        written.push(self.write(SOURCE_CHART, &svg)?);

        let json = serde_json::to_string_pretty(summary).map_err(|e| HostsyncError::Json {
            source: e,
            context: "Failed to serialize host summary".to_string(),
        })?;
        written.push(self.write(SUMMARY_FILE, &json)?);

        tracing::debug!("Wrote {} report files to {}", written.len(), self.output_dir.display());

        Ok(written)
    }

    fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        std::fs::write(&path, content).map_err(|e| HostsyncError::Io {
            source: e,
            context: format!("Failed to write {}", path.display()),
        })?;
        Ok(path)
    }
}

/// Render a titled pie chart with a legend. Zero-count slices are listed in
/// the legend but draw nothing.
pub fn pie_chart(title: &str, slices: &[(String, usize)], colors: &[&str]) -> String {
    let total: usize = slices.iter().map(|(_, count)| count).sum();
    let mut lines = vec![
        format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##,
            w = WIDTH,
            h = HEIGHT
        ),
        r##"  <rect width="100%" height="100%" fill="#ffffff"/>"##.to_string(),
        format!(
            r##"  <text x="{}" y="40" font-family="sans-serif" font-size="20" font-weight="bold" text-anchor="middle">{}</text>"##,
            WIDTH / 2,
            escape(title)
        ),
    ];

    let (cx, cy) = CENTER;
    let mut angle = -PI / 2.0;

    for (idx, (label, count)) in slices.iter().enumerate() {
        let color = colors[idx % colors.len()];

        if total > 0 && *count > 0 {
            let fraction = *count as f64 / total as f64;
            if *count == total {
                lines.push(format!(
                    r##"  <circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"##,
                    cx, cy, RADIUS, color
                ));
            } else {
                let sweep = fraction * 2.0 * PI;
                let (x1, y1) = (cx + RADIUS * angle.cos(), cy + RADIUS * angle.sin());
                let end = angle + sweep;
                let (x2, y2) = (cx + RADIUS * end.cos(), cy + RADIUS * end.sin());
                let large_arc = if sweep > PI { 1 } else { 0 };
                lines.push(format!(
                    r##"  <path d="M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z" fill="{}" stroke="#ffffff"/>"##,
                    cx, cy, x1, y1, RADIUS, RADIUS, large_arc, x2, y2, color
                ));
                angle = end;
            }
        }

        let percent = if total > 0 {
            *count as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        let legend_y = 90 + idx as u32 * 24;
        lines.push(format!(
            r##"  <rect x="380" y="{}" width="14" height="14" fill="{}"/>"##,
            legend_y, color
        ));
        lines.push(format!(
            r##"  <text x="402" y="{}" font-family="sans-serif" font-size="13">{} ({}, {:.1}%)</text>"##,
            legend_y + 12,
            escape(label),
            count,
            percent
        ));
    }

    lines.push("</svg>\n".to_string());
    lines.join("\n")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
