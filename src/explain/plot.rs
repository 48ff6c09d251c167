//! Standalone SVG summary plot
//!
//! One row per top-ranked feature, one dot per explained sample: x is the
//! attribution value, colour runs blue (low feature value) to red (high).

use std::path::{Path, PathBuf};

use super::{Attribution, ExplainError, ExplainResult};

const ROW_HEIGHT: f64 = 22.0;
const LABEL_WIDTH: f64 = 260.0;
const PLOT_WIDTH: f64 = 480.0;
const MARGIN: f64 = 30.0;

/// `<results_dir>/<dataset>_<model>_<fold>_<estimators>_summary_plot.svg`
pub fn summary_plot_path(
    results_dir: &Path,
    dataset: &str,
    model: &str,
    fold: usize,
    estimators: usize,
) -> PathBuf {
    results_dir.join(format!(
        "{dataset}_{model}_{fold}_{estimators}_summary_plot.svg"
    ))
}

/// XML text and attribute escaping for feature labels and titles.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Blue to red through purple.
fn colour(t: f64) -> String {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let r = (30.0 + 225.0 * t) as u8;
    let b = (255.0 - 225.0 * t) as u8;
    format!("rgb({r},40,{b})")
}

/// Render the `top` highest-ranked features as an SVG document.
pub fn render_summary_plot(attribution: &Attribution, top: usize, title: &str) -> String {
    let ranked: Vec<(usize, f64)> = attribution.ranking().into_iter().take(top).collect();

    let max_abs = ranked
        .iter()
        .flat_map(|&(f, _)| attribution.values.iter().map(move |row| row[f].abs()))
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);

    let height = MARGIN * 3.0 + ROW_HEIGHT * ranked.len() as f64;
    let width = LABEL_WIDTH + PLOT_WIDTH + MARGIN * 2.0;
    let zero_x = LABEL_WIDTH + PLOT_WIDTH / 2.0;
    let x_of = |v: f64| zero_x + v / max_abs * (PLOT_WIDTH / 2.0 - 8.0);

    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif" font-size="12">
<rect width="100%" height="100%" fill="white"/>
<text x="{}" y="{}" font-size="14" text-anchor="middle">{}</text>
<line x1="{zero_x}" y1="{}" x2="{zero_x}" y2="{}" stroke="#999"/>
"##,
        width / 2.0,
        MARGIN * 0.7,
        escape(title),
        MARGIN,
        height - MARGIN * 1.5,
    );

    for (rank, &(f, mean_abs)) in ranked.iter().enumerate() {
        let y = MARGIN * 1.5 + ROW_HEIGHT * rank as f64;
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end"><title>mean |attribution| {:.4}</title>{}</text>
"#,
            LABEL_WIDTH - 10.0,
            y + 4.0,
            mean_abs,
            escape(&attribution.features[f])
        ));

        let (lo, hi) = attribution
            .feature_values
            .iter()
            .map(|row| row[f])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let span = hi - lo;

        for (sample, row) in attribution.values.iter().enumerate() {
            let v = attribution.feature_values[sample][f];
            let t = if span > 0.0 { (v - lo) / span } else { 0.5 };
            // Spread samples vertically a little so equal values stay visible
            let jitter = ((sample * 37) % 11) as f64 - 5.0;
            svg.push_str(&format!(
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{}\" fill-opacity=\"0.7\"/>\n",
                x_of(row[f]),
                y + jitter,
                colour(t)
            ));
        }
    }

    let axis_y = height - MARGIN * 1.5;
    svg.push_str(&format!(
        r##"<line x1="{LABEL_WIDTH}" y1="{axis_y}" x2="{}" y2="{axis_y}" stroke="#333"/>
<text x="{}" y="{}" text-anchor="middle">-{max_abs:.3}</text>
<text x="{zero_x}" y="{}" text-anchor="middle">0</text>
<text x="{}" y="{}" text-anchor="middle">{max_abs:.3}</text>
<text x="{zero_x}" y="{}" text-anchor="middle">change in predicted-class probability</text>
</svg>
"##,
        LABEL_WIDTH + PLOT_WIDTH,
        LABEL_WIDTH,
        axis_y + 16.0,
        axis_y + 16.0,
        LABEL_WIDTH + PLOT_WIDTH,
        axis_y + 16.0,
        axis_y + 32.0,
    ));
    svg
}

/// Render and write the plot, creating the results directory.
pub fn write_summary_plot(
    attribution: &Attribution,
    top: usize,
    title: &str,
    path: &Path,
) -> ExplainResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ExplainError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, render_summary_plot(attribution, top, title)).map_err(|source| {
        ExplainError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tracing::info!("Wrote summary plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribution() -> Attribution {
        Attribution {
            features: vec!["USE#0".into(), "USE#1".into(), "LIWC_<i>".into()],
            values: vec![vec![0.1, -0.5, 0.0], vec![0.2, 0.4, 0.01]],
            feature_values: vec![vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 1.0]],
        }
    }

    #[test]
    fn test_plot_path_template() {
        let path = summary_plot_path(Path::new("./results"), "semeval", "Roberta_CLS", 3, 250);
        assert_eq!(
            path,
            PathBuf::from("./results/semeval_Roberta_CLS_3_250_summary_plot.svg")
        );
    }

    #[test]
    fn test_render_keeps_top_features_only() {
        let svg = render_summary_plot(&attribution(), 2, "semeval / USE");
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("USE#1"));
        assert!(svg.contains("USE#0"));
        assert!(!svg.contains("LIWC"));
        assert_eq!(svg.matches("<circle").count(), 2 * 2);
    }

    #[test]
    fn test_tooltip_nested_in_label() {
        let svg = render_summary_plot(&attribution(), 1, "USE");
        let label = svg.lines().find(|l| l.contains("USE#1")).unwrap();
        assert!(label.starts_with("<text "));
        assert!(label.contains("><title>mean |attribution| 0.4500</title>USE#1</text>"));
        assert_eq!(svg.matches("<title>").count(), 1);
    }

    #[test]
    fn test_labels_are_escaped() {
        let svg = render_summary_plot(&attribution(), 3, "a & b");
        assert!(svg.contains("LIWC_&lt;i&gt;"));
        assert!(svg.contains("a &amp; b"));
    }

    #[test]
    fn test_write_creates_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = summary_plot_path(&dir.path().join("results"), "semeval", "LIWC", 0, 10);
        write_summary_plot(&attribution(), 20, "LIWC", &path).unwrap();
        assert!(path.exists());
    }
}
