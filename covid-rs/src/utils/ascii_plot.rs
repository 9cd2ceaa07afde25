use crate::prelude::Real;
use std::iter;

/// Log10 of a value for plotting, with non-positive values mapped to zero
/// like the ylim=(1, None) axis of the dashboard.
fn log_height(x: Real) -> Real {
    if x > 1.0 {
        x.log10()
    } else {
        0.0
    }
}

/// ASCII plot of a sequence of positive values horizontally in log scale.
///
/// Each value is a row of '='s whose length is proportional to log10(x),
/// prefixed by a label.
pub fn render_log_hbars<L: AsRef<str>>(rows: &[(L, Real)], width: usize) -> String {
    let max = rows.iter().map(|r| log_height(r.1)).fold(0.0, Real::max);
    let pad = rows.iter().map(|r| r.0.as_ref().len()).max().unwrap_or(0);
    let mut out = String::new();

    for (label, x) in rows {
        let n = if max > 0.0 {
            (log_height(*x) / max * width as Real).round() as usize
        } else {
            0
        };
        out.push_str(&format!("{:>pad$} |", label.as_ref(), pad = pad));
        out.extend(iter::repeat('=').take(n));
        out.push_str(&format!(" {:.0}\n", x));
    }
    return out;
}

/// ASCII plot of a sequence of positive values in log scale.
///
/// Draw each point as a column filled with '*'s up to the maximum height.
pub fn render_log_vbars(values: &[Real], height: usize) -> String {
    if values.is_empty() || height == 0 {
        return String::new();
    }
    let max = values.iter().map(|x| log_height(*x)).fold(0.0, Real::max);
    let step = max / height as Real;
    let mut out = String::new();

    for i in 0..height {
        let h = (height - i) as Real * step;
        out.extend(
            values
                .iter()
                .map(|&x| if step > 0.0 && log_height(x) >= h { '*' } else { ' ' }),
        );
        out.push('\n');
    }
    out.extend(iter::repeat('-').take(values.len()));
    out.push('\n');
    return out;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hbars_scale_with_log() {
        let plot = render_log_hbars(&[("a", 10.0), ("bb", 100.0), ("c", 0.25)], 10);
        let lines: Vec<&str> = plot.lines().collect();
        assert_eq!(lines[0], " a |===== 10");
        assert_eq!(lines[1], "bb |========== 100");
        assert_eq!(lines[2], " c | 0");
    }

    #[test]
    fn vbars_fill_columns() {
        let plot = render_log_vbars(&[1.0, 10.0, 100.0], 2);
        assert_eq!(plot, "  *\n **\n---\n");
        assert!(render_log_vbars(&[], 3).is_empty());
    }
}
