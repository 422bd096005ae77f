use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{DeviceAnalysis, DeviceStatistics, ProblemEntry, Recommendation, Report, Severity};

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "An error occurred: {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "Caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }
}

pub fn print_report(report: &Report, cfg: &UiConfig) {
    let mut out = io::stdout().lock();
    let _ = render_report(&mut out, report, cfg);
    let _ = out.flush();
}

pub fn render_report(out: &mut dyn Write, report: &Report, cfg: &UiConfig) -> io::Result<()> {
    writeln!(out, "=== Audio driver status ===")?;
    writeln!(
        out,
        "audiodiag {}  OS: {} {}  generated: {}",
        report.tool_version, report.os.name, report.os.version, report.generated_at
    )?;
    writeln!(out)?;

    if report.is_empty() {
        writeln!(out, "No audio devices were found.")?;
        return Ok(());
    }

    writeln!(out, "Audio devices found: {}", report.devices.len())?;
    writeln!(out)?;
    for analysis in &report.devices {
        render_device(out, analysis, cfg)?;
    }

    render_problems(out, &report.problems, cfg)?;
    if let Some(statistics) = &report.statistics {
        render_statistics(out, statistics)?;
    }
    render_recommendations(out, &report.recommendations, cfg)?;
    Ok(())
}

fn render_device(out: &mut dyn Write, analysis: &DeviceAnalysis, cfg: &UiConfig) -> io::Result<()> {
    let d = &analysis.device;
    let mut rows: Vec<(&str, String)> = vec![
        ("Name", d.name.clone()),
        ("Manufacturer", d.manufacturer.clone()),
        ("Device ID", d.device_id.clone()),
        ("Driver version", d.driver_version.clone()),
        ("Driver date", d.driver_date.clone()),
        ("Status", d.status.clone()),
        ("Class", d.device_class.clone()),
        ("Service", d.service_name.clone()),
    ];
    if cfg.verbose {
        rows.push(("Description", d.description.clone()));
        rows.push(("Hardware ID", d.hardware_id.clone()));
        rows.push((
            "Problem code",
            d.problem_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }

    let label_w = rows
        .iter()
        .map(|(label, _)| visible_width_ansi(label))
        .max()
        .unwrap_or(0)
        + 1;
    for (label, value) in &rows {
        writeln!(out, "{} {value}", pad_end_display(&format!("{label}:"), label_w))?;
    }

    writeln!(out)?;
    let severity = analysis.verdict.severity();
    if analysis.verdict.healthy {
        writeln!(out, "{}", paint("Working normally", severity, cfg.color))?;
    } else {
        writeln!(out, "{}", paint("Needs attention:", severity, cfg.color))?;
        for issue in &analysis.verdict.issues {
            writeln!(out, "  - {issue}")?;
        }
    }
    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    Ok(())
}

fn render_problems(out: &mut dyn Write, problems: &[ProblemEntry], cfg: &UiConfig) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Problem devices ===")?;
    if problems.is_empty() {
        writeln!(
            out,
            "{}",
            paint("All audio devices are working normally.", Severity::Ok, cfg.color)
        )?;
        return Ok(());
    }

    let heading = format!("{} device(s) have problems:", problems.len());
    writeln!(out, "{}", paint(&heading, Severity::Critical, cfg.color))?;
    for problem in problems {
        writeln!(out, "  - {}: {}", problem.name, problem.reason)?;
    }
    Ok(())
}

fn render_statistics(out: &mut dyn Write, statistics: &DeviceStatistics) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Device statistics ===")?;
    let sections = [
        ("By device class:", &statistics.class_count),
        ("By status:", &statistics.status_count),
        ("By manufacturer:", &statistics.manufacturer_count),
    ];
    for (title, counts) in sections {
        writeln!(out)?;
        writeln!(out, "{title}")?;
        let key_w = counts
            .keys()
            .map(|k| visible_width_ansi(k))
            .max()
            .unwrap_or(0);
        for (key, count) in counts {
            writeln!(out, "  {}  {count}", pad_end_display(key, key_w))?;
        }
    }
    Ok(())
}

fn render_recommendations(
    out: &mut dyn Write,
    recommendations: &[Recommendation],
    cfg: &UiConfig,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Recommendations ===")?;
    for rec in recommendations {
        writeln!(
            out,
            "{} {}",
            paint(&format!("[{}]", severity_label(rec.severity)), rec.severity, cfg.color),
            rec.title
        )?;
        let numbered = rec.severity >= Severity::Warning;
        for (idx, step) in rec.steps.iter().enumerate() {
            if numbered {
                writeln!(out, "  {}. {step}", idx + 1)?;
            } else {
                writeln!(out, "  - {step}")?;
            }
        }
        if !rec.steps.is_empty() {
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Blocks until any key is pressed.
pub fn wait_for_keypress() {
    use crossterm::event::{self, Event, KeyEventKind};
    use crossterm::terminal;

    {
        let mut out = io::stdout().lock();
        let _ = writeln!(out);
        let _ = writeln!(out, "Press any key to exit...");
        let _ = out.flush();
    }

    if terminal::enable_raw_mode().is_err() {
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        return;
    }
    loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    let _ = terminal::disable_raw_mode();
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "OK",
        Severity::Info => "INFO",
        Severity::Warning => "UPDATE",
        Severity::Critical => "URGENT",
    }
}

fn paint(s: &str, severity: Severity, color: bool) -> String {
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Severity::Ok => "32",
        Severity::Info => "36",
        Severity::Warning => "33",
        Severity::Critical => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
