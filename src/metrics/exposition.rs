//! Prometheus text exposition format renderer.

use super::descriptor::DescriptorTable;
use super::snapshot::Snapshot;
use core::fmt::Write;

/// Content type of the rendered output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a snapshot. HELP and TYPE lines are written once, before the first sample of each metric.
#[must_use]
pub fn render(snapshot: &Snapshot, table: &DescriptorTable) -> String {
    let mut output = String::new();
    let mut current = None;

    for record in snapshot.records() {
        let Some(descriptor) = table.get(record.id) else {
            continue;
        };

        if current != Some(record.id) {
            let _ = writeln!(output, "# HELP {} {}", descriptor.name, escape_help(descriptor.help));
            let _ = writeln!(output, "# TYPE {} {}", descriptor.name, descriptor.kind.as_str());
            current = Some(record.id);
        }

        if record.labels.is_empty() {
            let _ = writeln!(output, "{} {}", descriptor.name, format_value(record.value));
        } else {
            let labels: Vec<String> = descriptor
                .labels
                .iter()
                .zip(&record.labels)
                .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
                .collect();
            let _ = writeln!(output, "{}{{{}}} {}", descriptor.name, labels.join(","), format_value(record.value));
        }
    }

    output
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() { "+Inf" } else { "-Inf" }.to_string()
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricId, SnapshotBuilder};

    #[test]
    fn test_render_zero_label_metric() {
        let table = DescriptorTable::default();
        let mut builder = SnapshotBuilder::new(&table);
        builder.push_count(MetricId::ProjectCount, &[], 3);
        let output = render(&builder.build(), &table);

        assert_eq!(
            output,
            "# HELP bitbucket_project_count Number of projects\n# TYPE bitbucket_project_count gauge\nbitbucket_project_count 3\n"
        );
    }

    #[test]
    fn test_render_labels_in_descriptor_order() {
        let table = DescriptorTable::default();
        let mut builder = SnapshotBuilder::new(&table);
        builder.push_count(MetricId::ExporterErrorsTotal, &["transport", "commits"], 2);
        let output = render(&builder.build(), &table);

        assert!(output.contains("# TYPE bitbucket_exporter_errors_total counter"));
        assert!(output.contains("bitbucket_exporter_errors_total{error_type=\"transport\",component=\"commits\"} 2"));
    }

    #[test]
    fn test_help_and_type_once_per_metric() {
        let table = DescriptorTable::default();
        let mut builder = SnapshotBuilder::new(&table);
        builder.push_count(MetricId::ApiRateLimitRemaining, &["a"], 1);
        builder.push_count(MetricId::ApiRateLimitRemaining, &["b"], 2);
        let output = render(&builder.build(), &table);

        assert_eq!(output.matches("# HELP bitbucket_api_rate_limit_remaining").count(), 1);
        assert_eq!(output.matches("# TYPE bitbucket_api_rate_limit_remaining").count(), 1);
        assert!(output.contains("bitbucket_api_rate_limit_remaining{bucket=\"a\"} 1"));
        assert!(output.contains("bitbucket_api_rate_limit_remaining{bucket=\"b\"} 2"));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("hello\\world"), "hello\\\\world");
        assert_eq!(escape_label_value("Alice \"Al\" <al@example.com>"), "Alice \\\"Al\\\" <al@example.com>");
        assert_eq!(escape_label_value("line1\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(1.5), "1.5");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
