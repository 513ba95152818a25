//! Text parsers for the two log channels.
use knit_model::{ContainerId, ContainerLogs, LogBundle};

const MISSING_LOG: &str = "Cannot find this log";

/// Pull the log body out of a node manager's container-log page.
///
/// The page wraps the text in `<td class="content"><pre>…</pre></td>`; a page
/// reporting a missing log yields an empty string.
pub fn extract_log_content(page: &str) -> String {
    if page.contains(MISSING_LOG) {
        return String::new();
    }
    let Some(start) = page.find("<td class=\"content\">") else {
        return page.trim().to_string();
    };
    let body = &page[start + "<td class=\"content\">".len()..];
    let body = match body.find("</td>") {
        Some(end) => &body[..end],
        None => body,
    };
    let body = body.trim();
    let body = body.strip_prefix("<pre>").unwrap_or(body);
    let body = body.strip_suffix("</pre>").unwrap_or(body);
    body.to_string()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
    Other,
}

/// Parse the aggregated text printed by `yarn logs -applicationId <id>`.
///
/// Sections look like:
///
/// ```text
/// Container: container_1_0001_01_000002 on node1_45454
/// ====================================================
/// LogType:stdout
/// LogLength:6
/// Log Contents:
/// hello
/// End of LogType:stdout
/// ```
///
/// Log types other than stdout/stderr are skipped.
pub fn parse_aggregated_logs(text: &str) -> LogBundle {
    let mut bundle = LogBundle::new();
    let mut current: Option<(ContainerId, ContainerLogs)> = None;
    let mut stream = Stream::Other;
    let mut in_contents = false;

    for line in text.lines() {
        if let Some((id, node)) = container_header(line) {
            if let Some((id, logs)) = current.take() {
                bundle.insert(id, logs);
            }
            current = Some((
                ContainerId::new(id),
                ContainerLogs {
                    node_id: node.to_string(),
                    ..ContainerLogs::default()
                },
            ));
            stream = Stream::Other;
            in_contents = false;
            continue;
        }
        if line.starts_with("End of LogType:") {
            in_contents = false;
            continue;
        }
        if let Some(kind) = line.strip_prefix("LogType:") {
            stream = match kind.trim() {
                "stdout" => Stream::Stdout,
                "stderr" => Stream::Stderr,
                _ => Stream::Other,
            };
            in_contents = false;
            continue;
        }
        if line.starts_with("Log Contents:") {
            in_contents = true;
            continue;
        }
        if !in_contents {
            continue;
        }
        let Some((_, logs)) = current.as_mut() else {
            continue;
        };
        let target = match stream {
            Stream::Stdout => &mut logs.stdout,
            Stream::Stderr => &mut logs.stderr,
            Stream::Other => continue,
        };
        if !target.is_empty() {
            target.push('\n');
        }
        target.push_str(line);
    }

    if let Some((id, logs)) = current.take() {
        bundle.insert(id, logs);
    }
    bundle
}

fn container_header(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim().strip_prefix("Container: ")?;
    let (id, node) = rest.split_once(" on ")?;
    let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid(id) {
        return None;
    }
    Some((id, node.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_page_content_is_unwrapped() {
        let page = r#"<html><table><tr><td class="content"><pre>line one
line two</pre></td></tr></table></html>"#;
        assert_eq!(extract_log_content(page), "line one\nline two");
    }

    #[test]
    fn missing_live_log_is_empty() {
        let page = "<p>Cannot find this log on the local disk.</p>";
        assert_eq!(extract_log_content(page), "");
    }

    #[test]
    fn aggregated_sections_split_by_container_and_stream() {
        let text = "\
Container: container_1_0001_01_000001 on node1_45454
====================================================
LogType:stderr
LogLength:4
Log Contents:
boom
End of LogType:stderr
LogType:stdout
LogLength:0
Log Contents:

Container: container_1_0001_01_000002 on node2.example.com_45454
====================================================
LogType:stdout
LogLength:11
Log Contents:
hello
world
LogType:launch_container.sh
Log Contents:
#!/bin/bash
";
        let bundle = parse_aggregated_logs(text);
        assert_eq!(bundle.len(), 2);

        let am = bundle
            .get(&ContainerId::from("container_1_0001_01_000001"))
            .unwrap();
        assert_eq!(am.node_id, "node1_45454");
        assert_eq!(am.stderr, "boom");

        let worker = bundle
            .get(&ContainerId::from("container_1_0001_01_000002"))
            .unwrap();
        assert_eq!(worker.node_id, "node2.example.com_45454");
        assert_eq!(worker.stdout, "hello\nworld");
        assert!(!worker.stdout.contains("#!/bin/bash"));
        assert_eq!(worker.stderr, "");
    }

    #[test]
    fn text_without_headers_is_empty() {
        assert!(parse_aggregated_logs("nothing aggregated yet\n").is_empty());
    }
}
