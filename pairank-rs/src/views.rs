//! HTML views for raters
//!
//! Templates are static files with `{{NAME}}` placeholders. Every value is
//! HTML-escaped before substitution, and substitution is a single pass so
//! a value can never introduce a placeholder of its own.

use pairank_common::Task;

const TASK_HTML: &str = include_str!("ui/task.html");
const COMPLETE_HTML: &str = include_str!("ui/complete.html");

/// Task presentation page with the vote form
pub fn render_task(rater_id: &str, task: &Task, position: usize, total: usize) -> String {
    let mut input_block = String::new();
    if let Some(text) = task.input_text() {
        input_block.push_str(&format!(
            "<p><strong>Prompt:</strong> {}</p>",
            escape_html(text)
        ));
    }
    if let Some(image) = task.input_image() {
        input_block.push_str(&format!(
            "<img src=\"{}\" alt=\"Input Image\" style=\"max-width:300px;\"/><br>",
            escape_html(image)
        ));
    }

    let rater_id = escape_html(rater_id);
    let datapoint_id = escape_html(&task.datapoint_id);
    let left_weight = escape_html(&task.left_weight);
    let right_weight = escape_html(&task.right_weight);
    let left_output = escape_html(&task.left_output);
    let right_output = escape_html(&task.right_output);
    let position = (position + 1).to_string();
    let total = total.to_string();

    render(
        TASK_HTML,
        &[
            ("RATER_ID", rater_id.as_str()),
            ("DATAPOINT_ID", datapoint_id.as_str()),
            ("LEFT_WEIGHT", left_weight.as_str()),
            ("RIGHT_WEIGHT", right_weight.as_str()),
            ("LEFT_OUTPUT", left_output.as_str()),
            ("RIGHT_OUTPUT", right_output.as_str()),
            ("POSITION", position.as_str()),
            ("TOTAL", total.as_str()),
            // Already escaped piecewise above
            ("INPUT_BLOCK", input_block.as_str()),
        ],
    )
}

/// Page shown once a rater has no tasks left
pub fn render_completed(total: usize) -> String {
    let total = total.to_string();
    render(COMPLETE_HTML, &[("TOTAL", total.as_str())])
}

/// Substitute `{{KEY}}` placeholders; unknown placeholders are left as-is
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
