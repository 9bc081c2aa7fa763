//! XML-style tool call adapter (C9).
//!
//! Some local models do not natively emit OpenAI-style `tool_calls` deltas and instead write
//! a textual convention:
//!
//! ```text
//! <function=search_memories>
//! <parameter=query>user name</parameter>
//! </function>
//! ```
//!
//! This is a pure function over a completed text segment (the pipeline only calls it once a
//! message is known not to contain a native tool-call delta). The outer `</function>` tag is
//! optional: a model that never closes its last function block still parses.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::message::ToolCall;

static FUNCTION_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<function=([^>]+)>.*?(?:</function>|$)").unwrap());
static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"<function=([^>]+)>").unwrap());
static PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<parameter=([^>]+)>([^<]*)</parameter>").unwrap());

/// Returns true if `text` contains at least one `<function=...>` marker.
pub fn contains_xml_function_call(text: &str) -> bool {
    FUNCTION_NAME.is_match(text)
}

/// Parses every `<function=...>...</function>` block in `text` into a [`ToolCall`], in the
/// order they appear. Blocks with no parameters produce an empty-object arguments value.
/// Text with no `<function=...>` marker yields an empty vec.
pub fn parse_xml_tool_calls(text: &str) -> Vec<ToolCall> {
    FUNCTION_BLOCK
        .find_iter(text)
        .filter_map(|block| parse_one_block(block.as_str()))
        .collect()
}

fn parse_one_block(block: &str) -> Option<ToolCall> {
    let name = FUNCTION_NAME
        .captures(block)?
        .get(1)?
        .as_str()
        .trim()
        .to_string();

    let mut arguments = serde_json::Map::new();
    for caps in PARAMETER.captures_iter(block) {
        let key = caps.get(1)?.as_str().trim().to_string();
        let value = caps.get(2)?.as_str().trim().to_string();
        arguments.insert(key, serde_json::Value::String(value));
    }

    Some(ToolCall {
        id: format!("call_{}", Uuid::new_v4().simple()),
        name,
        arguments: serde_json::Value::Object(arguments),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_closed_function_block() {
        let text = "<function=search_memories>\n<parameter=query>user name</parameter>\n</function>";
        let calls = parse_xml_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_memories");
        assert_eq!(calls[0].arguments["query"], "user name");
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn tolerates_missing_closing_function_tag() {
        let text = "<function=echo_tool>\n<parameter=text>hi</parameter>";
        let calls = parse_xml_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "echo_tool");
        assert_eq!(calls[0].arguments["text"], "hi");
    }

    #[test]
    fn parses_multiple_blocks_in_textual_order() {
        let text = "<function=a><parameter=x>1</parameter></function>\nsome text\n<function=b><parameter=y>2</parameter></function>";
        let calls = parse_xml_tool_calls(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[1].name, "b");
    }

    #[test]
    fn no_function_marker_yields_empty_vec() {
        assert!(parse_xml_tool_calls("just plain assistant text").is_empty());
        assert!(!contains_xml_function_call("just plain assistant text"));
    }

    #[test]
    fn block_with_no_parameters_has_empty_object_arguments() {
        let calls = parse_xml_tool_calls("<function=ping></function>");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn distinct_calls_receive_distinct_ids() {
        let text = "<function=a></function><function=a></function>";
        let calls = parse_xml_tool_calls(text);
        assert_ne!(calls[0].id, calls[1].id);
    }
}
