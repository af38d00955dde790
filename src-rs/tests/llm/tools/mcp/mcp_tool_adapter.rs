use crate::error::HarnessError;
use crate::llm::tools::mcp::mcp_tool_adapter::render_call_result;
use crate::llm::tools::mcp::McpTool;
use crate::llm::tools::tool_base::Tool;
use crate::tests::support::{descriptor, FakeToolProvider};
use serde_json::json;
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_items_are_joined_by_newline() {
        let result = json!({
            "content": [
                { "type": "text", "text": "Navigated to https://www.bing.com/news" },
                { "type": "text", "text": "Page title: Bing News" }
            ]
        });
        assert_eq!(
            render_call_result("open_url", &result).unwrap(),
            "Navigated to https://www.bing.com/news\nPage title: Bing News"
        );
    }

    #[test]
    fn binary_and_resource_items_are_summarized() {
        let result = json!({
            "content": [
                { "type": "image", "data": "iVBORw0...", "mimeType": "image/png" },
                { "type": "resource", "resource": { "uri": "file:///tmp/page.pdf" } },
                { "type": "resource", "resource": { "uri": "mem://a", "text": "inline" } }
            ]
        });
        assert_eq!(
            render_call_result("screenshot", &result).unwrap(),
            "[image content: image/png]\n[resource: file:///tmp/page.pdf]\ninline"
        );
    }

    #[test]
    fn structured_content_is_used_when_there_is_no_content() {
        let result = json!({ "content": [], "structuredContent": { "count": 3 } });
        assert_eq!(render_call_result("count", &result).unwrap(), r#"{"count":3}"#);
    }

    #[test]
    fn is_error_becomes_invocation_error() {
        let result = json!({
            "content": [{ "type": "text", "text": "Timeout 5000ms exceeded" }],
            "isError": true
        });
        match render_call_result("browser_click", &result) {
            Err(HarnessError::Invocation(msg)) => {
                assert!(msg.contains("browser_click"));
                assert!(msg.contains("Timeout 5000ms exceeded"));
            }
            other => panic!("expected invocation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invoke_forwards_arguments_under_the_remote_name() {
        let provider = Arc::new(FakeToolProvider::default());
        let tool = McpTool::new(Arc::clone(&provider), descriptor("open_url", "Open a page"));

        let output = tool.invoke(json!({ "url": "https://example.com" })).await.unwrap();

        assert!(output.starts_with("open_url ok"));
        assert_eq!(provider.calls()[0].0, "open_url");
        assert_eq!(tool.name(), "open_url");
        assert_eq!(tool.description(), "Open a page");
    }
}
