// Registry tests - aggregating stdio tool servers
//
// Every test spawns the `mock-tool-server` binary built from this package.

mod common;

use common::{mock_server, mock_server_with_env, sandbox};
use serde_json::json;
use std::time::{Duration, Instant};
use toolhost_core::config::ServerDefinition;
use toolhost_core::tooling::{TRUNCATION_MARKER, ToolRegistry};
use toolhost_core::types::ToolCall;

fn qualified_names(tools: &[toolhost_core::types::ExecutableTool]) -> Vec<String> {
    tools.iter().map(|tool| tool.qualified_name()).collect()
}

#[tokio::test]
async fn one_failing_server_does_not_block_the_others() {
    let registry = ToolRegistry::new();
    let definitions = vec![
        mock_server("alpha"),
        ServerDefinition::stdio("broken", "/nonexistent/toolhost/server", Vec::new()),
        mock_server("beta"),
    ];

    let report = registry.connect(&definitions).await;

    assert_eq!(report.connected, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].server, "broken");
    assert_eq!(registry.connected_servers().await.len(), 2);

    let names = qualified_names(&registry.list_tools().await);
    assert!(names.contains(&"alpha__echo".to_string()));
    assert!(names.contains(&"beta__echo".to_string()));
    assert!(!names.iter().any(|name| name.starts_with("broken__")));

    registry.disconnect().await;
    assert!(registry.connected_servers().await.is_empty());
    assert!(registry.list_tools().await.is_empty());
}

#[tokio::test]
async fn allow_and_deny_lists_shape_the_catalog() {
    let registry = ToolRegistry::new();
    let definitions = vec![
        mock_server("files").with_allowed_tools(["fs_*"]),
        mock_server("strict")
            .with_allowed_tools(["fs_*"])
            .with_blocked_tools(["fs_write"]),
    ];
    registry.connect(&definitions).await;

    let mut names = qualified_names(&registry.list_tools().await);
    names.sort();
    assert_eq!(
        names,
        vec!["files__fs_read", "files__fs_write", "strict__fs_read"]
    );

    let denied = registry
        .execute_tool(&ToolCall::new("c1", "strict__fs_write", json!({})))
        .await;
    assert!(denied.is_error);
    assert!(denied.content.contains("not permitted"));

    registry.disconnect().await;
}

#[tokio::test]
async fn echo_call_returns_text_content_only() {
    let registry = ToolRegistry::new();
    registry.connect(&[mock_server("alpha")]).await;

    let result = registry
        .execute_tool(&ToolCall::new("c1", "alpha__echo", json!({"text": "hello"})))
        .await;

    assert!(!result.is_error, "unexpected error: {}", result.content);
    assert_eq!(result.call_id, "c1");
    assert_eq!(result.content, "hello");

    let explicit = registry
        .execute_tool(&ToolCall::new("c2", "echo", json!({"text": "again"})).on_server("alpha"))
        .await;
    assert_eq!(explicit.content, "again");

    registry.disconnect().await;
}

#[tokio::test]
async fn server_reported_errors_become_error_results() {
    let registry = ToolRegistry::new();
    registry.connect(&[mock_server("alpha")]).await;

    let reported = registry
        .execute_tool(&ToolCall::new("c1", "alpha__fail", json!({})))
        .await;
    assert!(reported.is_error);
    assert_eq!(reported.content, "tool reported failure");

    let rpc_error = registry
        .execute_tool(&ToolCall::new("c2", "alpha__missing", json!({})))
        .await;
    assert!(rpc_error.is_error);
    assert!(rpc_error.content.starts_with("Tool execution failed"));

    registry.disconnect().await;
}

#[tokio::test]
async fn timed_out_call_leaves_connection_usable() {
    let registry = ToolRegistry::new();
    registry
        .connect(&[mock_server("alpha").with_sandbox(sandbox(200, 102_400))])
        .await;

    let started = Instant::now();
    let slow = registry
        .execute_tool(&ToolCall::new("c1", "alpha__slow", json!({"ms": 5_000})))
        .await;
    let waited = started.elapsed();

    assert!(slow.is_error);
    assert!(slow.content.contains("timed out after 200ms"), "{}", slow.content);
    assert!(waited < Duration::from_secs(4), "waited {waited:?}");
    assert!(slow.elapsed_ms >= 200);

    let fast = registry
        .execute_tool(&ToolCall::new("c2", "alpha__echo", json!({"text": "still here"})))
        .await;
    assert!(!fast.is_error, "unexpected error: {}", fast.content);
    assert_eq!(fast.content, "still here");

    registry.disconnect().await;
}

#[tokio::test]
async fn slow_call_does_not_block_other_calls() {
    let registry = ToolRegistry::new();
    registry.connect(&[mock_server("alpha")]).await;

    let slow_call = ToolCall::new("c1", "alpha__slow", json!({"ms": 600}));
    let fast_call = ToolCall::new("c2", "alpha__echo", json!({"text": "quick"}));
    let started = Instant::now();
    let (slow, fast) = tokio::join!(
        registry.execute_tool(&slow_call),
        async {
            let result = registry.execute_tool(&fast_call).await;
            (result, started.elapsed())
        }
    );

    assert_eq!(slow.content, "slept 600ms");
    assert_eq!(fast.0.content, "quick");
    assert!(fast.1 < Duration::from_millis(600), "fast call waited {:?}", fast.1);

    registry.disconnect().await;
}

#[tokio::test]
async fn oversized_output_is_truncated() {
    let registry = ToolRegistry::new();
    registry
        .connect(&[mock_server("alpha").with_sandbox(sandbox(30_000, 64))])
        .await;

    let big = registry
        .execute_tool(&ToolCall::new("c1", "alpha__big", json!({"size": 500})))
        .await;
    assert!(!big.is_error);
    assert!(big.content.ends_with(TRUNCATION_MARKER));
    assert_eq!(big.content.len(), 64 + TRUNCATION_MARKER.len());

    let exact = registry
        .execute_tool(&ToolCall::new("c2", "alpha__big", json!({"size": 64})))
        .await;
    assert_eq!(exact.content, "x".repeat(64));

    registry.disconnect().await;
}

#[tokio::test]
async fn paginated_discovery_collects_every_page() {
    let registry = ToolRegistry::new();
    registry
        .connect(&[mock_server_with_env("paged", &[("MOCK_PAGE_SIZE", "2")])])
        .await;

    let tools = registry.list_tools().await;
    assert_eq!(tools.len(), 7);
    assert!(tools.iter().all(|tool| tool.server == "paged"));

    registry.disconnect().await;
}

#[tokio::test]
async fn endless_pagination_stops_at_the_page_limit() {
    let registry = ToolRegistry::new().with_handshake_timeout(Duration::from_secs(5));
    registry
        .connect(&[mock_server_with_env("looping", &[("MOCK_ENDLESS_CURSOR", "1")])])
        .await;

    let started = Instant::now();
    let tools = registry.list_tools().await;

    // 32 pages of the full 7-tool catalog, then discovery gives up on the cursor.
    assert_eq!(tools.len(), 32 * 7);
    assert!(started.elapsed() < Duration::from_secs(5));

    registry.disconnect().await;
}

#[tokio::test]
async fn instructions_from_initialize_are_exposed() {
    let registry = ToolRegistry::new();
    registry
        .connect(&[
            mock_server_with_env("guided", &[("MOCK_INSTRUCTIONS", "Always pass absolute paths.")]),
            mock_server("plain"),
        ])
        .await;

    assert_eq!(
        registry.server_instructions().await,
        vec![("guided".to_string(), "Always pass absolute paths.".to_string())]
    );

    registry.disconnect().await;
}

#[tokio::test]
async fn unresponsive_server_fails_handshake_within_bound() {
    let registry = ToolRegistry::new().with_handshake_timeout(Duration::from_millis(300));
    let started = Instant::now();

    let report = registry
        .connect(&[mock_server_with_env("mute", &[("MOCK_SILENT", "1")]), mock_server("alpha")])
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.connected, vec!["alpha".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].server, "mute");
    assert!(report.failed[0].reason.contains("timed out"));

    registry.disconnect().await;
}

#[tokio::test]
async fn reconnect_replaces_previous_set_and_cache() {
    let registry = ToolRegistry::new();
    registry.connect(&[mock_server("first")]).await;
    assert!(
        qualified_names(&registry.list_tools().await).contains(&"first__echo".to_string())
    );

    registry
        .connect(&[mock_server("second").with_allowed_tools(["echo"])])
        .await;

    assert_eq!(registry.connected_servers().await, vec!["second".to_string()]);
    assert_eq!(
        qualified_names(&registry.list_tools().await),
        vec!["second__echo".to_string()]
    );
    let stale = registry
        .execute_tool(&ToolCall::new("c1", "first__echo", json!({"text": "x"})))
        .await;
    assert!(stale.is_error);
    assert!(stale.content.contains("not connected"));

    registry.disconnect().await;
}
