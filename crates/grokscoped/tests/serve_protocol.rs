use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use grokscope_search::{LineMatch, SearchBackend, SearchError, SearchRequest, SearchResults};
use grokscope_session::{HostIntent, MessageLevel, Session, TagStyleRegistry};
use grokscope_store::SqliteAnnotationStore;
use grokscoped::serve::{Response, Server};
use tempfile::{TempDir, tempdir};

struct FixedBackend;

#[async_trait]
impl SearchBackend for FixedBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        let mut results = SearchResults::new();
        results.insert(
            "/drivers/net.c".to_owned(),
            vec![LineMatch {
                line: format!("int {}(void)", request.term),
                line_number: 88,
            }],
        );
        Ok(results)
    }

    async fn verify(&self) -> Result<(), SearchError> {
        Ok(())
    }
}

fn server(with_backend: bool) -> (TempDir, Server<SqliteAnnotationStore>) {
    let temp = tempdir().expect("tempdir");
    let store =
        SqliteAnnotationStore::open(temp.path().join("annotations.sqlite")).expect("open store");
    let session = Session::new(store, TagStyleRegistry::default(), Some("/src".to_owned()));
    let backend = with_backend.then(|| Arc::new(FixedBackend) as Arc<dyn SearchBackend>);
    (temp, Server::new(session, backend))
}

#[tokio::test]
async fn query_goto_and_jump_back_over_the_protocol() {
    let (_temp, mut server) = server(true);

    let response = server
        .handle_line(
            r#"{"command":"query","query_type":"g","term":"open_port","origin":{"path":"/src/main.c","line":9,"column":2}}"#,
        )
        .await;
    assert!(response.ok, "{response:?}");
    let [HostIntent::ShowResults { lines, .. }] = response.intents.as_slice() else {
        panic!("expected results popup, got {response:?}");
    };
    assert_eq!(lines[1], "0 /drivers/net.c:88");

    let response = server
        .handle_line(r#"{"command":"goto","viewport":1000,"index":0}"#)
        .await;
    assert!(response.ok, "{response:?}");
    assert_eq!(
        response.intents[1],
        HostIntent::Navigate {
            path: "/src/drivers/net.c".to_owned(),
            line: 88,
            column: None,
        }
    );

    let response = server
        .handle_line(r#"{"command":"jump_back","viewport":1000}"#)
        .await;
    assert_eq!(
        response.intents,
        vec![HostIntent::Navigate {
            path: "/src/main.c".to_owned(),
            line: 9,
            column: Some(2),
        }]
    );

    let response = server
        .handle_line(r#"{"command":"jump_back","viewport":1000}"#)
        .await;
    assert!(!response.ok);
    assert!(matches!(
        response.intents.as_slice(),
        [HostIntent::Message { .. }]
    ));
}

#[tokio::test]
async fn annotations_round_trip_over_the_protocol() {
    let (temp, mut server) = server(false);
    let file = temp.path().join("net.c");
    fs::write(&file, "").expect("write source");
    let file = serde_json::to_string(&file).expect("encode path");

    let response = server
        .handle_line(&format!(
            r#"{{"command":"edit_annotation","file":{file},"line":7,"note":"leak","tags":["Bug"]}}"#
        ))
        .await;
    assert!(response.ok, "{response:?}");
    assert!(matches!(
        response.intents.as_slice(),
        [HostIntent::PlaceMarker { id: 1001, line: 7, .. }]
    ));

    let response = server
        .handle_line(&format!(
            r#"{{"command":"annotation_at","file":{file},"line":7}}"#
        ))
        .await;
    let annotation = response.annotation.expect("annotation cached");
    assert_eq!(annotation.note, "leak");
    assert_eq!(annotation.tags, vec!["bug".to_owned()]);

    let response = server
        .handle_line(&format!(
            r#"{{"command":"edit_annotation","file":{file},"line":7}}"#
        ))
        .await;
    assert!(matches!(
        response.intents.as_slice(),
        [HostIntent::RemoveMarker { id: 1001, .. }]
    ));
    assert!(server.session().markers().is_empty());
}

fn assert_reported(response: &Response) {
    assert!(!response.ok, "{response:?}");
    let error = response.error.as_deref().expect("error text");
    assert_eq!(
        response.intents,
        vec![HostIntent::Message {
            level: MessageLevel::Error,
            text: error.to_owned(),
        }]
    );
}

#[tokio::test]
async fn bad_requests_produce_error_responses() {
    let (_temp, mut server) = server(false);

    let response = server.handle_line("not json").await;
    assert_reported(&response);
    assert!(
        response
            .error
            .as_deref()
            .is_some_and(|error| error.starts_with("invalid request"))
    );

    let response = server
        .handle_line(r#"{"command":"query","query_type":"grep","term":"x"}"#)
        .await;
    assert_reported(&response);

    let response = server
        .handle_line(r#"{"command":"query","query_type":"sym","term":"x"}"#)
        .await;
    assert_reported(&response);
    assert_eq!(
        response.error.as_deref(),
        Some("server.address is not configured")
    );

    let response = server
        .handle_line(r#"{"command":"register_style","tag":"bug","glyph":"abc","highlight":"Error"}"#)
        .await;
    assert_reported(&response);
}
