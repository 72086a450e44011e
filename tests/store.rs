//! Persona store integration tests
//!
//! Runs the Notion client against an in-process mock of the search API

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde_json::{Value, json};
use toast_gateway::persona::DEFAULT_VOICE_ID;
use toast_gateway::session::AgentSession;
use toast_gateway::store::list_personas;
use toast_gateway::{NotionStore, Persona, SessionController, get_persona};

mod common;
use common::{MOM_VOICE, RecordingSession, spawn_server};

const DATABASE_ID: &str = "d9824bdc-8445-4327-be8b-5b47500af6ce";

#[derive(Default)]
struct MockNotion {
    requests: Mutex<Vec<(HeaderMap, Value)>>,
    fail: bool,
}

fn rich_text(content: &str) -> Value {
    json!([{"type": "text", "text": {"content": content}, "plain_text": content}])
}

fn persona_page(name: &str, backstory: &str, voice_id: &str, database_id: &str) -> Value {
    json!({
        "object": "page",
        "parent": {"type": "database_id", "database_id": database_id},
        "properties": {
            "Name": {"type": "title", "title": rich_text(name)},
            "Backstory": {"type": "rich_text", "rich_text": rich_text(backstory)},
            "Roast Style": {"type": "rich_text", "rich_text": rich_text("Blunt.")},
            "Voice Vibe": {"type": "rich_text", "rich_text": rich_text("Warm")},
            "Voice ID": {"type": "rich_text", "rich_text": rich_text(voice_id)}
        }
    })
}

async fn search(
    State(mock): State<Arc<MockNotion>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.requests.lock().unwrap().push((headers, body.clone()));

    if mock.fail {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"object": "error", "message": "internal"})),
        );
    }

    let response = match body.get("query").and_then(Value::as_str) {
        Some(query) if query.eq_ignore_ascii_case("stressed mom") => json!({
            "results": [persona_page(
                "Stressed Mom",
                "Three kids, two jobs.",
                MOM_VOICE,
                DATABASE_ID
            )],
            "has_more": false,
            "next_cursor": null
        }),
        Some(_) => json!({"results": [], "has_more": false, "next_cursor": null}),
        None => match body.get("start_cursor").and_then(Value::as_str) {
            None => json!({
                "results": [
                    persona_page("Boomer Dad", "Retired.", "", DATABASE_ID),
                    {
                        "object": "page",
                        "parent": {"type": "workspace", "workspace": true},
                        "properties": {"title": {"type": "title", "title": rich_text("Meeting notes")}}
                    }
                ],
                "has_more": true,
                "next_cursor": "cursor-2"
            }),
            Some(_) => json!({
                "results": [
                    persona_page("Stressed Mom", "Busy.", MOM_VOICE, &DATABASE_ID.replace('-', "")),
                    persona_page("Someone Else", "Other db.", "", "00000000-0000-0000-0000-000000000000")
                ],
                "has_more": false,
                "next_cursor": null
            }),
        },
    };

    (StatusCode::OK, Json(response))
}

async fn notion(fail: bool) -> (NotionStore, Arc<MockNotion>) {
    let mock = Arc::new(MockNotion {
        fail,
        ..MockNotion::default()
    });
    let router = Router::new()
        .route("/v1/search", post(search))
        .with_state(Arc::clone(&mock));
    let base = spawn_server(router).await;

    let store = NotionStore::with_base_url(
        "secret_test".to_string(),
        Some(DATABASE_ID.to_string()),
        format!("{base}/v1/"),
    )
    .unwrap();

    (store, mock)
}

#[tokio::test]
async fn finds_persona_by_name() {
    let (store, mock) = notion(false).await;

    let persona = get_persona(&store, "Stressed Mom").await.unwrap();
    assert_eq!(
        persona,
        Persona {
            name: "Stressed Mom".to_string(),
            backstory: "Three kids, two jobs.".to_string(),
            roast_style: "Blunt.".to_string(),
            voice_vibe: "Warm".to_string(),
            voice_id: MOM_VOICE.to_string(),
        }
    );

    let requests = mock.requests.lock().unwrap();
    let (headers, body) = &requests[0];
    assert_eq!(headers["authorization"], "Bearer secret_test");
    assert_eq!(headers["notion-version"], "2022-06-28");
    assert_eq!(
        *body,
        json!({"query": "Stressed Mom", "filter": {"property": "object", "value": "page"}})
    );
}

#[tokio::test]
async fn no_match_is_default_persona() {
    let (store, _mock) = notion(false).await;

    let persona = get_persona(&store, "Unknown Name").await;
    assert_eq!(persona, Some(Persona::default_assistant()));
}

#[tokio::test]
async fn server_error_is_absent_and_switch_is_skipped() {
    let (store, _mock) = notion(true).await;
    assert_eq!(get_persona(&store, "Stressed Mom").await, None);

    let session = Arc::new(RecordingSession::default());
    session.set_instructions("current".to_string());

    let controller = SessionController::new(Arc::new(store), DEFAULT_VOICE_ID);
    controller.attach_session(session.clone());

    assert_eq!(controller.switch_persona("Stressed Mom").await, None);
    assert_eq!(session.instructions(), "current");
    assert!(session.voices().is_empty());
}

#[tokio::test]
async fn lists_database_personas_across_pages() {
    let (store, mock) = notion(false).await;

    let names = list_personas(&store).await;
    assert_eq!(names, vec!["Boomer Dad".to_string(), "Stressed Mom".to_string()]);

    let requests = mock.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].1["page_size"], 100);
    assert_eq!(requests[1].1["start_cursor"], "cursor-2");
}

#[tokio::test]
async fn unreachable_store_lists_nothing() {
    let store = NotionStore::with_base_url(
        "secret_test".to_string(),
        None,
        "http://127.0.0.1:9".to_string(),
    )
    .unwrap();

    assert!(list_personas(&store).await.is_empty());
    assert_eq!(get_persona(&store, "Boomer Dad").await, None);
}
