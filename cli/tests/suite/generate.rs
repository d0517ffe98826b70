use easel_core::FileStore;
use easel_core::store::load_images;
use easel_core::surface::decode_data_uri;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::VALID_KEY;
use super::easel_cmd;
use super::png_data_uri;
use super::store_key;

fn sse_body(image_url: &str) -> String {
    let progress = json!({"choices": [{"delta": {"content": "Adding color"}}]});
    let image = json!({"choices": [{"delta": {"images": [
        {"type": "image_url", "image_url": {"url": image_url}}
    ]}}]});
    format!(": OPENROUTER PROCESSING\n\ndata: {progress}\n\ndata: {image}\n\ndata: [DONE]\n\n")
}

async fn mock_provider(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", format!("Bearer {VALID_KEY}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_writes_image_and_composite() {
    let home = TempDir::new().unwrap();
    store_key(home.path(), VALID_KEY);
    let generated = png_data_uri(3, 3);
    let server = mock_provider(sse_body(&generated)).await;

    let canvas = home.path().join("sketch.png");
    let (_, sketch) = decode_data_uri(&png_data_uri(10, 8)).unwrap();
    std::fs::write(&canvas, sketch).unwrap();
    let output = home.path().join("out.png");
    let composite = home.path().join("composite.png");

    easel_cmd(home.path())
        .arg("--base-url")
        .arg(format!("{}/api/v1", server.uri()))
        .arg("generate")
        .arg("--canvas")
        .arg(&canvas)
        .arg("-o")
        .arg(&output)
        .arg("--commit")
        .arg(&composite)
        .arg("a red square")
        .assert()
        .success()
        .stdout(contains("out.png"))
        .stdout(contains("composite.png"));

    let (_, expected) = decode_data_uri(&generated).unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), expected);
    assert!(composite.exists());

    let images = load_images(&FileStore::open(home.path()).unwrap());
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].prompt, "a red square");
    assert_eq!(images[0].url, generated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_mode_streams_session_events() {
    let home = TempDir::new().unwrap();
    store_key(home.path(), VALID_KEY);
    let server = mock_provider(sse_body(&png_data_uri(2, 2))).await;
    let output = home.path().join("out.png");

    let assert = easel_cmd(home.path())
        .arg("--base-url")
        .arg(format!("{}/api/v1", server.uri()))
        .arg("generate")
        .arg("--json")
        .arg("-o")
        .arg(&output)
        .arg("a fox")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let types: Vec<String> = stdout
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap())
        .map(|value| {
            value["msg"]["type"]
                .as_str()
                .or_else(|| value["type"].as_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(
        types,
        vec![
            "session_configured",
            "generation_started",
            "generation_progress",
            "image_generated",
            "images_changed",
            "shutdown_complete",
            "file_written",
        ]
    );
}

#[test]
fn generate_without_a_key_asks_for_login() {
    let home = TempDir::new().unwrap();

    easel_cmd(home.path())
        .arg("--base-url")
        .arg("http://127.0.0.1:9")
        .args(["generate", "a fox"])
        .assert()
        .code(1)
        .stderr(contains("easel login"));
}

#[test]
fn blank_prompt_is_rejected() {
    let home = TempDir::new().unwrap();
    store_key(home.path(), VALID_KEY);

    easel_cmd(home.path())
        .arg("--base-url")
        .arg("http://127.0.0.1:9")
        .args(["generate", "   "])
        .assert()
        .code(1)
        .stderr(contains("Please enter a prompt for image generation"));
}

#[test]
fn malformed_stored_key_fails_cleanly() {
    let home = TempDir::new().unwrap();
    store_key(home.path(), "abc");

    // The session reports two events for this failure; repeat to cover the
    // ordering between their shutdown requests and the session exiting.
    for _ in 0..5 {
        easel_cmd(home.path())
            .arg("--base-url")
            .arg("http://127.0.0.1:9")
            .args(["generate", "a fox"])
            .assert()
            .code(1)
            .stderr(contains("Invalid API key format"))
            .stderr(contains("An API key is required to generate images"))
            .stderr(contains("internal error").not());
    }
}
