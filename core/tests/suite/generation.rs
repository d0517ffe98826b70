use easel_core::Easel;
use easel_core::GeneratedImageRecord;
use easel_core::RecordId;
use easel_core::error::ErrorKind;
use easel_core::protocol::CanvasExportedEvent;
use easel_core::protocol::ErrorEvent;
use easel_core::protocol::EventMsg;
use easel_core::protocol::GenerationProgressEvent;
use easel_core::protocol::GenerationStartedEvent;
use easel_core::protocol::HistoryChangedEvent;
use easel_core::protocol::ImageCommittedEvent;
use easel_core::protocol::ImageGeneratedEvent;
use easel_core::protocol::ImagesChangedEvent;
use easel_core::protocol::Op;
use easel_core::protocol::SnapshotAppliedEvent;
use easel_core::store::load_images;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::Reply;
use super::Setup;
use super::VALID_KEY;
use super::image_body;
use super::next_msg;
use super::red_png_data_uri;
use super::sse_line;
use super::start;
use super::wait_for_event;

async fn export(easel: &Easel) -> String {
    easel.submit(Op::ExportCanvas).await.expect("submit");
    match next_msg(easel).await {
        EventMsg::CanvasExported(CanvasExportedEvent { data_uri }) => data_uri,
        other => panic!("unexpected event: {other:?}"),
    }
}

async fn expect_generated(easel: &Easel) -> GeneratedImageRecord {
    match wait_for_event(easel, |msg| matches!(msg, EventMsg::ImageGenerated(_))).await {
        EventMsg::ImageGenerated(ImageGeneratedEvent { record }) => record,
        other => panic!("unexpected event: {other:?}"),
    }
}

fn generate(prompt: &str) -> Op {
    Op::Generate {
        prompt: prompt.to_string(),
    }
}

#[tokio::test]
async fn generate_commit_and_undo() {
    let red = red_png_data_uri();
    let test = start(Setup {
        reply: Reply::Body(image_body(&red)),
        stored_key: Some(VALID_KEY),
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;
    let blank = export(easel).await;

    easel.submit(generate("  a red square  ")).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::GenerationStarted(GenerationStartedEvent {
            prompt: "a red square".to_string()
        })
    );
    assert_eq!(
        next_msg(easel).await,
        EventMsg::GenerationProgress(GenerationProgressEvent {
            content: "Painting the fox".to_string()
        })
    );
    let record = expect_generated(easel).await;
    assert_eq!(record.url, red);
    assert_eq!(record.prompt, "a red square");
    assert_eq!(record.original_canvas_state, blank);
    assert_eq!(
        next_msg(easel).await,
        EventMsg::ImagesChanged(ImagesChangedEvent { count: 1 })
    );
    assert_eq!(load_images(&*test.store), vec![record.clone()]);

    let requests = test.transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url, "https://openrouter.ai/api/v1/chat/completions");
    assert_eq!(
        request
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
        Some(format!("Bearer {VALID_KEY}").as_str())
    );
    let body = request.body.clone().expect("body");
    assert_eq!(body["model"], json!("google/gemini-2.5-flash-image-preview"));
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["modalities"], json!(["image", "text"]));

    easel
        .submit(Op::CommitImage {
            id: record.id.clone(),
        })
        .await
        .expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent {
            step: 1,
            len: 2,
            can_undo: true,
            can_redo: false,
        })
    );
    assert_eq!(
        next_msg(easel).await,
        EventMsg::ImageCommitted(ImageCommittedEvent {
            id: record.id.clone()
        })
    );
    let composed = export(easel).await;
    assert_ne!(composed, blank);

    easel.submit(Op::Undo).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::SnapshotApplied(SnapshotAppliedEvent { step: 0 })
    );
    assert!(matches!(next_msg(easel).await, EventMsg::HistoryChanged(_)));
    assert_eq!(export(easel).await, blank);

    easel.submit(Op::Redo).await.expect("submit");
    assert!(matches!(next_msg(easel).await, EventMsg::SnapshotApplied(_)));
    assert!(matches!(next_msg(easel).await, EventMsg::HistoryChanged(_)));
    assert_eq!(export(easel).await, composed);
}

#[tokio::test]
async fn invalid_inputs_never_reach_the_network() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;

    easel.submit(generate("   ")).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            message: "Please enter a prompt for image generation".to_string(),
            kind: ErrorKind::Validation,
        })
    );

    easel.submit(generate("a fox")).await.expect("submit");
    assert_eq!(next_msg(easel).await, EventMsg::ApiKeyRequired);

    assert!(test.transport.requests().is_empty());
}

#[tokio::test]
async fn generation_without_a_canvas_is_a_precondition_failure() {
    let test = start(Setup {
        stored_key: Some(VALID_KEY),
        surface: None,
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;

    easel.submit(generate("a fox")).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            message: "Canvas is not available".to_string(),
            kind: ErrorKind::Precondition,
        })
    );
}

#[tokio::test]
async fn text_only_reply_reports_no_image_and_retry_resends() {
    let test = start(Setup {
        reply: Reply::Body(vec![
            sse_line(json!({"choices": [{"delta": {"content": "I can only describe foxes."}}]})),
            "data: [DONE]\n\n".to_string(),
        ]),
        stored_key: Some(VALID_KEY),
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;

    easel.submit(generate("a fox")).await.expect("submit");
    let error = wait_for_event(easel, |msg| matches!(msg, EventMsg::Error(_))).await;
    assert_eq!(
        error,
        EventMsg::Error(ErrorEvent {
            message: "Failed to generate image: No image generated in the response".to_string(),
            kind: ErrorKind::NoImageGenerated,
        })
    );

    easel.submit(Op::Retry).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::GenerationStarted(GenerationStartedEvent {
            prompt: "a fox".to_string()
        })
    );
    wait_for_event(easel, |msg| matches!(msg, EventMsg::Error(_))).await;
    assert_eq!(test.transport.requests().len(), 2);
}

#[tokio::test]
async fn second_generation_is_busy_until_interrupted() {
    let test = start(Setup {
        reply: Reply::Hang,
        stored_key: Some(VALID_KEY),
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;

    easel.submit(generate("a fox")).await.expect("submit");
    assert!(matches!(
        next_msg(easel).await,
        EventMsg::GenerationStarted(_)
    ));

    easel.submit(generate("a hen")).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            message: "An image generation is already in progress".to_string(),
            kind: ErrorKind::Busy,
        })
    );

    easel.submit(Op::Interrupt).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            message: "Image generation was cancelled".to_string(),
            kind: ErrorKind::Cancelled,
        })
    );

    easel.submit(generate("a hen")).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::GenerationStarted(GenerationStartedEvent {
            prompt: "a hen".to_string()
        })
    );
}

#[tokio::test]
async fn removing_images_updates_storage() {
    let red = red_png_data_uri();
    let test = start(Setup {
        reply: Reply::Body(image_body(&red)),
        stored_key: Some(VALID_KEY),
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;

    easel.submit(generate("one")).await.expect("submit");
    let first = expect_generated(easel).await;
    easel.submit(generate("two")).await.expect("submit");
    let second = expect_generated(easel).await;
    assert!(matches!(
        next_msg(easel).await,
        EventMsg::ImagesChanged(ImagesChangedEvent { count: 2 })
    ));

    easel
        .submit(Op::RemoveImage {
            id: first.id.clone(),
        })
        .await
        .expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::ImagesChanged(ImagesChangedEvent { count: 1 })
    );
    assert_eq!(load_images(&*test.store), vec![second]);

    easel.submit(Op::ClearImages).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::ImagesChanged(ImagesChangedEvent { count: 0 })
    );
    assert!(load_images(&*test.store).is_empty());

    easel
        .submit(Op::CommitImage { id: first.id })
        .await
        .expect("submit");
    assert!(matches!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            kind: ErrorKind::Validation,
            ..
        })
    ));
}

#[tokio::test]
async fn committing_an_unknown_image_is_rejected() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;

    easel
        .submit(Op::CommitImage {
            id: RecordId::from("missing"),
        })
        .await
        .expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            message: "No generated image with id missing".to_string(),
            kind: ErrorKind::Validation,
        })
    );
}
