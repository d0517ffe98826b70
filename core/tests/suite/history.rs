use easel_core::error::ErrorKind;
use easel_core::protocol::CanvasExportedEvent;
use easel_core::protocol::ErrorEvent;
use easel_core::protocol::EventMsg;
use easel_core::protocol::HistoryChangedEvent;
use easel_core::protocol::Op;
use easel_core::protocol::SnapshotAppliedEvent;
use easel_core::DrawingSurface;
use easel_core::RasterSurface;
use easel_core::Snapshot;
use easel_core::surface::Placement;
use easel_core::surface::SurfaceError;
use pretty_assertions::assert_eq;

use super::Setup;
use super::next_msg;
use super::start;

async fn export(easel: &easel_core::Easel) -> String {
    easel.submit(Op::ExportCanvas).await.expect("submit");
    match next_msg(easel).await {
        EventMsg::CanvasExported(CanvasExportedEvent { data_uri }) => data_uri,
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn undo_at_the_start_is_silent() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;

    easel.submit(Op::Undo).await.expect("submit");
    easel.submit(Op::SaveState).await.expect("submit");

    // The undo produced nothing; the first event belongs to SaveState.
    assert_eq!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent {
            step: 1,
            len: 2,
            can_undo: true,
            can_redo: false,
        })
    );
}

#[tokio::test]
async fn undo_and_redo_walk_the_log() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;

    easel.submit(Op::SaveState).await.expect("submit");
    easel.submit(Op::SaveState).await.expect("submit");
    assert!(matches!(next_msg(easel).await, EventMsg::HistoryChanged(_)));
    assert!(matches!(next_msg(easel).await, EventMsg::HistoryChanged(_)));

    easel.submit(Op::Undo).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::SnapshotApplied(SnapshotAppliedEvent { step: 1 })
    );
    assert_eq!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent {
            step: 1,
            len: 3,
            can_undo: true,
            can_redo: true,
        })
    );

    easel.submit(Op::Redo).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::SnapshotApplied(SnapshotAppliedEvent { step: 2 })
    );
    assert!(matches!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent { can_redo: false, .. })
    ));
}

#[tokio::test]
async fn clear_canvas_restarts_history_from_blank() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;
    let blank = export(easel).await;

    easel.submit(Op::SaveState).await.expect("submit");
    easel.submit(Op::ClearCanvas).await.expect("submit");
    assert!(matches!(next_msg(easel).await, EventMsg::HistoryChanged(_)));
    assert_eq!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent {
            step: 0,
            len: 1,
            can_undo: false,
            can_redo: false,
        })
    );
    assert_eq!(export(easel).await, blank);
}

#[tokio::test]
async fn clear_history_empties_the_log() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;

    easel.submit(Op::ClearHistory).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent {
            step: -1,
            len: 0,
            can_undo: false,
            can_redo: false,
        })
    );
}

#[tokio::test]
async fn canvas_operations_need_a_surface() {
    let test = start(Setup {
        surface: None,
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;

    // Without a surface there is nothing to capture.
    easel.submit(Op::SaveState).await.expect("submit");
    easel.submit(Op::ExportCanvas).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            message: "Canvas is not available".to_string(),
            kind: ErrorKind::Precondition,
        })
    );
}

#[tokio::test]
async fn shutdown_is_acknowledged() {
    let test = start(Setup::default()).await;
    let easel = &test.easel;

    easel.submit(Op::Shutdown).await.expect("submit");
    assert_eq!(next_msg(easel).await, EventMsg::ShutdownComplete);
    assert!(easel.next_event().await.is_err());
}

/// A canvas that can be captured but refuses to restore any snapshot.
struct RejectingSurface(RasterSurface);

impl DrawingSurface for RejectingSurface {
    fn serialize(&self) -> Result<Snapshot, SurfaceError> {
        self.0.serialize()
    }

    fn load(&mut self, _snapshot: &Snapshot) -> Result<(), SurfaceError> {
        Err(SurfaceError::InvalidDataUri("rejected".to_string()))
    }

    fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    fn export_data_uri(&self) -> Result<String, SurfaceError> {
        self.0.export_data_uri()
    }

    fn add_image_centered(
        &mut self,
        encoded: &[u8],
        max_fraction: f64,
    ) -> Result<Placement, SurfaceError> {
        self.0.add_image_centered(encoded, max_fraction)
    }

    fn clear(&mut self) {
        self.0.clear()
    }
}

#[tokio::test]
async fn failed_restore_keeps_the_history_cursor() {
    let test = start(Setup {
        surface: Some(Box::new(RejectingSurface(RasterSurface::new(4, 4)))),
        ..Setup::default()
    })
    .await;
    let easel = &test.easel;

    easel.submit(Op::SaveState).await.expect("submit");
    assert!(matches!(next_msg(easel).await, EventMsg::HistoryChanged(_)));

    easel.submit(Op::Undo).await.expect("submit");
    assert!(matches!(
        next_msg(easel).await,
        EventMsg::Error(ErrorEvent {
            kind: ErrorKind::Surface,
            ..
        })
    ));

    // The cursor is still on the newest entry, so nothing is truncated.
    easel.submit(Op::SaveState).await.expect("submit");
    assert_eq!(
        next_msg(easel).await,
        EventMsg::HistoryChanged(HistoryChangedEvent {
            step: 2,
            len: 3,
            can_undo: true,
            can_redo: false,
        })
    );
}
