use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    events::{emit_event, EventSink, OCCUPANCY_UPDATED, OVERLAY_STATUS_CHANGED},
    models::OccupancySnapshot,
    render::{occupancy_grid, GridView, Palette},
    services::OccupancyStatusSource,
    theme::ThemeHandle,
};

use super::overlay::{ApplyOutcome, OverlayState, OverlayStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Read-only consumer of applied snapshots.
pub trait SnapshotListener: Send + Sync {
    fn on_snapshot(&self, camera_id: &str, snapshot: &OccupancySnapshot);
}

pub(crate) fn lock_overlay(overlay: &Mutex<OverlayState>) -> MutexGuard<'_, OverlayState> {
    match overlay.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OccupancyUpdatedEvent<'a> {
    camera_id: &'a str,
    snapshot: &'a OccupancySnapshot,
    grid: GridView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverlayStatusEvent<'a> {
    camera_id: &'a str,
    status: &'a OverlayStatus,
}

/// Everything one poll loop (and each fetch it spawns) needs.
#[derive(Clone)]
pub(crate) struct FetchContext {
    pub camera_id: Arc<str>,
    pub generation: u64,
    pub fetch_timeout: Duration,
    pub source: Arc<dyn OccupancyStatusSource>,
    pub overlay: Arc<Mutex<OverlayState>>,
    pub events: Arc<dyn EventSink>,
    pub listeners: Arc<Mutex<Vec<Arc<dyn SnapshotListener>>>>,
    pub theme: ThemeHandle,
}

pub(crate) async fn poll_loop(
    ctx: FetchContext,
    interval: Duration,
    retry: Arc<Notify>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "occupancy polling started for camera {} every {}ms",
        ctx.camera_id,
        interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("occupancy polling stopped for camera {}", ctx.camera_id);
                break;
            }
            _ = ticker.tick() => {
                tokio::spawn(fetch_tick(ctx.clone()));
            }
            _ = retry.notified() => {
                log_info!("manual occupancy refresh for camera {}", ctx.camera_id);
                tokio::spawn(fetch_tick(ctx.clone()));
            }
        }
    }
}

/// One fetch. Requests may overlap; the overlay decides which result wins.
pub(crate) async fn fetch_tick(ctx: FetchContext) {
    let tag = lock_overlay(&ctx.overlay).next_tag(ctx.generation);
    let Some(tag) = tag else {
        return;
    };

    let fetched = tokio::time::timeout(
        ctx.fetch_timeout,
        ctx.source.current_status(&ctx.camera_id),
    )
    .await;

    let outcome = {
        let mut overlay = lock_overlay(&ctx.overlay);
        match fetched {
            Ok(Ok(snapshot)) => overlay.apply_success(tag, snapshot),
            Ok(Err(err)) => {
                log_warn!(
                    "occupancy fetch #{} for camera {} failed: {err:#}",
                    tag.sequence,
                    ctx.camera_id
                );
                overlay.apply_failure(tag, err.to_string())
            }
            Err(_) => {
                log_warn!(
                    "occupancy fetch #{} for camera {} timed out (> {}ms)",
                    tag.sequence,
                    ctx.camera_id,
                    ctx.fetch_timeout.as_millis()
                );
                overlay.apply_failure(tag, "status request timed out".to_string())
            }
        }
    };

    match outcome {
        ApplyOutcome::Updated(snapshot) => publish_snapshot(&ctx, &snapshot),
        ApplyOutcome::Failed {
            status_changed: true,
        } => {
            let status = lock_overlay(&ctx.overlay).status().clone();
            emit_event(
                &*ctx.events,
                OVERLAY_STATUS_CHANGED,
                &OverlayStatusEvent {
                    camera_id: &ctx.camera_id,
                    status: &status,
                },
            );
        }
        ApplyOutcome::Failed { .. } => {}
        ApplyOutcome::Stale => {
            log_debug!(
                "discarding stale occupancy result #{} for camera {}",
                tag.sequence,
                ctx.camera_id
            );
        }
    }
}

fn publish_snapshot(ctx: &FetchContext, snapshot: &OccupancySnapshot) {
    let palette = Palette::for_theme(ctx.theme.current());
    let grid = occupancy_grid(snapshot, &palette);
    log_debug!(
        "camera {}: {} of {} occupied ({})",
        ctx.camera_id,
        grid.summary.occupied,
        grid.summary.total,
        grid.percent_label
    );
    emit_event(
        &*ctx.events,
        OCCUPANCY_UPDATED,
        &OccupancyUpdatedEvent {
            camera_id: &ctx.camera_id,
            snapshot,
            grid,
        },
    );

    let listeners = match ctx.listeners.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    for listener in listeners {
        listener.on_snapshot(&ctx.camera_id, snapshot);
    }
}
