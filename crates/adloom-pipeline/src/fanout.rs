//! Bounded-concurrency scene fanout.
//!
//! Renders every scene of a storyboard through a caller-supplied worker with
//! at most `limit` scenes in flight, then reassembles the results in scene
//! order. Completion order never leaks into output order.

use std::future::Future;

use adloom_models::{ErrorKind, GenerationError, GenerationResult, Scene, StoryboardItem};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Default number of scenes rendered concurrently.
pub const DEFAULT_SCENE_CONCURRENCY: usize = 4;

/// Fan-out/fan-in over storyboard scenes.
pub struct SceneFanout {
    limit: usize,
    cancel: CancellationToken,
}

impl SceneFanout {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token; cancelling it stops undispatched and
    /// in-flight scenes while preserving finished items.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Render every scene through `worker`, at most `limit` at a time.
    ///
    /// A failed scene becomes a `Failed` item; the fanout itself still
    /// returns `Ok` (partial-failure tolerance). Scene indices must be
    /// contiguous from 1 with no duplicates; anything else is rejected
    /// before any work is dispatched.
    pub async fn run<W, Fut>(
        &self,
        scenes: &[Scene],
        worker: W,
    ) -> PipelineResult<Vec<StoryboardItem>>
    where
        W: Fn(Scene) -> Fut,
        Fut: Future<Output = GenerationResult>,
    {
        validate_scenes(scenes)?;

        let semaphore = Semaphore::new(self.limit);
        let total = scenes.len();

        let futures: Vec<_> = scenes
            .iter()
            .map(|scene| {
                let semaphore = &semaphore;
                let cancel = &self.cancel;
                let worker = &worker;
                async move {
                    // never dispatch new work once cancelled
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return StoryboardItem::cancelled(scene),
                        permit = semaphore.acquire() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return StoryboardItem::cancelled(scene),
                        },
                    };

                    info!(scene_index = scene.index, total, "rendering scene");
                    // a result that is already in wins over a simultaneous cancel
                    tokio::select! {
                        biased;
                        result = worker(scene.clone()) => item_from_result(scene, result),
                        _ = cancel.cancelled() => StoryboardItem::cancelled(scene),
                    }
                }
            })
            .collect();

        let mut items = join_all(futures).await;
        items.sort_by_key(|item| item.scene_index);

        let succeeded = items.iter().filter(|i| i.is_succeeded()).count();
        for item in &items {
            metrics::record_scene(item.status.as_str());
            if let Some(err) = &item.error {
                error!(scene_index = item.scene_index, error = %err, "scene failed");
            }
        }
        info!(total, succeeded, "storyboard fanout finished");

        Ok(items)
    }
}

fn item_from_result(scene: &Scene, result: GenerationResult) -> StoryboardItem {
    if !result.is_succeeded() {
        let error = result.error.unwrap_or_else(|| {
            GenerationError::new(
                ErrorKind::Malformed,
                "scene worker reported failure without detail",
            )
        });
        return StoryboardItem::failed(scene, error);
    }

    match result.location() {
        Some(uri) => StoryboardItem::succeeded(scene, uri),
        None => StoryboardItem::failed(
            scene,
            GenerationError::new(
                ErrorKind::Malformed,
                "scene worker produced no stored location",
            ),
        ),
    }
}

fn validate_scenes(scenes: &[Scene]) -> PipelineResult<()> {
    if scenes.is_empty() {
        return Err(PipelineError::invalid_input("scene list is empty"));
    }

    for (pos, scene) in scenes.iter().enumerate() {
        let expected = pos as u32 + 1;
        if scene.index != expected {
            return Err(PipelineError::invalid_input(format!(
                "scene indices must be contiguous from 1 (found {} at position {expected})",
                scene.index
            )));
        }
        if scene.description.trim().is_empty() {
            return Err(PipelineError::invalid_input(format!(
                "scene {} has an empty description",
                scene.index
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adloom_models::{GenerationPayload, SceneStatus};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn scenes(descriptions: &[&str]) -> Vec<Scene> {
        descriptions
            .iter()
            .enumerate()
            .map(|(pos, d)| Scene::new(pos as u32 + 1, *d))
            .collect()
    }

    fn located(scene_index: u32) -> GenerationResult {
        GenerationResult::succeeded(GenerationPayload::location(format!(
            "s3://bucket/storyboards/{scene_index}.png"
        )))
    }

    #[tokio::test]
    async fn test_output_order_ignores_completion_order() {
        let scenes = scenes(&["slowest", "medium", "fast"]);
        let fanout = SceneFanout::new(3);

        let items = fanout
            .run(&scenes, |scene: Scene| async move {
                // scene 1 finishes last
                let delay = (4 - scene.index) as u64 * 20;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                located(scene.index)
            })
            .await
            .unwrap();

        let indices: Vec<u32> = items.iter().map(|i| i.scene_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        for item in &items {
            assert!(item.is_succeeded());
            let expected = format!("s3://bucket/storyboards/{}.png", item.scene_index);
            assert_eq!(item.output_location.as_deref(), Some(expected.as_str()));
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let scenes = scenes(&["a", "b", "c", "d", "e"]);
        let fanout = SceneFanout::new(2);

        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let items = fanout
            .run(&scenes, |scene: Scene| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    located(scene.index)
                }
            })
            .await
            .unwrap();

        assert_eq!(items.len(), 5);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let scenes = scenes(&["ok", "broken", "ok"]);
        let fanout = SceneFanout::new(4);

        let items = fanout
            .run(&scenes, |scene: Scene| async move {
                if scene.index == 2 {
                    GenerationResult::failed(GenerationError::new(
                        ErrorKind::Permanent,
                        "prompt rejected",
                    ))
                } else {
                    located(scene.index)
                }
            })
            .await
            .unwrap();

        assert_eq!(items.len(), 3);
        assert!(items[0].is_succeeded());
        assert_eq!(items[1].status, SceneStatus::Failed);
        assert_eq!(
            items[1].error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Permanent)
        );
        assert!(items[2].is_succeeded());
    }

    #[tokio::test]
    async fn test_success_without_location_is_malformed() {
        let scenes = scenes(&["inline only"]);
        let fanout = SceneFanout::new(1);

        let items = fanout
            .run(&scenes, |_scene: Scene| async move {
                GenerationResult::succeeded(GenerationPayload::inline(vec![1, 2, 3], "image/png"))
            })
            .await
            .unwrap();

        assert_eq!(items[0].status, SceneStatus::Failed);
        assert_eq!(
            items[0].error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Malformed)
        );
    }

    #[tokio::test]
    async fn test_non_contiguous_indices_rejected() {
        let bad = vec![Scene::new(1, "a"), Scene::new(3, "b")];
        let fanout = SceneFanout::new(2);

        let err = fanout
            .run(&bad, |scene: Scene| async move { located(scene.index) })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn test_empty_scene_list_rejected() {
        let fanout = SceneFanout::new(2);
        let err = fanout
            .run(&[], |scene: Scene| async move { located(scene.index) })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cancellation_preserves_finished_items() {
        let scenes = scenes(&["quick", "waiting", "waiting"]);
        let cancel = CancellationToken::new();
        let fanout = SceneFanout::new(1).with_cancellation(cancel.clone());

        let items = fanout
            .run(&scenes, |scene: Scene| {
                let cancel = cancel.clone();
                async move {
                    if scene.index == 1 {
                        // cancel the rest once the first scene is done
                        cancel.cancel();
                        located(scene.index)
                    } else {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        located(scene.index)
                    }
                }
            })
            .await
            .unwrap();

        assert!(items[0].is_succeeded());
        assert_eq!(items[1].status, SceneStatus::Cancelled);
        assert_eq!(items[2].status, SceneStatus::Cancelled);
        assert!(items[1].error.is_none());
    }
}
