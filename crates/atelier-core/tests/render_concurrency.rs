//! The round-wide render ceiling, observed from the render service.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::domain::{Category, Item};
use atelier_core::fakes::{FixedEvaluator, ScriptedRenderService, StaticCatalog};
use atelier_core::round::{PhasePayload, RoundController, RoundRequest};
use atelier_core::{PaletteHint, RoundConfig, ToolBox};

fn items() -> Vec<Item> {
    vec![
        Item::new("t", "Tee", Category::Top, "/tops/tee.png"),
        Item::new("b", "Chinos", Category::Bottom, "/bottoms/chinos.png"),
        Item::new("d", "Sundress", Category::Dress, "/dresses/sun.png"),
    ]
}

async fn run_with(config: RoundConfig, render: &Arc<ScriptedRenderService>) -> usize {
    let tools = ToolBox::new()
        .with_catalog(Arc::new(StaticCatalog::new("product_search", items())))
        .with_render_service(render.clone())
        .with_evaluator(Arc::new(FixedEvaluator::new(PaletteHint::Mixed)));

    let outcome = RoundController::new(
        RoundRequest::new("Summer Rooftop Party", "/static/model.png"),
        config,
        tools,
    )
    .run()
    .await
    .unwrap();

    outcome
        .reports
        .iter()
        .find_map(|r| match &r.result {
            PhasePayload::TryOn(t) => Some(t.jobs_completed),
            _ => None,
        })
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn at_most_six_render_jobs_in_flight() {
    let render = Arc::new(ScriptedRenderService::completing_after(3));
    let config = RoundConfig {
        variations: (1..=10).collect(),
        ..RoundConfig::default()
    };

    let completed = run_with(config, &render).await;

    assert_eq!(completed, 20);
    assert_eq!(render.submits(), 20);
    assert_eq!(render.max_in_flight(), 6);
    assert_eq!(render.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn permits_are_held_through_polling() {
    let render = Arc::new(
        ScriptedRenderService::completing_after(2).with_poll_latency(Duration::from_millis(500)),
    );
    let config = RoundConfig {
        render_concurrency: 2,
        variations: vec![1, 2, 3],
        ..RoundConfig::default()
    };

    let completed = run_with(config, &render).await;

    assert_eq!(completed, 6);
    assert_eq!(render.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn small_batches_are_not_throttled() {
    let render = Arc::new(ScriptedRenderService::completing_after(5));

    let completed = run_with(RoundConfig::default(), &render).await;

    assert_eq!(completed, 4);
    assert_eq!(render.max_in_flight(), 4);
}

#[tokio::test(start_paused = true)]
async fn slow_status_polls_release_their_permits_at_the_ceiling() {
    let render = Arc::new(
        ScriptedRenderService::never_finishing().with_poll_latency(Duration::from_secs(29)),
    );
    let config = RoundConfig {
        render_concurrency: 2,
        ..RoundConfig::default()
    };
    let tools = ToolBox::new()
        .with_catalog(Arc::new(StaticCatalog::new("product_search", items())))
        .with_render_service(render.clone())
        .with_evaluator(Arc::new(FixedEvaluator::new(PaletteHint::Mixed)));

    let outcome = RoundController::new(
        RoundRequest::new("Summer Rooftop Party", "/static/model.png"),
        config,
        tools,
    )
    .run()
    .await
    .unwrap();

    // Two waves of two jobs, each wave capped at 90 s of polling.
    assert_eq!(outcome.duration_ms, 180_000);
    assert_eq!(render.submits(), 4);
    // Accepted jobs still become candidates, with no renders to show.
    assert!(outcome.selection.outfit_id.is_some());
    assert_eq!(outcome.selection.preview_image.as_str(), "/static/model.png");
}
