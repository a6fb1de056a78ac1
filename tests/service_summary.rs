use std::sync::{Arc, Mutex};

use bowlscore::{
    core::store::{GameStore, StoreConfig, StoreError, ValidationError},
    runtime::handle::{spawn_bowling, RuntimeConfig, RuntimeError},
    service::{BowlingService, ServiceError},
    summary::{
        frames_text, GenerationError, SummaryConfig, SummaryGenerator, SummaryRequest,
        SYSTEM_PROMPT,
    },
    types::PinPolicy,
};

#[derive(Clone, Default)]
struct CannedGenerator {
    seen: Arc<Mutex<Vec<SummaryRequest>>>,
}

impl SummaryGenerator for CannedGenerator {
    async fn generate(&self, request: &SummaryRequest) -> Result<String, GenerationError> {
        self.seen.lock().expect("lock").push(request.clone());
        Ok("  Dana opened with a strike and closed out a spare.\n".to_string())
    }
}

struct FailingGenerator;

impl SummaryGenerator for FailingGenerator {
    async fn generate(&self, _request: &SummaryRequest) -> Result<String, GenerationError> {
        Err(GenerationError::new("upstream unavailable"))
    }
}

#[tokio::test]
async fn summary_renders_frames_and_trims_output() {
    let generator = CannedGenerator::default();
    let seen = Arc::clone(&generator.seen);
    let service = BowlingService::new(
        spawn_bowling(GameStore::new(), None, RuntimeConfig::default()),
        generator,
    );

    let started = service.start_game("Dana").await.expect("start");
    for pins in [10, 6, 4, 3] {
        service.add_roll(started.game.id, pins).await.expect("roll");
    }

    let text = service.summary(started.game.id).await.expect("summary");
    assert_eq!(text, "Dana opened with a strike and closed out a spare.");

    let card = service.score_card(started.game.id).await.expect("card");
    let requests = seen.lock().expect("lock");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.user_message, frames_text(&card.frames).expect("render"));
    assert!(request.user_message.starts_with(r#"{"frame":1,"rolls":["X"],"score":"#));
    assert!(request.user_message.contains(r#"{"frame":2,"rolls":[6,"/"],"score":"#));
    assert_eq!(request.system_prompt, SYSTEM_PROMPT);
    assert_eq!(request.model, "gpt-3.5-turbo");
    assert_eq!(request.max_tokens, 200);
}

#[tokio::test]
async fn summary_uses_configured_model() {
    let generator = CannedGenerator::default();
    let seen = Arc::clone(&generator.seen);
    let summary = SummaryConfig {
        model: "local-small".to_string(),
        max_tokens: 64,
        temperature: 0.2,
    };
    let service = BowlingService::with_summary_config(
        spawn_bowling(GameStore::new(), None, RuntimeConfig::default()),
        generator,
        summary.clone(),
    );

    let started = service.start_game("Dana").await.expect("start");
    service.summary(started.game.id).await.expect("summary");

    let requests = seen.lock().expect("lock");
    assert_eq!(requests[0].model, summary.model);
    assert_eq!(requests[0].max_tokens, 64);
    assert_eq!(requests[0].user_message, "");
}

#[tokio::test]
async fn generator_failure_is_a_server_error() {
    let service = BowlingService::new(
        spawn_bowling(GameStore::new(), None, RuntimeConfig::default()),
        FailingGenerator,
    );
    let started = service.start_game("Dana").await.expect("start");
    service.add_roll(started.game.id, 7).await.expect("roll");

    let err = service.summary(started.game.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::UpstreamGenerationFailure(_)));
    assert!(!err.is_game_not_found());
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn unknown_game_fails_before_the_generator_runs() {
    let generator = CannedGenerator::default();
    let seen = Arc::clone(&generator.seen);
    let service = BowlingService::new(
        spawn_bowling(GameStore::new(), None, RuntimeConfig::default()),
        generator,
    );

    let err = service.summary(99).await.unwrap_err();
    assert!(err.is_game_not_found());
    assert_eq!(err.http_status(), 400);
    assert!(seen.lock().expect("lock").is_empty());

    let err = service.add_roll(99, 3).await.unwrap_err();
    assert!(err.is_game_not_found());
    let err = service.score(99).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn strict_rejections_are_client_errors() {
    let mut store = GameStore::new();
    store.set_config(StoreConfig {
        pin_policy: PinPolicy::Strict,
    });
    let service = BowlingService::new(
        spawn_bowling(store, None, RuntimeConfig::default()),
        FailingGenerator,
    );

    let started = service.start_game("Dana").await.expect("start");
    service.add_roll(started.game.id, 8).await.expect("roll");
    let err = service.add_roll(started.game.id, 5).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Runtime(RuntimeError::Store(StoreError::Validation(
            ValidationError::TooManyPins { pins: 5, standing: 2 }
        )))
    ));
    assert_eq!(err.http_status(), 400);
    assert!(!err.is_game_not_found());

    assert_eq!(service.score(started.game.id).await.expect("score"), 8);
    assert_eq!(service.handle().score(started.game.id).await.expect("score"), 8);
}
