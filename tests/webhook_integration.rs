//! Integration tests for the WhatsApp webhook.
//!
//! Each test spins up the webhook router on a random port backed by an
//! in-memory database, a recording sender and a stub reputation service, then
//! drives it with form posts the way the provider does.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::net::TcpListener;

use verified_schemes::classifier::{
    AnalysisStats, ReputationLookup, ReputationService, ThreatClassifier, UrlReport,
};
use verified_schemes::config::ConversationConfig;
use verified_schemes::conversation::{ConversationEngine, prompts};
use verified_schemes::directory::{Program, ProgramDirectory};
use verified_schemes::dispatch::{Dispatcher, MessageSender};
use verified_schemes::error::{ChannelError, DatabaseError, ReputationError, TranslationError};
use verified_schemes::localization::{Language, Localizer, Translator};
use verified_schemes::session::{Session, SessionStore, Step};
use verified_schemes::store::{Database, LibSqlBackend};
use verified_schemes::webhook::{self, AppState};

const USER: &str = "+2348012345678";

// ── Stubs ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    fn texts_for(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == to)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_message(&self, to: &str, body: &str) -> Result<Option<String>, ChannelError> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(None)
    }
}

/// Reputation stub with a fixed answer and optional latency.
struct StubReputation {
    answer: ReputationLookup,
    delay: Duration,
    lookups: AtomicUsize,
}

impl StubReputation {
    fn answering(answer: ReputationLookup) -> Arc<Self> {
        Arc::new(Self {
            answer,
            delay: Duration::ZERO,
            lookups: AtomicUsize::new(0),
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            answer: ReputationLookup::NotFound,
            delay: Duration::from_secs(30),
            lookups: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReputationService for StubReputation {
    async fn lookup(&self, _url: &str) -> Result<ReputationLookup, ReputationError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }

    async fn submit(&self, _url: &str) -> Result<String, ReputationError> {
        Ok("u-stub".into())
    }
}

/// Database wrapper whose session saves can be switched to fail.
struct FlakyDb {
    inner: LibSqlBackend,
    fail_saves: AtomicBool,
}

#[async_trait]
impl Database for FlakyDb {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.inner.init_schema().await
    }
    async fn get_or_create_session(&self, phone_number: &str) -> Result<Session, DatabaseError> {
        self.inner.get_or_create_session(phone_number).await
    }
    async fn get_session(&self, phone_number: &str) -> Result<Option<Session>, DatabaseError> {
        self.inner.get_session(phone_number).await
    }
    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query("disk full".into()));
        }
        self.inner.save_session(session).await
    }
    async fn count_sessions(&self) -> Result<usize, DatabaseError> {
        self.inner.count_sessions().await
    }
    async fn insert_program(&self, program: &Program) -> Result<(), DatabaseError> {
        self.inner.insert_program(program).await
    }
    async fn replace_programs(&self, programs: &[Program]) -> Result<usize, DatabaseError> {
        self.inner.replace_programs(programs).await
    }
    async fn search_programs(&self, fragment: &str, limit: usize) -> Result<Vec<Program>, DatabaseError> {
        self.inner.search_programs(fragment, limit).await
    }
    async fn list_programs(&self) -> Result<Vec<Program>, DatabaseError> {
        self.inner.list_programs().await
    }
    async fn count_programs(&self) -> Result<usize, DatabaseError> {
        self.inner.count_programs().await
    }
}

/// Tags text with the target language code.
struct Tagging;

#[async_trait]
impl Translator for Tagging {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError> {
        Ok(format!("[{}] {text}", target.code()))
    }
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    base: String,
    client: reqwest::Client,
    db: Arc<FlakyDb>,
    sender: Arc<RecordingSender>,
}

impl Harness {
    async fn start(reputation: Option<Arc<dyn ReputationService>>) -> Self {
        Self::start_with(reputation, Localizer::passthrough(), ConversationConfig::immediate()).await
    }

    async fn start_with(
        reputation: Option<Arc<dyn ReputationService>>,
        localizer: Localizer,
        config: ConversationConfig,
    ) -> Self {
        let db = Arc::new(FlakyDb {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            fail_saves: AtomicBool::new(false),
        });
        let dyn_db: Arc<dyn Database> = db.clone();

        let directory = ProgramDirectory::new(Arc::clone(&dyn_db));
        directory
            .import(&[
                Program::new("N-Power", "Social Investment", "FMHDS", "https://nasims.gov.ng"),
                Program::new(
                    "Anchor Borrowers Programme",
                    "Agriculture",
                    "CBN",
                    "https://www.cbn.gov.ng/devfin/abp.asp",
                ),
            ])
            .await
            .unwrap();

        let classifier = Arc::new(
            ThreatClassifier::new(reputation, Some(directory.clone()))
                .with_lookup_timeout(Duration::from_millis(200)),
        );
        let engine = Arc::new(ConversationEngine::new(
            classifier,
            directory,
            Arc::new(localizer),
            config,
        ));
        let sender = Arc::new(RecordingSender::default());
        let state = AppState {
            sessions: Arc::new(SessionStore::new(dyn_db)),
            engine,
            dispatcher: Arc::new(Dispatcher::new(sender.clone())),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = webhook::router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://127.0.0.1:{port}"),
            client: reqwest::Client::new(),
            db,
            sender,
        }
    }

    async fn post(&self, from: &str, body: &str) -> StatusCode {
        self.client
            .post(format!("{}/whatsapp/webhook", self.base))
            .form(&[("From", format!("whatsapp:{from}")), ("Body", body.to_string())])
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn session(&self, identity: &str) -> Session {
        self.db.get_session(identity).await.unwrap().unwrap()
    }

    /// Put `identity` at `step` without going through the webhook.
    async fn place(&self, identity: &str, step: Step) {
        let mut session = self.db.get_or_create_session(identity).await.unwrap();
        session.current_step = step;
        self.db.save_session(&session).await.unwrap();
    }
}

fn clean_report() -> ReputationLookup {
    ReputationLookup::Found(UrlReport {
        stats: AnalysisStats {
            harmless: 60,
            undetected: 10,
            ..Default::default()
        },
        vendors: vec![],
    })
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn menu_choice_one_prompts_for_link() {
    let h = Harness::start(None).await;
    assert_eq!(h.post(USER, "1").await, StatusCode::OK);

    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLink);
    let texts = h.sender.texts_for(USER);
    assert_eq!(texts, vec![prompts::LINK_PROMPT.to_string()]);
}

#[tokio::test]
async fn allowlisted_link_is_safe_without_reputation_call() {
    let stub = StubReputation::answering(clean_report());
    let h = Harness::start(Some(stub.clone())).await;
    h.place(USER, Step::AwaitingLink).await;

    assert_eq!(h.post(USER, "https://cbn.gov.ng/rates").await, StatusCode::OK);

    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLinkFollowup);
    let texts = h.sender.texts_for(USER);
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], prompts::LINK_ACK);
    assert!(texts[1].starts_with("✅"), "{}", texts[1]);
    assert!(texts[1].contains("https://cbn.gov.ng/rates"));
    assert_eq!(texts[2], prompts::LINK_FOLLOWUP);
    assert_eq!(stub.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn heuristics_dominate_unreachable_reputation() {
    let stub = StubReputation::hanging();
    let h = Harness::start(Some(stub.clone())).await;
    h.place(USER, Step::AwaitingLink).await;

    let status = h.post(USER, "http://example-login-verify-secure.com").await;
    assert_eq!(status, StatusCode::OK);

    let texts = h.sender.texts_for(USER);
    let verdict = &texts[1];
    assert!(verdict.starts_with("⚠️ CAUTION"), "{verdict}");
    assert!(verdict.contains("login, verify, secure"));
    assert!(verdict.contains("local checks only"));
    assert_eq!(stub.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLinkFollowup);
}

#[tokio::test]
async fn unknown_link_is_checked_against_reputation() {
    let stub = StubReputation::answering(clean_report());
    let h = Harness::start(Some(stub.clone())).await;
    h.place(USER, Step::AwaitingLink).await;

    h.post(USER, "shop.example.net").await;

    let texts = h.sender.texts_for(USER);
    assert!(texts[1].starts_with("✅ This link appears safe."), "{}", texts[1]);
    assert!(texts[1].contains("https://shop.example.net"));
    assert_eq!(stub.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_program_match_is_described() {
    let h = Harness::start(None).await;
    h.place(USER, Step::AwaitingProgram).await;

    assert_eq!(h.post(USER, "N-Power").await, StatusCode::OK);

    assert_eq!(h.session(USER).await.current_step, Step::MainMenu);
    let texts = h.sender.texts_for(USER);
    assert_eq!(texts[0], prompts::PROGRAM_ACK);
    assert!(texts[1].contains("N-Power"));
    assert!(texts[1].contains("Social Investment"));
    assert!(texts[1].contains("https://nasims.gov.ng"));
    assert_eq!(texts[2], prompts::MAIN_MENU);
}

#[tokio::test]
async fn unknown_program_suggests_examples() {
    let h = Harness::start(None).await;
    h.place(USER, Step::AwaitingProgram).await;

    h.post(USER, "xyz").await;

    assert_eq!(h.session(USER).await.current_step, Step::MainMenu);
    let texts = h.sender.texts_for(USER);
    assert!(texts[1].contains("No program found"));
    assert!(texts[1].contains("Anchor Borrowers"));
}

#[tokio::test]
async fn language_keyword_resets_flow() {
    let h = Harness::start(None).await;
    let mut session = h.db.get_or_create_session(USER).await.unwrap();
    session.current_step = Step::AwaitingLink;
    session.language = Language::Yo;
    h.db.save_session(&session).await.unwrap();

    h.post(USER, "English").await;

    let session = h.session(USER).await;
    assert_eq!(session.current_step, Step::MainMenu);
    assert_eq!(session.language, Language::En);
    assert_eq!(h.sender.texts_for(USER)[0], "✅ Language set to English!");
}

#[tokio::test]
async fn full_walkthrough() {
    let h = Harness::start(None).await;

    h.post(USER, "hi").await;
    assert_eq!(h.session(USER).await.current_step, Step::MainMenu);
    h.post(USER, "3").await;
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLanguage);
    h.post(USER, "9").await;
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLanguage);
    h.post(USER, "1").await;
    assert_eq!(h.session(USER).await.current_step, Step::MainMenu);
    h.post(USER, "verify").await;
    h.post(USER, "google.com").await;
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLinkFollowup);
    h.post(USER, "another").await;
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLink);
    h.post(USER, "menu").await;
    assert_eq!(h.session(USER).await.current_step, Step::MainMenu);
}

// ── Robustness ──────────────────────────────────────────────────────────

#[tokio::test]
async fn get_is_acknowledged() {
    let h = Harness::start(None).await;
    let resp = h
        .client
        .get(format!("{}/whatsapp/webhook", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Webhook verified!");
}

#[tokio::test]
async fn malformed_payloads_are_acknowledged_without_side_effects() {
    let h = Harness::start(None).await;

    let resp = h
        .client
        .post(format!("{}/whatsapp/webhook", h.base))
        .body("\u{0}garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = h
        .client
        .post(format!("{}/whatsapp/webhook", h.base))
        .form(&[("Body", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(h.db.count_sessions().await.unwrap(), 0);
    assert!(h.sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_returns_500_with_apology() {
    let h = Harness::start(None).await;
    h.post(USER, "1").await;
    h.sender.clear();
    h.db.fail_saves.store(true, Ordering::SeqCst);

    let status = h.post(USER, "menu").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let texts = h.sender.texts_for(USER);
    assert_eq!(texts, vec![prompts::ERROR_APOLOGY.to_string(), prompts::MAIN_MENU.to_string()]);
    // The failed turn never reached storage.
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLink);
}

#[tokio::test]
async fn apology_uses_stored_language() {
    let h = Harness::start_with(
        None,
        Localizer::new(Some(Arc::new(Tagging))),
        ConversationConfig::immediate(),
    )
    .await;
    let mut session = h.db.get_or_create_session(USER).await.unwrap();
    session.current_step = Step::AwaitingLink;
    session.language = Language::Ha;
    h.db.save_session(&session).await.unwrap();
    h.db.fail_saves.store(true, Ordering::SeqCst);

    let status = h.post(USER, "menu").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        h.sender.texts_for(USER),
        vec![
            format!("[ha] {}", prompts::ERROR_APOLOGY),
            format!("[ha] {}", prompts::MAIN_MENU),
        ]
    );
}

#[tokio::test]
async fn inbound_message_cancels_scheduled_menu_when_enabled() {
    let config = ConversationConfig {
        menu_after_language: Duration::from_millis(300),
        cancel_pending_on_inbound: true,
        ..ConversationConfig::immediate()
    };
    let h = Harness::start_with(None, Localizer::passthrough(), config).await;

    h.post(USER, "English").await;
    h.post(USER, "menu").await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(
        h.sender.texts_for(USER),
        vec!["✅ Language set to English!".to_string(), prompts::MAIN_MENU.to_string()]
    );
}

#[tokio::test]
async fn scheduled_menu_survives_inbound_by_default() {
    let config = ConversationConfig {
        menu_after_language: Duration::from_millis(300),
        ..ConversationConfig::immediate()
    };
    let h = Harness::start_with(None, Localizer::passthrough(), config).await;

    h.post(USER, "English").await;
    h.post(USER, "menu").await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let texts = h.sender.texts_for(USER);
    assert_eq!(texts.len(), 3);
    assert_eq!(texts.iter().filter(|t| *t == prompts::MAIN_MENU).count(), 2);
}

// ── Concurrency ─────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_first_contact_creates_one_session_each() {
    let h = Arc::new(Harness::start(None).await);

    let mut tasks = Vec::new();
    for i in 0..10 {
        for _ in 0..3 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                h.post(&format!("+23480000000{i:02}"), "menu").await
            }));
        }
    }
    let statuses = futures_util::future::join_all(tasks).await;
    assert!(statuses.into_iter().all(|s| s.unwrap() == StatusCode::OK));

    assert_eq!(h.db.count_sessions().await.unwrap(), 10);
}

#[tokio::test]
async fn same_identity_turns_are_serialized() {
    // Slow reputation widens the window in which unserialized turns would
    // both read MAIN_MENU.
    let stub = Arc::new(StubReputation {
        answer: clean_report(),
        delay: Duration::from_millis(100),
        lookups: AtomicUsize::new(0),
    });
    let h = Arc::new(Harness::start(Some(stub)).await);

    let a = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.post(USER, "1").await })
    };
    let b = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.post(USER, "1").await })
    };
    assert_eq!(a.await.unwrap(), StatusCode::OK);
    assert_eq!(b.await.unwrap(), StatusCode::OK);

    // One turn moved to AWAITING_LINK, the other treated "1" as a link.
    assert_eq!(h.session(USER).await.current_step, Step::AwaitingLinkFollowup);
    let texts = h.sender.texts_for(USER);
    assert_eq!(texts.iter().filter(|t| *t == prompts::LINK_PROMPT).count(), 1);
    assert_eq!(texts.iter().filter(|t| *t == prompts::LINK_ACK).count(), 1);
}
