//! Integration tests for robodaily
//!
//! These drive the full pipeline against a mock source and a scripted
//! completion client, with snapshots written to a temporary directory.

use robodaily::config::{Config, HttpConfig};
use robodaily::llm::{CompletionRequest, LlmError, ScriptedClient, SharedClient};
use async_trait::async_trait;
use robodaily::models::{Candidate, PaperRecord, PaperRecordBuilder, Snapshot};
use robodaily::notify::compose_digest;
use robodaily::pipeline::{AddOutcome, Pipeline, PipelineError, RegenTarget, SummaryKind, NO_PREVIEW};
use robodaily::sources::arxiv::{abs_url, ArxivEndpoints};
use robodaily::sources::mock::{make_candidate, make_record};
use robodaily::sources::{
    normalize_identifier, ArxivSource, ExtractedContent, MockSource, PaperSource, SourceError,
};
use robodaily::store::{load_strict, DatasetStore, Relevance};
use robodaily::utils::HttpClient;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

const ROBOT_GRASPING: &str = "2503.00001";
const PROTEIN_FOLDING: &str = "2503.00002";
const ROBOT_NAVIGATION: &str = "2503.00003";

/// Keeps titles mentioning robots, writes fixed summaries.
fn answer(request: &CompletionRequest) -> Result<String, LlmError> {
    if request.user.starts_with("Which of the following") {
        let picks: Vec<&str> = request
            .user
            .lines()
            .filter_map(|line| {
                let (number, title) = line.split_once(". ")?;
                number.parse::<usize>().ok()?;
                title.contains("Robot").then_some(number)
            })
            .collect();
        return Ok(if picks.is_empty() {
            "NONE".to_string()
        } else {
            picks.join(",")
        });
    }
    if request.user.contains("single sentence") {
        return Ok("A learned policy grasps unseen objects from a single depth image.".to_string());
    }
    Ok("## Background & Motivation\n\nGrasping.\n\n## Method\n\nA policy.\n\n\
        ## Experiments & Results\n\nIt works.\n\n## Conclusion\n\nGood."
        .to_string())
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.paths.data_dir = dir.to_path_buf();
    config.pipeline.filter_batch_size = 2;
    config
}

fn daily_source() -> Arc<MockSource> {
    let source = MockSource::new();
    source.set_listing(vec![
        make_candidate(ROBOT_GRASPING, "Robot grasping in clutter"),
        make_candidate(PROTEIN_FOLDING, "Protein folding at scale"),
        make_candidate(ROBOT_NAVIGATION, "Robot navigation without maps"),
    ]);
    source.set_content(
        ROBOT_GRASPING,
        ExtractedContent::html(
            "We present a grasping policy trained in simulation.",
            vec!["https://arxiv.org/html/2503.00001v1/x1.png".to_string()],
        ),
    );
    source.set_metadata(make_record(PROTEIN_FOLDING, "Protein folding at scale"));
    Arc::new(source)
}

fn pipeline(dir: &Path, source: &Arc<MockSource>, llm: Option<&Arc<ScriptedClient>>) -> Pipeline {
    let llm = llm.map(|client| -> SharedClient { client.clone() });
    Pipeline::new(test_config(dir), source.clone(), llm)
}

fn read(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[tokio::test]
async fn test_daily_run_filters_and_enriches() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    let llm = Arc::new(ScriptedClient::new(answer));

    let mut pipeline = pipeline(dir.path(), &source, Some(&llm));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.listed, 3);
    assert_eq!(report.kept, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.enriched, 2);
    assert_eq!(report.failed, 0);

    let store = pipeline.store();
    assert!(!store.contains(PROTEIN_FOLDING));
    let grasping = store.get(ROBOT_GRASPING).unwrap();
    assert_eq!(SummaryKind::of(grasping), SummaryKind::Generated);
    assert_eq!(grasping.image_references.len(), 1);

    // no content registered: the sentinel, not an LLM call
    let navigation = store.get(ROBOT_NAVIGATION).unwrap();
    assert_eq!(navigation.short_summary.as_deref(), Some(NO_PREVIEW));
    assert_eq!(navigation.long_summary.as_deref(), Some(NO_PREVIEW));

    assert_eq!(
        pipeline.cache().status(&abs_url(PROTEIN_FOLDING)),
        Some(Relevance::Rejected)
    );
    assert_eq!(
        pipeline.cache().status(&abs_url(ROBOT_GRASPING)),
        Some(Relevance::Kept)
    );

    let snapshot = load_strict(&dir.path().join("papers.json")).unwrap();
    let ids: Vec<&str> = snapshot.items.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec![ROBOT_NAVIGATION, ROBOT_GRASPING]);
    assert_eq!(snapshot.source, "mock://listing");
    assert!(dir.path().join("index.json").exists());
}

#[tokio::test]
async fn test_rerun_is_byte_identical_and_skips_classification() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    let llm = Arc::new(ScriptedClient::new(answer));

    pipeline(dir.path(), &source, Some(&llm)).run().await.unwrap();
    let calls_after_first = llm.call_count();
    let papers = read(dir.path().join("papers.json"));
    let index = read(dir.path().join("index.json"));
    let relevance = read(dir.path().join("relevance.json"));

    let report = pipeline(dir.path(), &source, Some(&llm)).run().await.unwrap();

    assert_eq!(llm.call_count(), calls_after_first);
    assert_eq!(report.kept, 2);
    assert_eq!(report.rejected, 1);
    // the no-preview record counts as enriched too
    assert_eq!(report.skipped, 2);
    assert_eq!(report.enriched, 0);
    assert_eq!(read(dir.path().join("papers.json")), papers);
    assert_eq!(read(dir.path().join("index.json")), index);
    assert_eq!(read(dir.path().join("relevance.json")), relevance);
}

#[tokio::test]
async fn test_unconfigured_llm_keeps_everything_with_fallbacks() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();

    let mut pipeline = pipeline(dir.path(), &source, None);
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.kept, 3);
    assert_eq!(report.enriched, 3);
    for record in pipeline.store().records() {
        assert!(!record.short_summary.as_deref().unwrap_or("").is_empty());
        assert!(!record.long_summary.as_deref().unwrap_or("").is_empty());
    }
    assert_eq!(
        SummaryKind::of(pipeline.store().get(ROBOT_GRASPING).unwrap()),
        SummaryKind::Fallback
    );
    // no text: the sentinel, even without an LLM
    let navigation = pipeline.store().get(ROBOT_NAVIGATION).unwrap();
    assert_eq!(navigation.short_summary.as_deref(), Some(NO_PREVIEW));
    assert_eq!(SummaryKind::of(navigation), SummaryKind::NoPreview);
    // nothing was classified, so nothing is cached
    assert!(!dir.path().join("relevance.json").exists());
}

#[tokio::test]
async fn test_failing_llm_fails_open() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    let llm = Arc::new(ScriptedClient::failing());

    let mut pipeline = pipeline(dir.path(), &source, Some(&llm));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.kept, 3);
    assert_eq!(report.rejected, 0);
    let grasping = pipeline.store().get(ROBOT_GRASPING).unwrap();
    assert_eq!(SummaryKind::of(grasping), SummaryKind::Fallback);
    // failed batches are remembered as kept
    assert_eq!(
        pipeline.cache().status(&abs_url(PROTEIN_FOLDING)),
        Some(Relevance::Kept)
    );
}

/// Holds back content for one identifier until released.
#[derive(Debug)]
struct GatedSource {
    inner: Arc<MockSource>,
    gated: &'static str,
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl PaperSource for GatedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn listing(&self, limit: usize) -> Result<Vec<Candidate>, SourceError> {
        self.inner.listing(limit).await
    }

    async fn metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        self.inner.metadata(identifier).await
    }

    async fn content(&self, identifier: &str) -> ExtractedContent {
        if identifier == self.gated {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.content(identifier).await
    }
}

fn snapshot_ids(path: &Path) -> Vec<String> {
    let snapshot: Snapshot<serde_json::Value> = serde_json::from_slice(&read(path)).unwrap();
    snapshot
        .items
        .iter()
        .filter_map(|item| item["identifier"].as_str().map(String::from))
        .collect()
}

#[tokio::test]
async fn test_finished_items_are_on_disk_while_others_run() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(GatedSource {
        inner: daily_source(),
        gated: ROBOT_NAVIGATION,
        reached: Notify::new(),
        release: Notify::new(),
    });
    let mut pipeline = Pipeline::new(test_config(dir.path()), source.clone(), None);
    let papers = dir.path().join("papers.json");
    let index = dir.path().join("index.json");

    let observe = async {
        source.reached.notified().await;
        let written = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if papers.exists() && snapshot_ids(&papers).iter().any(|id| id == ROBOT_GRASPING) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(written.is_ok(), "grasping record never reached disk");

        let in_papers = snapshot_ids(&papers);
        let in_index = snapshot_ids(&index);
        assert!(!in_papers.iter().any(|id| id == ROBOT_NAVIGATION));
        assert_eq!(in_index, in_papers);

        source.release.notify_one();
    };

    let (report, ()) = tokio::join!(pipeline.run(), observe);
    let report = report.unwrap();

    assert_eq!(report.enriched, 3);
    let in_papers = snapshot_ids(&papers);
    assert_eq!(in_papers, vec![ROBOT_NAVIGATION, PROTEIN_FOLDING, ROBOT_GRASPING]);
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MockSource::new());

    let result = pipeline(dir.path(), &source, None).run().await;
    assert!(matches!(result, Err(PipelineError::Source(_))));
    assert!(!dir.path().join("papers.json").exists());
}

#[tokio::test]
async fn test_add_respects_rejection_unless_forced() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    let llm = Arc::new(ScriptedClient::new(answer));

    let mut pipeline = pipeline(dir.path(), &source, Some(&llm));
    pipeline.run().await.unwrap();

    let calls = llm.call_count();
    let outcome = pipeline
        .add("https://arxiv.org/pdf/2503.00002v1.pdf", false)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        AddOutcome::SkippedRejected {
            identifier: PROTEIN_FOLDING.to_string()
        }
    );
    assert_eq!(llm.call_count(), calls);

    let outcome = pipeline.add("arXiv:2503.00002", true).await.unwrap();
    // no content for this paper
    assert_eq!(
        outcome,
        AddOutcome::Added {
            identifier: PROTEIN_FOLDING.to_string(),
            kind: SummaryKind::NoPreview
        }
    );
    assert_eq!(
        pipeline.cache().status(&abs_url(PROTEIN_FOLDING)),
        Some(Relevance::Kept)
    );
    assert!(pipeline.store().contains(PROTEIN_FOLDING));
}

#[tokio::test]
async fn test_add_skips_enriched_and_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    let llm = Arc::new(ScriptedClient::new(answer));

    let mut pipeline = pipeline(dir.path(), &source, Some(&llm));
    pipeline.run().await.unwrap();

    let outcome = pipeline.add(ROBOT_GRASPING, false).await.unwrap();
    assert!(matches!(outcome, AddOutcome::SkippedEnriched { .. }));

    let result = pipeline.add("https://example.com/paper", false).await;
    assert!(matches!(result, Err(PipelineError::InvalidReference(_))));
}

#[tokio::test]
async fn test_regen_upgrades_fallbacks_and_never_downgrades() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();

    // first pass with a dead completion service
    let dead = Arc::new(ScriptedClient::failing());
    pipeline(dir.path(), &source, Some(&dead)).run().await.unwrap();

    let llm = Arc::new(ScriptedClient::new(answer));
    let mut regen = pipeline(dir.path(), &source, Some(&llm));
    let report = regen.regen(RegenTarget::Degraded, 10).await.unwrap();
    assert_eq!(report.enriched, 3);
    assert_eq!(
        SummaryKind::of(regen.store().get(ROBOT_GRASPING).unwrap()),
        SummaryKind::Generated
    );
    let generated = regen.store().get(ROBOT_GRASPING).unwrap().clone();

    // a failing regen of everything keeps the generated text
    let mut again = pipeline(dir.path(), &source, Some(&dead));
    again.regen(RegenTarget::All, 10).await.unwrap();
    let kept = again.store().get(ROBOT_GRASPING).unwrap();
    assert_eq!(kept.short_summary, generated.short_summary);
    assert_eq!(kept.long_summary, generated.long_summary);
}

#[tokio::test]
async fn test_regen_honors_batch_size() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    pipeline(dir.path(), &source, None).run().await.unwrap();

    let llm = Arc::new(ScriptedClient::new(answer));
    let report = pipeline(dir.path(), &source, Some(&llm))
        .regen(RegenTarget::Degraded, 1)
        .await
        .unwrap();
    assert_eq!(report.enriched, 1);
}

#[tokio::test]
async fn test_backfill_fills_missing_summaries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut store = DatasetStore::open(&config.paths, "mock://listing");
    store.upsert(make_record(ROBOT_GRASPING, "Robot grasping in clutter"));
    store.save().unwrap();

    let source = daily_source();
    let llm = Arc::new(ScriptedClient::new(answer));
    let mut pipeline = pipeline(dir.path(), &source, Some(&llm));
    let report = pipeline.backfill(5).await.unwrap();

    assert_eq!(report.enriched, 1);
    let record = pipeline.store().get(ROBOT_GRASPING).unwrap();
    assert_eq!(SummaryKind::of(record), SummaryKind::Generated);
    assert_eq!(source.content_requests(), vec![ROBOT_GRASPING]);
}

#[tokio::test]
async fn test_digest_from_stored_dataset() {
    let dir = TempDir::new().unwrap();
    let source = daily_source();
    let llm = Arc::new(ScriptedClient::new(answer));
    pipeline(dir.path(), &source, Some(&llm)).run().await.unwrap();

    let snapshot = load_strict(&dir.path().join("papers.json")).unwrap();
    let messages = compose_digest(&snapshot.items, 1000002, "@all", 10);
    assert_eq!(messages.len(), 1);
    let content = &messages[0].markdown.content;
    assert!(content.contains("Robot grasping in clutter"));
    assert!(content.contains("Robot navigation without maps"));
    assert!(!content.contains("Protein folding"));
}

const LISTING_PAGE: &str = r#"<html><body>
<h2>Manipulation</h2>
<table>
  <tr><th>Date</th><th>Title</th><th>Authors</th></tr>
  <tr><td>2025-03-03</td><td>Robot grasping in clutter</td><td>A. Author</td>
      <td><a href="https://arxiv.org/abs/2503.00001v1">abs</a></td></tr>
</table>
<h2>Navigation</h2>
<table>
  <tr><td>2025-03-03</td><td>Robot navigation without maps</td><td>B. Author</td>
      <td><a href="https://arxiv.org/pdf/2503.00003.pdf">pdf</a></td></tr>
  <tr><td>2025-03-03</td><td>Robot navigation without maps</td><td>B. Author</td>
      <td><a href="https://arxiv.org/abs/2503.00003">abs</a></td></tr>
</table>
</body></html>"#;

#[tokio::test]
async fn test_run_against_http_source() {
    let mut server = mockito::Server::new_async().await;
    let _listing = server
        .mock("GET", "/list")
        .with_body(LISTING_PAGE)
        .create_async()
        .await;
    let _abs_one = server
        .mock("GET", "/abs/2503.00001")
        .with_body(r#"<a href="/html/2503.00001v1">HTML (experimental)</a>"#)
        .create_async()
        .await;
    let _html_one = server
        .mock("GET", "/html/2503.00001v1")
        .with_body(
            "<html><body><nav>menu</nav><p>We grasp objects in clutter.</p>\
             <img src=\"x1.png\"></body></html>",
        )
        .create_async()
        .await;
    let _abs_three = server
        .mock("GET", "/abs/2503.00003")
        .with_body("<html><body>No rendering</body></html>")
        .create_async()
        .await;
    let _pdf_three = server
        .mock("GET", "/pdf/2503.00003")
        .with_status(404)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    let http_config = HttpConfig {
        requests_per_second: None,
        ..HttpConfig::default()
    };
    let source = ArxivSource::with_client(
        HttpClient::new(&http_config).unwrap(),
        ArxivEndpoints::new(server.url()),
        Some(format!("{}/list", server.url())),
    );
    config.listing.url = Some(format!("{}/list", server.url()));

    let llm = Arc::new(ScriptedClient::new(answer));
    let shared: SharedClient = llm.clone();
    let mut pipeline = Pipeline::new(config, Arc::new(source), Some(shared));
    let report = pipeline.run().await.unwrap();

    // the PDF and abstract links of the second paper collapse into one
    assert_eq!(report.listed, 2);
    assert_eq!(report.enriched, 2);

    let grasping = pipeline.store().get(ROBOT_GRASPING).unwrap();
    assert_eq!(grasping.category, "Manipulation");
    assert_eq!(SummaryKind::of(grasping), SummaryKind::Generated);
    assert_eq!(
        grasping.image_references,
        vec![format!("{}/html/2503.00001v1/x1.png", server.url())]
    );

    let navigation = pipeline.store().get(ROBOT_NAVIGATION).unwrap();
    assert_eq!(navigation.category, "Navigation");
    assert_eq!(SummaryKind::of(navigation), SummaryKind::NoPreview);
}

#[test]
fn test_corrupt_dataset_is_fatal_for_strict_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("papers.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(load_strict(&path).is_err());

    // the tolerant store starts empty instead
    let config = test_config(dir.path());
    assert!(DatasetStore::open(&config.paths, "x").is_empty());
}

#[test]
fn test_identifier_forms_normalize_together() {
    let forms = [
        "2503.01078",
        "2503.01078v3",
        "arXiv:2503.01078",
        "https://arxiv.org/abs/2503.01078",
        "https://arxiv.org/pdf/2503.01078v2.pdf",
        "https://arxiv.org/html/2503.01078v1",
    ];
    for form in forms {
        assert_eq!(
            normalize_identifier(form).as_deref(),
            Some("2503.01078"),
            "{}",
            form
        );
    }
    assert_eq!(normalize_identifier("https://example.com/2503"), None);
}

#[test]
fn test_builder_records_classify() {
    let record = PaperRecordBuilder::new(ROBOT_GRASPING)
        .title("T")
        .short_summary(NO_PREVIEW)
        .long_summary(NO_PREVIEW)
        .build();
    assert_eq!(SummaryKind::of(&record), SummaryKind::NoPreview);
}
