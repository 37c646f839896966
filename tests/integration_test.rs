mod common;

use std::sync::Arc;

use common::{keywords, test_config, ScriptedFetcher};
use keyword_funnel::browser::BrowserFetcher;
use keyword_funnel::models::{JobState, SearchQuery, Stage};
use keyword_funnel::services::DelayRange;
use keyword_funnel::utils::logging;
use keyword_funnel::workflow::QueryPrefixes;
use keyword_funnel::{
    Config, EventBus, JobError, JobEvent, JobOutcome, JsonFileStore, Keyword, KvStore, MemoryStore,
    Orchestrator, PageFetcher,
};
use tokio::sync::broadcast::Receiver;

async fn orchestrator(
    config: Config,
    fetcher: Arc<ScriptedFetcher>,
    store: Arc<dyn KvStore>,
) -> (Orchestrator, Receiver<JobEvent>) {
    let bus = EventBus::new(4096);
    let rx = bus.subscribe();
    let orchestrator = Orchestrator::new(config, fetcher, store, bus)
        .await
        .expect("创建编排器失败");
    (orchestrator, rx)
}

fn drain(rx: &mut Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[JobEvent], prefix: &str) -> usize {
    events
        .iter()
        .filter(|e| match e {
            JobEvent::ProgressUpdate { status, .. } => status.starts_with(prefix),
            _ => false,
        })
        .count()
}

fn ledger_keys(orchestrator: &Orchestrator) -> Vec<String> {
    orchestrator
        .ledger()
        .records()
        .iter()
        .map(|r| r.keyword.as_str().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn duplicates_collapse_and_every_item_is_recorded_once() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, mut rx) = orchestrator(test_config(2), fetcher.clone(), store).await;

    let outcome = orchestrator.run(keywords(&["a", "b", "a", "c"])).await;

    assert!(matches!(outcome, JobOutcome::Finished { processed: 3, total: 4 }));
    assert_eq!(orchestrator.state(), JobState::Finished);
    assert_eq!(ledger_keys(&orchestrator), vec!["a", "b", "c"]);
    assert_eq!(fetcher.narrow_queries(), vec!["a", "b", "c"]);
    assert!(orchestrator.pending_batch().await.unwrap().is_none());

    let events = drain(&mut rx);
    let results = events
        .iter()
        .filter(|e| matches!(e, JobEvent::ItemResult { .. }))
        .count();
    assert_eq!(results, 3);

    // 两批之间只等待一次：10 秒倒计时，每 5 秒一次状态
    assert_eq!(statuses(&events, "下一批"), 2);

    assert!(matches!(
        events.last(),
        Some(JobEvent::JobFinished { processed: 3, total: 4 })
    ));
}

#[tokio::test(start_paused = true)]
async fn fourth_consecutive_block_fails_and_keeps_prior_records() {
    let fetcher = Arc::new(ScriptedFetcher::new().block("k5", 4));
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, mut rx) = orchestrator(test_config(1), fetcher.clone(), store).await;

    let items = keywords(&["k1", "k2", "k3", "k4", "k5", "k6"]);
    let outcome = orchestrator.run(items).await;

    let failure = match outcome {
        JobOutcome::Failed(failure) => failure,
        other => panic!("应该终止: {:?}", other),
    };
    assert_eq!(failure.keyword, Some(Keyword::new("k5")));
    assert_eq!(failure.processed, 4);
    assert_eq!(failure.total, 6);
    assert_eq!(orchestrator.state(), JobState::Failed);
    assert!(matches!(failure.cause, JobError::BlockDetected { stage: Stage::NarrowMatch, .. }));

    assert_eq!(ledger_keys(&orchestrator), vec!["k1", "k2", "k3", "k4"]);
    assert_eq!(
        fetcher.narrow_queries().iter().filter(|k| *k == "k5").count(),
        4
    );
    assert!(!fetcher.narrow_queries().contains(&"k6".to_string()));

    let stats = orchestrator.block_stats();
    assert_eq!(stats.detection_count, 4);
    assert_eq!(stats.recovery_attempts, 4);
    assert_eq!(stats.successful_recoveries, 4);
    assert_eq!(fetcher.resets(), 4);
    assert_eq!(fetcher.identities().len(), 4);

    let cursor = orchestrator.pending_batch().await.unwrap().expect("批次游标应保留");
    assert_eq!(cursor.remaining_items, keywords(&["k5", "k6"]));
    assert_eq!(cursor.processed_count, 4);

    let events = drain(&mut rx);
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::BlockInterrupt { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3, 4]);

    // 每次恢复至少冷却 60 秒，每 5 秒广播一次剩余时间
    assert!(statuses(&events, "封锁冷却中") >= 4 * 12);
    let first_block = events
        .iter()
        .position(|e| matches!(e, JobEvent::BlockInterrupt { .. }))
        .unwrap();
    let first_cooldown = events
        .iter()
        .position(|e| match e {
            JobEvent::ProgressUpdate { status, .. } => status.starts_with("封锁冷却中"),
            _ => false,
        })
        .unwrap();
    assert!(first_block < first_cooldown);
    assert!(matches!(events.last(), Some(JobEvent::JobFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn three_blocks_then_success_completes_the_item() {
    let fetcher = Arc::new(ScriptedFetcher::new().block("k2", 3));
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, _rx) = orchestrator(test_config(1), fetcher.clone(), store).await;

    let outcome = orchestrator.run(keywords(&["k1", "k2", "k3"])).await;

    assert!(matches!(outcome, JobOutcome::Finished { processed: 3, total: 3 }));
    assert_eq!(orchestrator.state(), JobState::Finished);
    assert_eq!(fetcher.narrow_queries(), vec!["k1", "k2", "k2", "k2", "k2", "k3"]);
    assert_eq!(orchestrator.block_stats().detection_count, 3);

    // 每次恢复都换成与上一次不同的身份
    let identities = fetcher.identities();
    assert_eq!(identities.len(), 3);
    assert!(identities.windows(2).all(|w| w[0] != w[1]));
}

#[tokio::test(start_paused = true)]
async fn disabled_recovery_makes_first_block_fatal() {
    let fetcher = Arc::new(ScriptedFetcher::new().block("k1", 1));
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let mut config = test_config(1);
    config.recovery.enabled = false;
    let (mut orchestrator, _rx) = orchestrator(config, fetcher.clone(), store).await;

    let outcome = orchestrator.run(keywords(&["k1", "k2"])).await;

    match outcome {
        JobOutcome::Failed(failure) => {
            assert!(failure.cause.is_retryable());
            assert_eq!(failure.processed, 0);
        }
        other => panic!("应该终止: {:?}", other),
    }
    assert_eq!(fetcher.resets(), 0);
    assert_eq!(orchestrator.block_stats().detection_count, 0);
}

#[tokio::test(start_paused = true)]
async fn restart_with_full_input_skips_ledger_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let items = keywords(&["a", "b", "c", "d"]);

    // 第一次运行在 c 处失败
    {
        let store: Arc<dyn KvStore> = Arc::new(JsonFileStore::open(&path).await.unwrap());
        let fetcher = Arc::new(ScriptedFetcher::new().fail("c"));
        let (mut orchestrator, _rx) = orchestrator(test_config(2), fetcher, store).await;
        let outcome = orchestrator.run(items.clone()).await;

        match outcome {
            JobOutcome::Failed(failure) => {
                assert_eq!(failure.keyword, Some(Keyword::new("c")));
                assert!(matches!(failure.cause, JobError::CollaboratorFailure { .. }));
            }
            other => panic!("应该终止: {:?}", other),
        }

        let cursor = orchestrator.pending_batch().await.unwrap().unwrap();
        assert_eq!(cursor.batch_index, 1);
        assert_eq!(cursor.remaining_items, keywords(&["c", "d"]));
    }

    // 重启后使用同样的输入
    let store: Arc<dyn KvStore> = Arc::new(JsonFileStore::open(&path).await.unwrap());
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (mut orchestrator, _rx) = orchestrator(test_config(2), fetcher.clone(), store).await;
    assert_eq!(orchestrator.ledger().len(), 2);

    let outcome = orchestrator.run(items).await;

    assert!(matches!(outcome, JobOutcome::Finished { processed: 4, total: 4 }));
    assert_eq!(fetcher.narrow_queries(), vec!["c", "d"]);
    assert_eq!(ledger_keys(&orchestrator), vec!["a", "b", "c", "d"]);
    assert!(orchestrator.pending_batch().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn resume_uses_saved_cursor_without_input() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());

    let failing = Arc::new(ScriptedFetcher::new().fail("c"));
    let (mut first, _rx) = orchestrator(test_config(2), failing, store.clone()).await;
    assert!(!first.run(keywords(&["a", "b", "c", "d"])).await.is_finished());

    let fetcher = Arc::new(ScriptedFetcher::new());
    let (mut second, _rx) = orchestrator(test_config(2), fetcher.clone(), store).await;
    let outcome = second.resume().await;

    assert!(matches!(outcome, JobOutcome::Finished { processed: 4, total: 4 }));
    assert_eq!(fetcher.narrow_queries(), vec!["c", "d"]);

    // 没有游标时直接完成
    let outcome = second.resume().await;
    assert!(matches!(outcome, JobOutcome::Finished { processed: 0, total: 0 }));
}

#[tokio::test(start_paused = true)]
async fn fetch_timeout_fails_without_retry() {
    let fetcher = Arc::new(ScriptedFetcher::new().hang("b"));
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, mut rx) = orchestrator(test_config(1), fetcher.clone(), store).await;

    let outcome = orchestrator.run(keywords(&["a", "b", "c"])).await;

    match outcome {
        JobOutcome::Failed(failure) => {
            assert_eq!(failure.keyword, Some(Keyword::new("b")));
            assert_eq!(failure.processed, 1);
            assert!(matches!(failure.cause, JobError::Timeout { .. }));
        }
        other => panic!("应该终止: {:?}", other),
    }
    assert_eq!(fetcher.narrow_queries(), vec!["a", "b"]);

    let failed = drain(&mut rx)
        .into_iter()
        .find(|e| matches!(e, JobEvent::JobFailed { .. }))
        .expect("应该广播 job-failed");
    assert_eq!(failed.snapshot().keyword, Some(Keyword::new("b")));
}

#[tokio::test(start_paused = true)]
async fn invalid_keyword_is_fatal_before_any_fetch() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, _rx) = orchestrator(test_config(1), fetcher.clone(), store).await;

    let outcome = orchestrator
        .run(vec![Keyword::new("ok"), Keyword::new("bad\u{7}")])
        .await;

    match outcome {
        JobOutcome::Failed(failure) => {
            assert!(matches!(failure.cause, JobError::InvalidItem { .. }));
            assert_eq!(failure.processed, 1);
        }
        other => panic!("应该终止: {:?}", other),
    }
    assert_eq!(fetcher.narrow_queries(), vec!["ok"]);
}

#[tokio::test(start_paused = true)]
async fn fully_covered_input_finishes_without_fetching() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let items = keywords(&["a", "b", "c"]);

    let seed = Arc::new(ScriptedFetcher::new());
    let (mut first, _rx) = orchestrator(test_config(2), seed, store.clone()).await;
    assert!(first.run(items.clone()).await.is_finished());

    let fetcher = Arc::new(ScriptedFetcher::new());
    let (mut second, mut rx) = orchestrator(test_config(2), fetcher.clone(), store).await;
    let outcome = second.run(items).await;

    assert!(matches!(outcome, JobOutcome::Finished { processed: 3, total: 3 }));
    assert!(fetcher.queries().is_empty());
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, JobEvent::JobFinished { .. })));

    let outcome = second.run(Vec::new()).await;
    assert!(matches!(outcome, JobOutcome::Finished { processed: 0, total: 0 }));
}

#[tokio::test(start_paused = true)]
async fn skipped_item_counts_as_processed() {
    let fetcher = Arc::new(ScriptedFetcher::new().narrow_hits("popular", 10));
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, _rx) = orchestrator(test_config(1), fetcher.clone(), store).await;

    let outcome = orchestrator.run(keywords(&["popular", "niche"])).await;

    assert!(matches!(outcome, JobOutcome::Finished { processed: 2, total: 2 }));
    let records = orchestrator.ledger().records();
    assert_eq!(records[0].skipped_at, Some(Stage::NarrowMatch));
    assert!(!records[1].is_skipped());
    // 被跳过的关键词只发出一次查询
    assert_eq!(
        fetcher.queries().iter().filter(|q| q.keyword.as_str() == "popular").count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn no_item_delay_after_the_last_item() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (mut orchestrator, mut rx) = orchestrator(test_config(3), fetcher, store).await;

    let outcome = orchestrator.run(keywords(&["a", "b", "c"])).await;

    assert!(outcome.is_finished());
    // 三个关键词之间只有两次间隔
    let events = drain(&mut rx);
    assert_eq!(statuses(&events, "处理中"), 2);
    assert!(matches!(events.last(), Some(JobEvent::JobFinished { .. })));
}

#[tokio::test(start_paused = true)]
async fn single_item_finishes_without_trailing_wait() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let mut config = test_config(1);
    config.item_delay = DelayRange::from_secs(600, 600);
    let (mut orchestrator, _rx) = orchestrator(config, fetcher, store).await;

    let started = tokio::time::Instant::now();
    let outcome = orchestrator.run(keywords(&["only"])).await;

    assert!(outcome.is_finished());
    assert_eq!(orchestrator.state(), JobState::Finished);
    assert!(started.elapsed() < std::time::Duration::from_secs(600));
}

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_fetch_single_query() {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    let fetcher = BrowserFetcher::connect(&config.browser)
        .await
        .expect("连接浏览器失败");

    let query: SearchQuery =
        QueryPrefixes::default().query(&Keyword::new("rust 入門"), Stage::Broad);
    let page = fetcher.fetch_page(&query).await.expect("抓取失败");

    println!("url: {}", page.signals.url);
    println!("命中数: {:?}, 结果 {} 条", page.hit_count, page.entries.len());
}
