use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkbot::core::models::{ChannelMembership, InboundEvent, OutgoingMessage, ThreadKey};
use linkbot::engine::{LinkEngine, LinkTemplate, PatternMatcher, ThreadContext};
use linkbot::errors::BotError;
use linkbot::worker::{CycleOutcome, EventSource, MembershipProvider, MessagePoster, Poller};

struct ScriptedSource {
    batches: VecDeque<Result<Vec<InboundEvent>, BotError>>,
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next_batch(
        &mut self,
        _membership: &ChannelMembership,
    ) -> Result<Vec<InboundEvent>, BotError> {
        self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Clone, Default)]
struct FakeDirectory {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl MembershipProvider for FakeDirectory {
    async fn member_channels(&self) -> Result<ChannelMembership, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::ApiError("ratelimited".to_string()));
        }
        Ok(["C1"].into_iter().collect())
    }
}

#[derive(Clone, Default)]
struct FakePoster {
    failing: Arc<AtomicBool>,
    posted: Arc<Mutex<Vec<OutgoingMessage>>>,
}

#[async_trait]
impl MessagePoster for FakePoster {
    async fn post(&self, message: &OutgoingMessage) -> Result<(), BotError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::HttpError("connection reset".to_string()));
        }
        self.posted.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn engine() -> LinkEngine {
    LinkEngine::new(
        PatternMatcher::new(r"\b([A-Z]+-\d+)\b").unwrap(),
        LinkTemplate::new("https://jira.example.com/browse/{}").unwrap(),
        ThreadContext::new(),
    )
}

fn poller(
    batches: Vec<Result<Vec<InboundEvent>, BotError>>,
    directory: FakeDirectory,
    poster: FakePoster,
) -> Poller<ScriptedSource, FakeDirectory, FakePoster> {
    let source = ScriptedSource {
        batches: batches.into(),
    };
    Poller::new(engine(), source, directory, poster)
        .with_intervals(Duration::from_secs(2), Duration::from_secs(60))
}

#[tokio::test]
async fn test_reply_posted_and_recorded() {
    let poster = FakePoster::default();
    let batch = vec![InboundEvent::message("C1", "1.0", "OPS-1 is on fire")];
    let mut poller = poller(vec![Ok(batch)], FakeDirectory::default(), poster.clone());

    let outcome = poller.run_cycle().await.unwrap();
    let CycleOutcome::Replied(message) = outcome else {
        panic!("expected a reply");
    };
    assert_eq!(message.formatted_text, "https://jira.example.com/browse/OPS-1");
    assert_eq!(poster.posted.lock().unwrap().len(), 1);
    assert!(
        poller
            .engine()
            .context()
            .is_recorded(&ThreadKey::new("1.0"), "OPS-1")
    );
}

#[tokio::test]
async fn test_failed_post_is_not_recorded() {
    let poster = FakePoster::default();
    poster.failing.store(true, Ordering::SeqCst);
    let event = InboundEvent::message("C1", "1.0", "OPS-1 again");
    let mut poller = poller(
        vec![Ok(vec![event.clone()]), Ok(vec![event])],
        FakeDirectory::default(),
        poster.clone(),
    );

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, BotError::HttpError(_)));
    assert_eq!(poller.engine().context().thread_count(), 0);

    // once delivery works again the same value is still eligible
    poster.failing.store(false, Ordering::SeqCst);
    let outcome = poller.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Replied(_)));
}

#[tokio::test]
async fn test_one_reply_per_cycle() {
    let poster = FakePoster::default();
    let batch = vec![
        InboundEvent::message("C1", "1.0", "OPS-1"),
        InboundEvent::message("C1", "2.0", "OPS-2"),
    ];
    let mut poller = poller(vec![Ok(batch)], FakeDirectory::default(), poster.clone());

    poller.run_cycle().await.unwrap();
    let posted = poster.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].match_values, vec!["OPS-1"]);
}

#[tokio::test]
async fn test_duplicate_in_thread_gets_no_second_reply() {
    let poster = FakePoster::default();
    let mut poller = poller(
        vec![
            Ok(vec![InboundEvent::message("C1", "1.0", "OPS-1")]),
            Ok(vec![InboundEvent::message("C1", "2.0", "OPS-1").in_thread("1.0")]),
        ],
        FakeDirectory::default(),
        poster.clone(),
    );

    assert!(matches!(
        poller.run_cycle().await.unwrap(),
        CycleOutcome::Replied(_)
    ));
    assert_eq!(poller.run_cycle().await.unwrap(), CycleOutcome::Idle);
    assert_eq!(poster.posted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_source_error_surfaces() {
    let mut poller = poller(
        vec![Err(BotError::ApiError("not_authed".to_string()))],
        FakeDirectory::default(),
        FakePoster::default(),
    );
    assert!(matches!(
        poller.run_cycle().await,
        Err(BotError::ApiError(_))
    ));
}

#[tokio::test]
async fn test_no_membership_means_idle() {
    let directory = FakeDirectory::default();
    directory.failing.store(true, Ordering::SeqCst);
    let poster = FakePoster::default();
    let mut poller = poller(
        vec![Ok(vec![InboundEvent::message("C1", "1.0", "OPS-1")])],
        directory.clone(),
        poster.clone(),
    );

    assert_eq!(poller.run_cycle().await.unwrap(), CycleOutcome::Idle);
    assert!(poller.membership().is_none());
    assert!(poster.posted.lock().unwrap().is_empty());

    // without a cached membership every cycle retries the listing
    poller.run_cycle().await.unwrap();
    assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_membership_refreshed_on_interval() {
    let directory = FakeDirectory::default();
    let mut poller = poller(Vec::new(), directory.clone(), FakePoster::default());

    poller.run_cycle().await.unwrap();
    poller.run_cycle().await.unwrap();
    assert_eq!(directory.calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    poller.run_cycle().await.unwrap();
    assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_membership() {
    let directory = FakeDirectory::default();
    let poster = FakePoster::default();
    let mut poller = poller(
        vec![
            Ok(Vec::new()),
            Ok(vec![InboundEvent::message("C1", "1.0", "OPS-7")]),
        ],
        directory.clone(),
        poster.clone(),
    );

    poller.run_cycle().await.unwrap();
    directory.failing.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(61)).await;

    let outcome = poller.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Replied(_)));
    assert!(poller.membership().is_some_and(|m| m.contains("C1")));
}
