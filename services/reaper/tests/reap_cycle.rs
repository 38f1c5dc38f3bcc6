
use chrono::{TimeDelta, Utc};
use harness::{crashing, healthy, pod, pod_at, TestReaper, CRASH_LOOP};
use pod_reaper::{ReapAction, ReapRecord, ReaperError, TerminationCall};
use reaper_pod::{ContainerState, DELETION_COST_ANNOTATION};

#[tokio::test]
async fn reaps_only_pods_matching_every_rule() {
    let t = TestReaper::new(
        vec![
            crashing("old-crashing"),
            healthy("old-healthy"),
            pod(
                "young-crashing",
                "default",
                TimeDelta::minutes(1),
                ContainerState::waiting("CrashLoopBackOff"),
            ),
        ],
        &[CRASH_LOOP, ("MAX_DURATION", "30m")],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.candidates, 3);
    assert_eq!(stats.matched, 1);
    assert_eq!(stats.reaped, 1);
    assert_eq!(t.store.pod_names(), ["old-healthy", "young-crashing"]);

    let records = t.log.records();
    assert_eq!(records.len(), 1);
    let ReapRecord::Reaped {
        pod,
        action,
        reasons,
    } = &records[0]
    else {
        panic!("expected a reaped record, got {records:?}");
    };
    assert_eq!(pod, "default/old-crashing");
    assert_eq!(*action, ReapAction::Delete);
    assert_eq!(reasons.len(), 2);
    assert_eq!(reasons[0].rule, "container status in [CrashLoopBackOff]");
    assert_eq!(reasons[0].reason, "has container status CrashLoopBackOff");
    assert_eq!(reasons[1].rule, "maximum run duration 30m");
    assert!(reasons[1].reason.starts_with("has been running for 1h0m"));
}

#[tokio::test]
async fn cap_limits_terminations_in_sort_order() {
    let t = TestReaper::new(
        vec![crashing("a"), crashing("b"), crashing("c")],
        &[CRASH_LOOP, ("MAX_PODS", "2")],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.reaped, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(t.store.pod_names(), ["c"]);
    assert_eq!(
        t.log.records().last(),
        Some(&ReapRecord::CapReached {
            pod: "default/c".to_string(),
            cap: 2
        })
    );
}

#[tokio::test]
async fn zero_cap_is_unlimited() {
    let t = TestReaper::new(
        vec![crashing("a"), crashing("b"), crashing("c")],
        &[CRASH_LOOP, ("MAX_PODS", "0")],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();
    assert_eq!(stats.reaped, 3);
    assert!(t.store.pods().is_empty());
}

#[tokio::test]
async fn dry_run_removes_nothing_and_respects_cap() {
    let t = TestReaper::new(
        vec![crashing("a"), crashing("b"), crashing("c")],
        &[CRASH_LOOP, ("MAX_PODS", "2"), ("DRY_RUN", "true")],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.reaped, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(t.store.pods().len(), 3);
    assert!(t.store.calls().is_empty());

    let selected: Vec<String> = t
        .log
        .records()
        .iter()
        .filter(|r| matches!(r, ReapRecord::WouldReap { .. }))
        .map(|r| r.pod().to_string())
        .collect();
    assert_eq!(selected, ["default/a", "default/b"]);
}

#[tokio::test]
async fn grace_period_passes_through_on_delete() {
    let t = TestReaper::new(
        vec![crashing("a")],
        &[CRASH_LOOP, ("GRACE_PERIOD", "1m30s")],
    );

    t.reaper.reap_cycle().await.unwrap();

    assert_eq!(
        t.store.calls(),
        [TerminationCall {
            action: ReapAction::Delete,
            namespace: "default".to_string(),
            name: "a".to_string(),
            grace_period: Some(90),
        }]
    );
}

#[tokio::test]
async fn no_grace_period_keeps_pod_default() {
    let t = TestReaper::new(vec![crashing("a")], &[CRASH_LOOP]);
    t.reaper.reap_cycle().await.unwrap();
    assert_eq!(t.store.calls()[0].grace_period, None);
}

#[tokio::test]
async fn evict_uses_eviction_with_grace_period() {
    let t = TestReaper::new(
        vec![crashing("a")],
        &[CRASH_LOOP, ("EVICT", "true"), ("GRACE_PERIOD", "10s")],
    );

    t.reaper.reap_cycle().await.unwrap();

    let calls = t.store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, ReapAction::Evict);
    assert_eq!(calls[0].grace_period, Some(10));
    assert!(t.store.pods().is_empty());
}

#[tokio::test]
async fn rejected_eviction_is_not_fatal() {
    let t = TestReaper::new(
        vec![crashing("a"), crashing("b")],
        &[CRASH_LOOP, ("EVICT", "true")],
    );
    t.store.reject_evictions();

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.failed, 2);
    assert_eq!(stats.reaped, 0);
    assert_eq!(t.store.calls().len(), 2);
    assert!(t
        .log
        .records()
        .iter()
        .all(|r| matches!(r, ReapRecord::Failed { action: ReapAction::Evict, .. })));
}

#[tokio::test]
async fn listing_failure_aborts_cycle() {
    let t = TestReaper::new(vec![crashing("a")], &[CRASH_LOOP]);
    t.store.fail_list("the server is currently unable to handle the request");

    let err = t.reaper.reap_cycle().await.unwrap_err();

    assert!(matches!(err, ReaperError::Retrieval(_)));
    assert!(t.store.calls().is_empty());
    assert!(t.log.records().is_empty());
}

#[tokio::test]
async fn delete_failure_does_not_stop_later_pods() {
    let t = TestReaper::new(
        vec![crashing("a"), crashing("b"), crashing("c")],
        &[CRASH_LOOP],
    );
    t.store.fail_termination_of("default", "a");

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.reaped, 2);
    assert_eq!(t.store.pod_names(), ["a"]);
    assert_eq!(t.store.calls().len(), 3);
}

#[tokio::test]
async fn failed_termination_does_not_consume_cap_slot() {
    let t = TestReaper::new(
        vec![crashing("a"), crashing("b"), crashing("c")],
        &[CRASH_LOOP, ("MAX_PODS", "2")],
    );
    t.store.fail_termination_of("default", "a");

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.reaped, 2);
    assert_eq!(t.store.pod_names(), ["a"]);
}

#[tokio::test]
async fn failed_pod_is_retried_next_cycle() {
    let t = TestReaper::new(vec![crashing("a")], &[CRASH_LOOP]);
    t.store.fail_termination_of("default", "a");

    t.reaper.reap_cycle().await.unwrap();
    t.reaper.reap_cycle().await.unwrap();

    assert_eq!(t.store.calls().len(), 2);
}

#[tokio::test]
async fn namespace_scopes_listing() {
    let mut other = crashing("other");
    other.metadata.namespace = "kube-system".to_string();
    let t = TestReaper::new(
        vec![crashing("mine"), other],
        &[CRASH_LOOP, ("NAMESPACE", "default")],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.candidates, 1);
    assert_eq!(t.store.pods()[0].name(), "other");
}

#[tokio::test]
async fn label_requirements_filter_candidates() {
    let t = TestReaper::new(
        vec![
            crashing("excluded")
                .with_label("team", "platform")
                .with_label("pod-reaper/exclude", "true"),
            crashing("wrong-team").with_label("team", "data"),
            crashing("unlabelled"),
            crashing("included").with_label("team", "platform"),
        ],
        &[
            CRASH_LOOP,
            ("EXCLUDE_LABEL_KEY", "pod-reaper/exclude"),
            ("EXCLUDE_LABEL_VALUES", "true"),
            ("REQUIRE_LABEL_KEY", "team"),
            ("REQUIRE_LABEL_VALUES", "platform"),
        ],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.candidates, 1);
    assert_eq!(
        t.store.pod_names(),
        ["excluded", "wrong-team", "unlabelled"]
    );
}

#[tokio::test]
async fn annotation_requirement_filters_after_listing() {
    let t = TestReaper::new(
        vec![
            crashing("opted-in").with_annotation("pod-reaper/enabled", "true"),
            crashing("opted-out").with_annotation("pod-reaper/enabled", "false"),
            crashing("silent"),
        ],
        &[
            CRASH_LOOP,
            ("REQUIRE_ANNOTATION_KEY", "pod-reaper/enabled"),
            ("REQUIRE_ANNOTATION_VALUES", "true"),
        ],
    );

    t.reaper.reap_cycle().await.unwrap();

    assert_eq!(t.store.pod_names(), ["opted-out", "silent"]);
}

#[tokio::test]
async fn oldest_first_reaps_oldest_under_cap() {
    let now = Utc::now();
    let crash = || ContainerState::waiting("CrashLoopBackOff");
    let t = TestReaper::new(
        vec![
            pod_at("middle", "default", now - TimeDelta::hours(2), crash()),
            pod_at("youngest", "default", now - TimeDelta::hours(1), crash()),
            pod_at("oldest", "default", now - TimeDelta::hours(3), crash()),
        ],
        &[
            CRASH_LOOP,
            ("MAX_PODS", "1"),
            ("POD_SORTING_STRATEGY", "oldest-first"),
        ],
    );

    t.reaper.reap_cycle().await.unwrap();

    assert_eq!(t.store.pod_names(), ["middle", "youngest"]);
}

#[tokio::test]
async fn youngest_first_reaps_youngest_under_cap() {
    let now = Utc::now();
    let crash = || ContainerState::waiting("CrashLoopBackOff");
    let t = TestReaper::new(
        vec![
            pod_at("middle", "default", now - TimeDelta::hours(2), crash()),
            pod_at("youngest", "default", now - TimeDelta::hours(1), crash()),
            pod_at("oldest", "default", now - TimeDelta::hours(3), crash()),
        ],
        &[
            CRASH_LOOP,
            ("MAX_PODS", "1"),
            ("POD_SORTING_STRATEGY", "youngest-first"),
        ],
    );

    t.reaper.reap_cycle().await.unwrap();

    assert_eq!(t.store.pod_names(), ["middle", "oldest"]);
}

#[tokio::test]
async fn deletion_cost_reaps_cheapest_first() {
    let t = TestReaper::new(
        vec![
            crashing("costly").with_annotation(DELETION_COST_ANNOTATION, "1000"),
            crashing("default-cost"),
            crashing("cheap").with_annotation(DELETION_COST_ANNOTATION, "-10"),
        ],
        &[
            CRASH_LOOP,
            ("MAX_PODS", "2"),
            ("POD_SORTING_STRATEGY", "priority-cost"),
        ],
    );

    t.reaper.reap_cycle().await.unwrap();

    assert_eq!(t.store.pod_names(), ["costly"]);
}

#[tokio::test]
async fn random_sort_still_honours_cap() {
    let t = TestReaper::new(
        (0..10).map(|i| crashing(&format!("pod-{i}"))).collect(),
        &[
            CRASH_LOOP,
            ("MAX_PODS", "3"),
            ("POD_SORTING_STRATEGY", "random"),
        ],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.reaped, 3);
    assert_eq!(t.store.pods().len(), 7);
}

#[tokio::test]
async fn chaos_zero_spares_everything() {
    let t = TestReaper::new(
        vec![crashing("a"), healthy("b")],
        &[("CHAOS_CHANCE", "0.0")],
    );

    let stats = t.reaper.reap_cycle().await.unwrap();

    assert_eq!(stats.matched, 0);
    assert!(t.log.records().is_empty());
    assert_eq!(t.store.pods().len(), 2);
}
