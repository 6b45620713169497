//! 통합 테스트 -- 인시던트 큐에서 ack/nack 정산까지의 전체 흐름 검증

#![cfg(unix)]

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use remedy_core::codec;
use remedy_core::config::BrokerConfig;
use remedy_core::endpoint::{PublishEndpoint, QueueEndpoint};
use remedy_core::pipeline::Pipeline;
use remedy_core::queue::{Delivery, DeliveryStream, MemoryBroker, MemoryChannel, QueueTransport};
use remedy_core::types::{Incident, Rule, Stage};
use remedy_executor::{
    CommandRunner, Disposition, ExecutorPipelineBuilder, ExecutorSettings, ExecutorStats,
    IncidentExecutor,
};
use tokio_util::sync::CancellationToken;

const PASS: &str = r#"echo '{"success":true,"passed":true,"result":"ok"}'"#;
const FAIL: &str = r#"echo '{"success":true,"passed":false,"result":"not fixed"}'"#;

fn script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn incident(pre: &str, fix: &str, post: &str) -> Incident {
    let rule = Rule {
        name: "ssh_bruteforce".to_owned(),
        alert_type: "auth".to_owned(),
        device_type: "server".to_owned(),
        regex: r"from (?P<ip>\S+)".to_owned(),
        pre_audits: vec![pre.to_owned()],
        remediations: vec![fix.to_owned()],
        post_audits: vec![post.to_owned()],
    };
    let mut params = BTreeMap::new();
    params.insert("ip".to_owned(), "10.0.0.7".to_owned());
    Incident::from_match(&rule, params, "Failed password from 10.0.0.7", "SYSLOGPROC")
}

async fn producer(broker: &MemoryBroker) -> MemoryChannel {
    let channel = broker.channel();
    channel.connect(&BrokerConfig::default()).await.unwrap();
    channel.declare_queue("incident").await.unwrap();
    channel
}

async fn consumer(broker: &MemoryBroker) -> (MemoryChannel, DeliveryStream) {
    let channel = broker.channel();
    channel.connect(&BrokerConfig::default()).await.unwrap();
    channel.set_qos(1).await.unwrap();
    let stream = channel.consume("incident").await.unwrap();
    (channel, stream)
}

async fn next(stream: &mut DeliveryStream) -> Delivery {
    tokio::time::timeout(Duration::from_secs(2), stream.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn dead_letter_endpoint(broker: &MemoryBroker) -> PublishEndpoint<MemoryChannel> {
    let mut endpoint = PublishEndpoint::new(
        Arc::new(broker.channel()),
        BrokerConfig::default(),
        "incident.dead",
    );
    endpoint.connect().await.unwrap();
    endpoint
}

fn executor(dir: &Path, max_attempts: u32) -> IncidentExecutor {
    IncidentExecutor::new(
        Arc::new(CommandRunner::new(dir)),
        Duration::from_secs(10),
        max_attempts,
        Arc::new(ExecutorStats::default()),
    )
}

/// 세 스테이지 모두 통과하면 ack되어 큐에서 제거됨
#[tokio::test]
async fn passing_incident_is_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    script(dir.path(), "pass.sh", PASS);

    let broker = MemoryBroker::new();
    let publisher = producer(&broker).await;
    let body = codec::encode(&incident("pass.sh", "pass.sh", "pass.sh")).unwrap();
    publisher.publish("incident", body).await.unwrap();

    let (_channel, mut stream) = consumer(&broker).await;
    let delivery = next(&mut stream).await;
    let mut dead = dead_letter_endpoint(&broker).await;
    let executor = executor(dir.path(), 10);

    let disposition = executor
        .process(delivery, &mut dead, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Acknowledged);
    assert_eq!(broker.queue_len("incident"), 0);
    assert_eq!(executor.stats().acknowledged(), 1);
}

/// 사후 감사가 실패하면 ack되지 않고 재큐잉됨
#[tokio::test]
async fn failing_post_audit_requeues() {
    let dir = tempfile::tempdir().unwrap();
    script(dir.path(), "pass.sh", PASS);
    script(dir.path(), "fail.sh", FAIL);

    let broker = MemoryBroker::new();
    let publisher = producer(&broker).await;
    let body = codec::encode(&incident("pass.sh", "pass.sh", "fail.sh")).unwrap();
    publisher.publish("incident", body.clone()).await.unwrap();

    let (channel, mut stream) = consumer(&broker).await;
    let delivery = next(&mut stream).await;
    let mut dead = dead_letter_endpoint(&broker).await;
    let executor = executor(dir.path(), 10);

    let disposition = executor
        .process(delivery, &mut dead, &CancellationToken::new())
        .await
        .unwrap();
    // 재큐잉된 메시지가 같은 구독자에게 다시 전달되지 않도록 채널을 닫음
    channel.close().await.unwrap();
    drop(stream);

    assert_eq!(disposition, Disposition::Requeued(Stage::PostAudit));
    assert_eq!(executor.stats().acknowledged(), 0);
    assert_eq!(broker.queue_len("incident"), 1);
    assert_eq!(broker.peek_messages("incident")[0], body);
}

/// 여러 명령 중 하나만 실패해도 스테이지 전체가 실패하고 재큐잉됨
#[tokio::test]
async fn one_failing_command_in_stage_requeues() {
    let dir = tempfile::tempdir().unwrap();
    let post_marker = dir.path().join("post_audit_ran");
    script(dir.path(), "pass.sh", PASS);
    script(dir.path(), "fail.sh", FAIL);
    script(dir.path(), "flush_cache.sh", PASS);
    script(
        dir.path(),
        "verify.sh",
        &format!("touch {}\n{PASS}", post_marker.display()),
    );

    let mut incident = incident("pass.sh", "pass.sh", "verify.sh");
    incident.remediations = ["pass.sh", "fail.sh", "flush_cache.sh"]
        .into_iter()
        .map(|cmd| remedy_core::types::Command::bind(cmd, &incident.parameters))
        .collect();

    let broker = MemoryBroker::new();
    let publisher = producer(&broker).await;
    let body = codec::encode(&incident).unwrap();
    publisher.publish("incident", body.clone()).await.unwrap();

    let (channel, mut stream) = consumer(&broker).await;
    let delivery = next(&mut stream).await;
    let mut dead = dead_letter_endpoint(&broker).await;
    let executor = executor(dir.path(), 10);

    let disposition = executor
        .process(delivery, &mut dead, &CancellationToken::new())
        .await
        .unwrap();
    channel.close().await.unwrap();
    drop(stream);

    assert_eq!(disposition, Disposition::Requeued(Stage::Remediation));
    assert_eq!(executor.stats().acknowledged(), 0);
    assert_eq!(broker.queue_len("incident"), 1);
    assert_eq!(broker.peek_messages("incident")[0], body);
    assert!(!post_marker.exists(), "post-audit must not run after a failed stage");
}

/// 잘못된 본문은 재큐잉 없이 폐기됨
#[tokio::test]
async fn malformed_body_is_discarded() {
    let dir = tempfile::tempdir().unwrap();

    let broker = MemoryBroker::new();
    let publisher = producer(&broker).await;
    publisher
        .publish("incident", Bytes::from_static(br#"{"Engine":"SYSLOGPROC"}"#))
        .await
        .unwrap();

    let (_channel, mut stream) = consumer(&broker).await;
    let delivery = next(&mut stream).await;
    let mut dead = dead_letter_endpoint(&broker).await;
    let executor = executor(dir.path(), 10);

    let disposition = executor
        .process(delivery, &mut dead, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Discarded);
    assert_eq!(broker.queue_len("incident"), 0);
    assert_eq!(broker.queue_len("incident.dead"), 0);
}

/// 전달 횟수 한도를 넘으면 dead-letter 큐로 이동
#[tokio::test]
async fn exhausted_incident_is_dead_lettered() {
    let dir = tempfile::tempdir().unwrap();
    script(dir.path(), "fail.sh", FAIL);

    let broker = MemoryBroker::new();
    let publisher = producer(&broker).await;
    let body = codec::encode(&incident("fail.sh", "fail.sh", "fail.sh")).unwrap();
    publisher.publish("incident", body.clone()).await.unwrap();

    let mut dead = dead_letter_endpoint(&broker).await;
    let executor = executor(dir.path(), 2);
    let cancel = CancellationToken::new();

    let (_channel, mut stream) = consumer(&broker).await;
    let mut dispositions = Vec::new();
    for attempt in 1..=3 {
        let delivery = next(&mut stream).await;
        assert_eq!(delivery.delivery_count, attempt);
        dispositions.push(executor.process(delivery, &mut dead, &cancel).await.unwrap());
    }

    assert_eq!(
        dispositions,
        vec![
            Disposition::Requeued(Stage::PreAudit),
            Disposition::Requeued(Stage::PreAudit),
            Disposition::DeadLettered,
        ]
    );
    assert_eq!(broker.queue_len("incident"), 0);
    assert_eq!(broker.peek_messages("incident.dead"), vec![body]);
    assert_eq!(executor.stats().dead_lettered(), 1);
}

/// 파이프라인이 큐의 인시던트를 처리하고 스크립트에 인자를 전달함
#[tokio::test]
async fn pipeline_runs_remediation_with_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("blocked");
    script(dir.path(), "pass.sh", PASS);
    script(
        dir.path(),
        "block.sh",
        &format!("echo \"$1\" > {}\n{PASS}", marker.display()),
    );

    let broker = MemoryBroker::new();
    let mut pipeline = ExecutorPipelineBuilder::new()
        .settings(
            ExecutorSettings::default()
                .with_remediations_dir(dir.path())
                .with_stage_timeout(Duration::from_secs(10)),
        )
        .transports(Arc::new(broker.channel()), Arc::new(broker.channel()))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    let publisher = producer(&broker).await;
    let body = codec::encode(&incident("pass.sh", "block.sh", "pass.sh")).unwrap();
    publisher.publish("incident", body).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while pipeline.stats().acknowledged() < 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    pipeline.stop().await.unwrap();

    assert_eq!(pipeline.stats().acknowledged(), 1);
    assert_eq!(broker.queue_len("incident"), 0);
    assert_eq!(
        std::fs::read_to_string(&marker).unwrap().trim(),
        "--ip=10.0.0.7"
    );
}

/// 타임아웃을 넘긴 스크립트는 종료되고 인시던트는 재큐잉됨
#[tokio::test]
async fn slow_remediation_times_out_and_requeues() {
    let dir = tempfile::tempdir().unwrap();
    script(dir.path(), "pass.sh", PASS);
    script(dir.path(), "slow.sh", "sleep 30");

    let broker = MemoryBroker::new();
    let mut pipeline = ExecutorPipelineBuilder::new()
        .settings(
            ExecutorSettings::default()
                .with_remediations_dir(dir.path())
                .with_stage_timeout(Duration::from_millis(300)),
        )
        .transports(Arc::new(broker.channel()), Arc::new(broker.channel()))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    let publisher = producer(&broker).await;
    let body = codec::encode(&incident("pass.sh", "slow.sh", "pass.sh")).unwrap();
    publisher.publish("incident", body).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while pipeline.stats().requeued() < 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    pipeline.stop().await.unwrap();

    assert!(pipeline.stats().requeued() >= 1);
    assert_eq!(pipeline.stats().acknowledged(), 0);
    assert_eq!(broker.queue_len("incident"), 1);
}
