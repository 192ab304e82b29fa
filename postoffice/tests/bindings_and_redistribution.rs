/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use integration_test_utils::{init_logging, message, message_with_duplicate_id, RecordingQueue};
use postoffice::{
    Address, Binding, BindingKind, Notification, PostOffice, PostOfficeConfig, RoutingError,
    Transaction,
};
use std::sync::Arc;

#[tokio::test]
async fn wildcard_bindings_fan_out_in_registration_order() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    let exact = RecordingQueue::new("exact");
    let single = RecordingQueue::new("single");
    let trailing = RecordingQueue::new("trailing");
    let other = RecordingQueue::new("other");
    post_office
        .add_binding(Binding::new("orders.eu.created", exact.clone()))
        .unwrap();
    post_office
        .add_binding(Binding::new("orders.*.created", single.clone()))
        .unwrap();
    post_office
        .add_binding(Binding::new("orders.#", trailing.clone()))
        .unwrap();
    post_office
        .add_binding(Binding::new("invoices.#", other.clone()))
        .unwrap();

    let outcome = post_office
        .route_direct(message("orders.eu.created"))
        .await
        .unwrap();

    assert_eq!(outcome.queues, vec!["exact", "single", "trailing"]);
    assert!(other.is_empty());

    let bare = post_office.route_direct(message("orders")).await.unwrap();
    assert_eq!(bare.queues, vec!["trailing"]);
}

#[tokio::test]
async fn removed_binding_stops_receiving() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    let first = RecordingQueue::new("first");
    let second = RecordingQueue::new("second");
    post_office
        .add_binding(Binding::new("orders.*", first.clone()))
        .unwrap();
    post_office
        .add_binding(Binding::new("orders.eu", second.clone()))
        .unwrap();

    post_office.route_direct(message("orders.eu")).await.unwrap();
    post_office.remove_binding("first").unwrap();
    let outcome = post_office.route_direct(message("orders.eu")).await.unwrap();

    assert_eq!(outcome.queues, vec!["second"]);
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert!(post_office.get_binding("first").is_none());
    assert!(matches!(
        post_office.remove_binding("first"),
        Err(RoutingError::BindingNotFound(_))
    ));
}

#[tokio::test]
async fn lookup_variants_and_invalid_patterns() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    post_office
        .add_binding(Binding::new("orders.#", RecordingQueue::new("q1")))
        .unwrap();

    let unseen = Address::new("orders.unseen");
    let matching = post_office.get_matching_bindings(&unseen);
    assert_eq!(matching.names(), vec!["q1"]);
    let created = post_office
        .get_bindings_for_address(&unseen, true)
        .unwrap();
    assert_eq!(created.len(), 1);
    assert!(post_office
        .lookup_bindings_for_address(&Address::new("invoices"))
        .is_none());

    assert!(matches!(
        post_office.add_binding(Binding::new("orders.#.eu", RecordingQueue::new("bad"))),
        Err(RoutingError::InvalidAddress { .. })
    ));
    assert!(matches!(
        post_office.add_binding(Binding::new("invoices", RecordingQueue::new("q1"))),
        Err(RoutingError::DuplicateBinding(_))
    ));
}

#[tokio::test]
async fn binding_changes_are_announced() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    let mut notifications = post_office.subscribe_notifications();

    post_office
        .add_binding(Binding::new("orders", RecordingQueue::new("q1")).with_name("orders-q1"))
        .unwrap();
    post_office.remove_binding("orders-q1").unwrap();

    assert_eq!(
        notifications.recv().await.unwrap(),
        Notification::BindingAdded {
            name: "orders-q1".to_string(),
            address: Address::new("orders"),
            queue: "q1".to_string(),
        }
    );
    assert_eq!(
        notifications.recv().await.unwrap(),
        Notification::BindingRemoved {
            name: "orders-q1".to_string(),
            address: Address::new("orders"),
        }
    );
}

#[tokio::test]
async fn reroute_targets_one_queue_without_duplicate_check() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    let primary = RecordingQueue::new("primary");
    let dead_letter = RecordingQueue::new("dead-letter");
    post_office
        .add_binding(Binding::new("orders", primary.clone()))
        .unwrap();
    post_office
        .add_binding(Binding::new("dlq", dead_letter.clone()))
        .unwrap();

    let original = message_with_duplicate_id("orders", "X");
    post_office.route_direct(original.clone()).await.unwrap();

    let outcome = post_office
        .reroute(Arc::new(original), "dead-letter", None)
        .await
        .unwrap();

    assert_eq!(outcome.queues, vec!["dead-letter"]);
    assert_eq!(primary.len(), 1);
    assert_eq!(dead_letter.len(), 1);
    assert!(matches!(
        post_office
            .reroute(Arc::new(message("orders")), "missing", None)
            .await,
        Err(RoutingError::BindingNotFound(_))
    ));
}

#[tokio::test]
async fn redistribution_forwards_to_remote_binding_of_same_subscription() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    let local = RecordingQueue::new("local-sub");
    let remote = RecordingQueue::new("remote-sub");
    let unrelated = RecordingQueue::new("remote-other");
    post_office
        .add_binding(Binding::new("orders", local.clone()).with_routing_name("subscription"))
        .unwrap();
    post_office
        .add_binding(
            Binding::new("orders", unrelated.clone())
                .with_routing_name("other")
                .with_kind(BindingKind::RemoteQueue),
        )
        .unwrap();
    post_office
        .add_binding(
            Binding::new("orders", remote.clone())
                .with_routing_name("subscription")
                .with_kind(BindingKind::RemoteQueue),
        )
        .unwrap();

    let routed = message_with_duplicate_id("orders", "X");
    post_office.route_direct(routed.clone()).await.unwrap();
    assert_eq!(remote.len(), 1);

    let tx = Transaction::new();
    let target = post_office
        .redistribute(Arc::new(routed), "local-sub", Some(&tx))
        .await
        .unwrap();
    assert_eq!(target.as_deref(), Some("remote-sub"));
    assert_eq!(remote.len(), 1);

    tx.commit().await.unwrap();
    assert_eq!(remote.len(), 2);
    assert_eq!(local.len(), 1);
    assert_eq!(unrelated.len(), 1);
}

#[tokio::test]
async fn redistribution_without_remote_binding_is_a_no_op() {
    init_logging();
    let post_office = PostOffice::new(PostOfficeConfig::default());
    let local = RecordingQueue::new("local-sub");
    post_office
        .add_binding(Binding::new("orders", local.clone()))
        .unwrap();

    let target = post_office
        .redistribute(Arc::new(message("orders")), "local-sub", None)
        .await
        .unwrap();

    assert!(target.is_none());
    assert!(local.is_empty());
}

#[tokio::test]
async fn post_office_starts_from_json5_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("postoffice.json5");
    std::fs::write(
        &path,
        "{\n  // small window, memory only\n  id_cache_size: 1,\n  persist_id_cache: false,\n}\n",
    )
    .unwrap();

    let config = PostOfficeConfig::from_file(&path).unwrap();
    let journal = Arc::new(postoffice::InMemoryDuplicateIdJournal::new());
    let post_office = PostOffice::start(config, journal).await.unwrap();
    post_office
        .add_binding(Binding::new("orders", RecordingQueue::new("q1")))
        .unwrap();

    post_office
        .route_direct(message_with_duplicate_id("orders", "a"))
        .await
        .unwrap();
    post_office
        .route_direct(message_with_duplicate_id("orders", "b"))
        .await
        .unwrap();
    post_office
        .route_direct(message_with_duplicate_id("orders", "a"))
        .await
        .unwrap();
    assert!(post_office
        .route_direct(message_with_duplicate_id("orders", "a"))
        .await
        .unwrap_err()
        .is_duplicate());
    post_office.stop().await;
}
