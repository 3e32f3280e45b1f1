mod common;

use bagnode_core::{BagNode, Context, Error, NodeOptions};
use common::*;

#[test]
fn test_requested_topics_are_looked_up() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder"));
    let _a = node.create_generic_publisher("/a", STRING_TYPE).unwrap();
    let _b = node.create_generic_publisher("/b", INT32_TYPE).unwrap();

    let topics = node.get_topics_with_types(&["/a", "/bo gus"]);
    assert_eq!(topics.len(), 1);
    assert_eq!(topics["/a"], STRING_TYPE);
}

#[test]
fn test_missing_topics_are_omitted() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder"));
    let _a = node.create_generic_publisher("/a", STRING_TYPE).unwrap();

    assert!(node.get_topics_with_types(&["/nowhere"]).is_empty());
    assert!(node.get_topics_with_types::<&str>(&[]).is_empty());
}

#[test]
fn test_relative_requests_use_the_node_namespace() {
    let fixture = Fixture::new();
    let talker = fixture.remote_node(NodeOptions::new("talker"));
    let _chatter = talker
        .create_generic_publisher("/robot/chatter", STRING_TYPE)
        .unwrap();

    let recorder = fixture.node(NodeOptions::new("recorder").with_namespace("/robot"));
    let topics = recorder.get_topics_with_types(&["chatter", "/robot/chatter"]);

    assert_eq!(topics.len(), 1);
    assert_eq!(topics["/robot/chatter"], STRING_TYPE);
}

#[test]
fn test_conflicting_topic_is_never_returned() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder"));
    let _as_string = node.create_generic_publisher("/a", STRING_TYPE).unwrap();
    let _as_int = node.create_generic_publisher("/a", INT32_TYPE).unwrap();
    let _b = node.create_generic_publisher("/b", INT32_TYPE).unwrap();

    let all = node.get_topic_names_and_types();
    assert_eq!(all["/a"].len(), 2);

    let requested = node.get_topics_with_types(&["/a", "/b"]);
    assert_eq!(requested.len(), 1);
    assert_eq!(requested["/b"], INT32_TYPE);

    let everything = node.get_all_topics_with_types();
    assert!(!everything.contains_key("/a"));
    assert_eq!(everything["/b"], INT32_TYPE);
}

#[test]
fn test_subscriptions_count_as_topic_endpoints() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder"));
    let _sub = node
        .create_generic_subscription("/only_subscribed", INT32_TYPE, |_| {})
        .unwrap()
        .unwrap();

    assert_eq!(
        node.get_all_topics_with_types()["/only_subscribed"],
        INT32_TYPE
    );
}

#[test]
fn test_dropped_endpoints_leave_the_graph() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder"));
    let publisher = node.create_generic_publisher("/a", STRING_TYPE).unwrap();
    assert_eq!(node.get_all_topics_with_types().len(), 1);

    drop(publisher);
    assert!(node.get_all_topics_with_types().is_empty());
}

#[test]
fn test_expand_topic_name() {
    let fixture = Fixture::new();
    let node = fixture.node(
        NodeOptions::new("recorder")
            .with_namespace("/robot")
            .with_substitution("camera", "front"),
    );

    assert_eq!(node.expand_topic_name("chatter"), "/robot/chatter");
    assert_eq!(node.expand_topic_name("/chatter"), "/chatter");
    assert_eq!(node.expand_topic_name("~/status"), "/robot/recorder/status");
    assert_eq!(node.expand_topic_name("{node}/debug"), "/robot/recorder/debug");
    assert_eq!(node.expand_topic_name("{camera}/image"), "/robot/front/image");
}

#[test]
fn test_expand_topic_name_failures_are_empty() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder"));

    for name in ["", "bad name", "{missing}/x", "a//b", "/a/", "/1abc", "a~b", "{open"] {
        assert_eq!(node.expand_topic_name(name), "", "expanding {name:?}");
    }
}

#[test]
fn test_expand_topic_name_is_idempotent() {
    let fixture = Fixture::new();
    let node = fixture.node(NodeOptions::new("recorder").with_namespace("/robot"));

    for name in ["chatter", "~", "~/a/b", "{ns}/x", "/abs/path"] {
        let once = node.expand_topic_name(name);
        assert!(!once.is_empty());
        assert_eq!(node.expand_topic_name(&once), once);
    }
}

#[test]
fn test_invalid_node_identity_is_rejected() {
    let fixture = Fixture::new();

    for options in [
        NodeOptions::new("bad-name"),
        NodeOptions::new("1st"),
        NodeOptions::new("recorder").with_namespace("/robot/"),
    ] {
        let result = BagNode::new(
            options,
            Context::new(),
            fixture.graph.participant(),
            fixture.registry.clone(),
        );
        assert!(matches!(result, Err(Error::NameResolution { .. })));
    }
}

#[test]
fn test_broken_substitution_table_degrades_every_expansion() {
    let fixture = Fixture::new();
    let talker = fixture.remote_node(NodeOptions::new("talker"));
    let _chatter = talker.create_generic_publisher("/chatter", STRING_TYPE).unwrap();

    for options in [
        NodeOptions::new("recorder").with_substitution("node", "other"),
        NodeOptions::new("recorder").with_substitution("bad key", "x"),
        NodeOptions::new("recorder").with_substitution("key", "{x}"),
    ] {
        let node = fixture.node(options);

        assert_eq!(node.expand_topic_name("/chatter"), "");
        assert_eq!(node.expand_topic_name("chatter"), "");
        assert!(node.get_topics_with_types(&["/chatter"]).is_empty());
        assert_eq!(node.get_all_topics_with_types()["/chatter"], STRING_TYPE);

        let subscription = node
            .create_generic_subscription("/chatter", STRING_TYPE, |_| {})
            .unwrap();
        assert!(subscription.is_none());

        let publisher = node.create_generic_publisher("/chatter", STRING_TYPE);
        assert!(matches!(publisher, Err(Error::NameResolution { .. })));
    }
}
