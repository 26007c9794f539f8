mod support;

use matchlink_core::{EventPayload, EventType, MatchState, PlayerId};
use matchlink_p2p::{ChannelKind, HandshakeState};
use support::{logged, roster_ids, MatchFixture};

const CHAT: EventType = EventType(20);

#[test]
fn test_two_joiners_converge_on_same_roster() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.add_joiner("bob", "Bob");

    fixture.join_all();
    fixture.tick(3);

    let expected = vec!["alice", "bob", "host"];
    assert_eq!(roster_ids(&fixture.host), expected);
    for joiner in &fixture.joiners {
        assert_eq!(roster_ids(joiner), expected);
    }

    // Spawn slots are unique
    let mut slots: Vec<u8> = fixture.host.roster().iter().map(|p| p.spawn_index()).collect();
    slots.sort();
    slots.dedup();
    assert_eq!(slots.len(), 3);

    for token in &fixture.joiner_tokens {
        assert_eq!(fixture.host.handshake_state(token), HandshakeState::Joined);
    }
}

#[test]
fn test_joiner_sees_own_entry_from_matchmaking() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();
    fixture.tick(1);

    let connected = logged(&fixture.joiners[0], EventType::PLAYER_CONNECTED);
    let own: Vec<_> = connected
        .iter()
        .filter(|e| matches!(&e.payload, EventPayload::PlayerConnected { from_matchmaking: true, .. }))
        .collect();
    assert_eq!(own.len(), 1);

    let info = fixture.joiners[0].info().expect("joiner should know the match");
    assert_eq!(info.total_slots, 4);

    let host_side = logged(&fixture.host, EventType::PLAYER_CONNECTED);
    assert_eq!(host_side.len(), 1);
}

#[test]
fn test_full_match_refuses_and_allocates_nothing() {
    let mut fixture = MatchFixture::new(2);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();

    let late = fixture.add_joiner("bob", "Bob");
    let bob_token = fixture.joiner_tokens[late];
    let refused = fixture.tick_until(100, |f| {
        f.host.handshake_state(&bob_token) == HandshakeState::Rejected
            || !f.host.peers().contains(&bob_token)
    });
    assert!(refused);
    fixture.tick(40);

    assert_eq!(roster_ids(&fixture.host), vec!["alice", "host"]);
    assert!(!fixture.joiners[late].is_joined());
    assert!(!fixture.host.peers().contains(&bob_token));

    let lost_host = logged(&fixture.joiners[late], EventType::HOST_DISCONNECTED);
    assert_eq!(lost_host.len(), 1);
    assert_eq!(lost_host[0].payload, EventPayload::HostDisconnected { graceful: true });
}

#[test]
fn test_events_queued_during_snapshot_arrive_in_order() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();

    let late = fixture.add_joiner("bob", "Bob");
    let bob_token = fixture.joiner_tokens[late];
    assert!(fixture.tick_until(100, |f| {
        f.host.handshake_state(&bob_token) == HandshakeState::SnapshotSent
    }));

    for value in 1..=3u8 {
        fixture
            .host
            .send_event(CHAT, vec![value], ChannelKind::ReliableOrdered)
            .unwrap();
    }
    fixture.join_all();
    fixture.tick(3);

    let seen: Vec<Vec<u8>> = logged(&fixture.joiners[late], CHAT)
        .iter()
        .filter_map(|e| e.bytes().map(|b| b.to_vec()))
        .collect();
    assert_eq!(seen, vec![vec![1], vec![2], vec![3]]);

    // Alice was already joined and got them immediately
    assert_eq!(logged(&fixture.joiners[0], CHAT).len(), 3);
}

#[test]
fn test_remote_event_carries_sender() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();

    fixture.joiners[0]
        .send_event(CHAT, b"hi".to_vec(), ChannelKind::ReliableUnordered)
        .unwrap();
    fixture.tick(2);

    let received = logged(&fixture.host, CHAT);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender, Some(PlayerId::new("alice").unwrap()));
    assert_eq!(received[0].bytes(), Some(&b"hi"[..]));
}

#[test]
fn test_reserved_event_type_is_refused_locally() {
    let mut fixture = MatchFixture::new(2);
    assert!(fixture
        .host
        .send_event(EventType::PLAYER_CONNECTED, vec![], ChannelKind::ReliableOrdered)
        .is_err());
}

#[test]
fn test_graceful_leave_updates_everyone() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.add_joiner("bob", "Bob");
    fixture.join_all();

    let now = fixture.now();
    fixture.joiners[0].leave(now);
    fixture.tick(40);

    assert_eq!(roster_ids(&fixture.host), vec!["bob", "host"]);
    assert_eq!(roster_ids(&fixture.joiners[1]), vec!["bob", "host"]);

    let gone = logged(&fixture.host, EventType::PLAYER_DISCONNECTED);
    assert_eq!(gone.len(), 1);
    assert_eq!(
        gone[0].payload,
        EventPayload::PlayerDisconnected {
            player_id: PlayerId::new("alice").unwrap(),
            graceful: true,
        }
    );
    assert_eq!(logged(&fixture.joiners[1], EventType::PLAYER_DISCONNECTED).len(), 1);
}

#[test]
fn test_freed_slot_can_be_reused() {
    let mut fixture = MatchFixture::new(2);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();
    let alice_slot = fixture
        .host
        .roster()
        .get(&PlayerId::new("alice").unwrap())
        .unwrap()
        .spawn_index();

    let now = fixture.now();
    fixture.joiners[0].leave(now);
    fixture.tick(40);
    assert_eq!(roster_ids(&fixture.host), vec!["host"]);

    let carol = fixture.add_joiner("carol", "Carol");
    assert!(fixture.tick_until(100, |f| f.joiners[carol].is_joined()));
    let carol_slot = fixture
        .host
        .roster()
        .get(&PlayerId::new("carol").unwrap())
        .unwrap()
        .spawn_index();
    assert_eq!(carol_slot, alice_slot);
}

#[test]
fn test_host_failure_reaches_joiner() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();

    fixture
        .network
        .sever(fixture.host_token, fixture.joiner_tokens[0]);
    fixture.tick(2);

    let lost = logged(&fixture.joiners[0], EventType::HOST_DISCONNECTED);
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].payload, EventPayload::HostDisconnected { graceful: false });
    assert!(!fixture.joiners[0].is_joined());

    let gone = logged(&fixture.host, EventType::PLAYER_DISCONNECTED);
    assert_eq!(gone.len(), 1);
    assert!(matches!(
        gone[0].payload,
        EventPayload::PlayerDisconnected { graceful: false, .. }
    ));
    assert_eq!(roster_ids(&fixture.host), vec!["host"]);
}

#[test]
fn test_host_leaving_is_graceful_for_joiners() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();

    let now = fixture.now();
    fixture.host.leave(now);
    fixture.tick(40);

    let lost = logged(&fixture.joiners[0], EventType::HOST_DISCONNECTED);
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].payload, EventPayload::HostDisconnected { graceful: true });
    assert!(fixture.host.peers().is_empty());
}

#[test]
fn test_pings_fill_in_latency() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.add_joiner("bob", "Bob");
    fixture.join_all();

    // Past one ping interval and one relay interval
    fixture.tick(200);

    let alice = PlayerId::new("alice").unwrap();
    let host = PlayerId::new("host").unwrap();
    assert!(fixture.host.roster().get(&alice).unwrap().ping_ms().is_some());
    assert!(fixture.joiners[0].roster().get(&host).unwrap().ping_ms().is_some());
    // Relayed by the host
    assert!(fixture.joiners[1].roster().get(&alice).unwrap().ping_ms().is_some());
    assert!(!logged(&fixture.host, EventType::PING_UPDATED).is_empty());
}

#[test]
fn test_match_state_change_is_local_to_host() {
    let mut fixture = MatchFixture::new(4);
    fixture.add_joiner("alice", "Alice");
    fixture.join_all();

    fixture.host.set_match_state(MatchState::InProgress).unwrap();
    fixture.tick(1);

    let changed = logged(&fixture.host, EventType::MATCH_STATE_CHANGED);
    assert_eq!(changed.len(), 1);
    assert_eq!(fixture.host.info().unwrap().state, MatchState::InProgress);
    assert!(fixture.joiners[0].set_match_state(MatchState::Finished).is_err());
}
