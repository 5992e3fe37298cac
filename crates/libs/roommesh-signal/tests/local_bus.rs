use roommesh_signal::{
    LocalBus, ParticipantId, RoomOptions, SignalEvent, SignalMessage, SignalingChannel, Target,
};
use std::sync::{Arc, Barrier};
use std::thread;

const ROOM: &str = "UWBMixedReality";

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<SignalEvent>) -> Vec<SignalEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn racing_creators_yield_one_coordinator() {
    let bus = LocalBus::new();
    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let (channel, rx) = bus.attach();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                channel.connect().expect("connect");
                barrier.wait();
                channel.create_room(ROOM, RoomOptions { max_participants: 16 }).expect("create");
                (channel, rx)
            })
        })
        .collect();

    let mut created = 0;
    let mut joined = 0;
    let mut coordinators = Vec::new();
    for handle in handles {
        let (channel, mut rx) = handle.join().expect("contender thread");
        for event in drain(&mut rx) {
            match event {
                SignalEvent::RoomCreated { .. } => {
                    created += 1;
                    coordinators.push(channel.local_id());
                }
                SignalEvent::RoomJoined { .. } => joined += 1,
                _ => {}
            }
        }
    }

    assert_eq!(created, 1);
    assert_eq!(joined, contenders);
    assert_eq!(bus.coordinator_of(ROOM), coordinators.first().copied());
    assert_eq!(bus.room_members(ROOM).len(), contenders);
}

#[test]
fn routing_by_target() {
    let bus = LocalBus::new();
    let (coordinator, mut coordinator_rx) = bus.attach();
    let (viewer_a, mut a_rx) = bus.attach();
    let (viewer_b, mut b_rx) = bus.attach();

    coordinator.connect().expect("connect");
    coordinator.create_room(ROOM, RoomOptions::default()).expect("create");
    for viewer in [&viewer_a, &viewer_b] {
        viewer.connect().expect("connect");
        viewer.join_room(ROOM).expect("join");
    }
    drain(&mut coordinator_rx);
    drain(&mut a_rx);
    drain(&mut b_rx);

    let request = SignalMessage::RequestPull { requester: viewer_a.local_id() };
    viewer_a.send(Target::Coordinator, &request).expect("send to coordinator");
    assert_eq!(
        drain(&mut coordinator_rx),
        vec![SignalEvent::Message { from: viewer_a.local_id(), message: request }]
    );

    let reply = SignalMessage::AnnounceEndpoint { endpoint: "127.0.0.1:25827".into() };
    coordinator.send(Target::Participant(viewer_a.local_id()), &reply).expect("direct send");
    assert_eq!(drain(&mut a_rx).len(), 1);
    assert!(drain(&mut b_rx).is_empty());

    coordinator.send(Target::Others, &reply).expect("broadcast");
    assert_eq!(drain(&mut a_rx).len(), 1);
    assert_eq!(drain(&mut b_rx).len(), 1);
    assert!(drain(&mut coordinator_rx).is_empty());

    assert!(coordinator.send(Target::Participant(ParticipantId(999)), &reply).is_err());
}

#[test]
fn send_outside_room_is_rejected() {
    let bus = LocalBus::new();
    let (channel, _rx) = bus.attach();
    channel.connect().expect("connect");
    let request = SignalMessage::RequestPull { requester: channel.local_id() };
    assert!(channel.send(Target::Coordinator, &request).is_err());
}
