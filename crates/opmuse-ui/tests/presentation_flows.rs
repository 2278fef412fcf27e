use opmuse_ui::core::bus::{BusEffect, BusLifecycle, BusMessage, ListenerRegistry, ReconnectPolicy};
use opmuse_ui::core::headers::{LOCATION_HEADER, ResponseAction, ResponseDirectives};
use opmuse_ui::core::nav::NavigationSession;
use opmuse_ui::core::player::{PlayerEvent, PlayerState, QueuePlayer, STREAM_PATH};
use opmuse_ui::core::prefs::{
    LAYOUT_PANEL_OPEN, MemoryBackend, PreferenceStore, layout_toggle,
};
use opmuse_ui::core::regions::{RegionLookup, plan_reload};
use opmuse_ui::core::upload::{FileKind, ProgressTracker, UploadPool, plan_batch};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

struct Page {
    present: Vec<&'static str>,
    reloadable: Vec<&'static str>,
}

impl RegionLookup for Page {
    fn matches(&self, selector: &str) -> bool {
        self.present.contains(&selector)
    }

    fn reload_eligible(&self, selector: &str) -> bool {
        self.reloadable.contains(&selector)
    }
}

#[test]
fn rapid_navigation_applies_only_the_last_response() {
    let mut session = NavigationSession::new("http://music.local/");
    let first = session.begin();
    let second = session.begin();
    assert_eq!(second.superseded, Some(first.ticket));

    assert!(!session.complete(first.ticket, "http://music.local/library"));
    assert_eq!(session.current_url(), Some("http://music.local/"));
    assert!(session.complete(second.ticket, "http://music.local/queue"));
    assert_eq!(session.current_url(), Some("http://music.local/queue"));
}

#[test]
fn form_submission_supersedes_a_pending_link_navigation() {
    let mut session = NavigationSession::new("http://music.local/");
    let link = session.begin();
    let submit = session.begin();
    assert_eq!(submit.superseded, Some(link.ticket));
    assert!(!session.is_current(link.ticket));

    assert!(!session.complete(link.ticket, "http://music.local/library"));
    assert!(session.complete(submit.ticket, "http://music.local/settings"));
    assert_eq!(session.current_url(), Some("http://music.local/settings"));

    let after = session.begin();
    assert_eq!(after.superseded, None);
}

#[test]
fn location_header_turns_a_post_into_a_soft_navigation() -> anyhow::Result<()> {
    let header = serde_json::to_string(&vec!["/library"])?;
    let directives = ResponseDirectives::from_lookup(|name| {
        name.eq_ignore_ascii_case(LOCATION_HEADER)
            .then(|| header.clone())
    });
    assert_eq!(
        directives.action(true),
        ResponseAction::SoftNavigate("/library".to_string())
    );
    Ok(())
}

#[test]
fn live_reload_skips_regions_not_marked_reloadable() {
    let page = Page {
        present: vec!["#dashboard-listening-now", "#remotes-album-7"],
        reloadable: vec!["#dashboard-listening-now"],
    };
    let plan = plan_reload(
        &page,
        &["#dashboard-listening-now", "#remotes-album-7", "#love-album-3"],
    );
    assert!(plan.needs_fetch());
    assert_eq!(plan.eligible, vec!["#dashboard-listening-now".to_string()]);
    assert_eq!(plan.ineligible, vec!["#remotes-album-7".to_string()]);
    assert_eq!(plan.missing, vec!["#love-album-3".to_string()]);
}

#[test]
fn layout_preference_survives_a_new_store_over_the_same_backend() -> anyhow::Result<()> {
    let toggle = layout_toggle("panel").ok_or_else(|| anyhow::anyhow!("panel toggle"))?;
    assert_eq!(toggle.key, LAYOUT_PANEL_OPEN);

    let backend = MemoryBackend::default();
    PreferenceStore::new(&backend).set(toggle.key, true)?;

    let reopened = PreferenceStore::new(&backend);
    assert!(reopened.get_bool(toggle.key, false));
    reopened.remove(toggle.key);
    assert!(!PreferenceStore::new(&backend).get_bool(toggle.key, false));
    Ok(())
}

#[test]
fn bus_messages_reach_listeners_in_registration_order() -> anyhow::Result<()> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut registry = ListenerRegistry::default();
    for tag in ["first", "second"] {
        let seen = Rc::clone(&seen);
        registry.on(["queue.update"], move |_| seen.borrow_mut().push(tag));
    }
    let message = BusMessage::decode(&BusMessage::new("queue.update", vec![json!(1)]).encode())?;
    assert_eq!(registry.dispatch(&message), 2);
    assert_eq!(*seen.borrow(), vec!["first", "second"]);
    assert_eq!(registry.dispatch(&BusMessage::new("queue.reset", Vec::new())), 0);
    Ok(())
}

#[test]
fn dropped_bus_reconnects_and_recovers() {
    let mut lifecycle = BusLifecycle::new(ReconnectPolicy {
        base_ms: 5_000,
        max_ms: 30_000,
    });
    lifecycle.opened();
    let effects = lifecycle.closed();
    assert!(effects.contains(&BusEffect::ScheduleReconnect { delay_ms: 5_000 }));

    lifecycle.connecting();
    let effects = lifecycle.opened();
    assert!(effects.contains(&BusEffect::ClearError));
    assert!(effects.contains(&BusEffect::AnnounceOpen));
}

#[test]
fn six_uploads_never_exceed_four_in_flight() -> anyhow::Result<()> {
    let mut pool = UploadPool::new(6, 4);
    let mut tracker = ProgressTracker::new(vec![10; 6]);
    let mut running = pool.start();
    assert_eq!(running, vec![0, 1, 2, 3]);

    while let Some(id) = running.first().copied() {
        running.remove(0);
        tracker.complete(id);
        if let Some(next) = pool.finish(id)? {
            running.push(next);
        }
        assert!(pool.in_flight() <= 4);
    }
    assert!(pool.is_complete());
    assert!((tracker.fraction() - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn sidecars_are_associated_with_the_matching_track() {
    let files = vec![
        ("01 Intro.mp3".to_string(), "audio/mpeg".to_string()),
        ("02 Outro.mp3".to_string(), "audio/mpeg".to_string()),
        ("02 Outro.cue".to_string(), String::new()),
    ];
    let plan = plan_batch(&files);
    assert_eq!(plan[2].kind, FileKind::Sidecar);
    assert_eq!(plan[2].associate.as_deref(), Some("02 Outro.mp3"));
}

#[test]
fn queue_end_leaves_player_stopped_with_play_available() {
    let mut player = QueuePlayer::new(STREAM_PATH);
    player.apply(PlayerEvent::PlayPressed, 1);
    let start = PlayerEvent::from_bus(
        "queue.start",
        &[json!({"artist": "Band", "title": "Song", "duration": 180.0}), json!("Firefox")],
    );
    assert!(start.is_some());
    if let Some(start) = start {
        player.apply(start, 2);
    }
    assert_eq!(player.state(), PlayerState::LocallyPlaying);

    let end = PlayerEvent::from_bus("queue.end", &[json!({"title": "Song"}), json!("agentA")]);
    assert_eq!(end, Some(PlayerEvent::End));
    player.apply(PlayerEvent::End, 3);
    let view = player.view();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(view.play_visible);
    assert!(!view.pause_visible);
    assert!(view.controls_enabled);
}
