//! Model helpers: slugs, clamps, display names and sample history.

use chrono::Utc;

use pattern_jam::models::channel::{clamp_pan, clamp_volume, ChannelPayload, ChannelStatus};
use pattern_jam::models::invite::{InviteDecision, InviteStatus};
use pattern_jam::models::session::{generate_slug, slugify, Session, SessionStatus};
use pattern_jam::models::stats::{CpuSample, CpuStats};
use pattern_jam::models::user::UserSummary;
use pattern_jam::AppError;

fn sample(load: f64) -> CpuSample {
    CpuSample {
        sampled_at: Utc::now(),
        load_average: [load, 0.0, 0.0],
        rss_bytes: 0,
        heap_used_bytes: 0,
        heap_total_bytes: 0,
        user_cpu_micros: 0,
        system_cpu_micros: 0,
        warning: None,
    }
}

#[test]
fn slugify_collapses_punctuation() {
    assert_eq!(slugify("  Friday Night -- Jam!! "), "friday-night-jam");
    assert_eq!(slugify("???"), "session");
}

#[test]
fn slugify_drops_non_ascii_and_caps_length() {
    assert_eq!(slugify("Café Über"), "caf-ber");
    let long = slugify(&"abc ".repeat(20));
    assert_eq!(long.len(), 39);
    assert!(!long.ends_with('-'));
    assert_eq!(slugify("Café Über"), slugify("café über"));
}

#[test]
fn generated_slugs_differ_but_share_base() {
    let a = generate_slug("Late Set");
    let b = generate_slug("Late Set");
    assert!(a.starts_with("late-set-"));
    assert_eq!(a.len(), "late-set-".len() + 6);
    assert_ne!(a, b);
}

#[test]
fn new_session_is_active_and_empty() {
    let session = Session::new("u1".into(), "Jam".into(), "jam-abc123".into());
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.is_active());
    assert!(session.is_owner("u1"));
    assert!(!session.is_owner("u2"));
    assert!(session.master_code.is_empty());
    assert_eq!(session.apply_delay_ms, 0);
}

#[test]
fn volume_and_pan_are_clamped() {
    assert!((clamp_volume(1.7) - 1.0).abs() < f64::EPSILON);
    assert!(clamp_volume(-0.2).abs() < f64::EPSILON);
    assert!((clamp_volume(f64::NAN) - 1.0).abs() < f64::EPSILON);
    assert!((clamp_pan(-3.0) + 1.0).abs() < f64::EPSILON);
    assert!((clamp_pan(0.25) - 0.25).abs() < f64::EPSILON);
    assert!(clamp_pan(f64::INFINITY).abs() < f64::EPSILON);
}

#[test]
fn whitespace_code_fails_validation() {
    let err = ChannelPayload::with_code(" \n\t ").validated_code().unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let ok = ChannelPayload::with_code("  s(\"bd\")  ");
    assert_eq!(ok.validated_code().unwrap(), "s(\"bd\")");
}

#[test]
fn live_set_is_live_and_published() {
    assert!(!ChannelStatus::Draft.is_live());
    assert!(ChannelStatus::Live.is_live());
    assert!(ChannelStatus::Published.is_live());
}

#[test]
fn invite_states() {
    assert!(!InviteStatus::Pending.is_terminal());
    assert!(InviteStatus::Accepted.is_terminal());
    assert!(InviteStatus::Declined.is_terminal());
    assert_eq!(InviteDecision::Accept.target_status(), InviteStatus::Accepted);
    assert_eq!(InviteDecision::Decline.target_status(), InviteStatus::Declined);
}

#[test]
fn display_name_prefers_artist_name() {
    let full = UserSummary {
        id: "u1".into(),
        name: Some("Ada".into()),
        artist_name: Some("DJ Ada".into()),
    };
    assert_eq!(full.display_name(), "DJ Ada");

    let named = UserSummary {
        artist_name: Some("  ".into()),
        ..full.clone()
    };
    assert_eq!(named.display_name(), "Ada");
    assert_eq!(UserSummary::unknown("u9").display_name(), "anonymous");
}

#[test]
fn sample_history_keeps_most_recent() {
    let mut stats = CpuStats::default();
    for i in 0..13 {
        stats.push(sample(f64::from(i)), 10);
    }
    assert_eq!(stats.len(), 10);
    let first = stats.recent_server_samples.front().unwrap();
    assert!((first.load_average[0] - 3.0).abs() < f64::EPSILON);
    assert!((stats.latest().unwrap().load_average[0] - 12.0).abs() < f64::EPSILON);
}

#[test]
fn payload_deserializes_camel_case() {
    let payload: ChannelPayload = serde_json::from_str(
        r#"{"elementId":"el-1","name":"bass","status":"live","code":"s(\"bd\")","pan":-0.5}"#,
    )
    .unwrap();
    assert_eq!(payload.element_id.as_deref(), Some("el-1"));
    assert_eq!(payload.status, Some(ChannelStatus::Live));
    assert!(payload.volume.is_none());
}
