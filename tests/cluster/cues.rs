// Cue (index) generation policy per track strategy.

use mkmux::{CueStrategy, MemBuf, MuxConfig, TrackType};

use crate::util::{helper, helper_with_lacing, key_packet, ref_packet, FakeCues, FakeSource};

const MS: i64 = 1_000_000;

#[test]
fn iframe_strategy_indexes_key_frames_only() {
    let (mut ch, _recorder) = helper(MuxConfig::default());
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Video);
    src.cue_strategy.set(CueStrategy::IFrames);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.add_packet(ref_packet(&src, 40 * MS, 10, 0)).unwrap();
    ch.render().unwrap();

    let entries = log.borrow();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1, 0);
    assert_eq!(src.last_cue_timecode.get(), 0);
}

#[test]
fn all_strategy_indexes_every_block() {
    let (mut ch, _recorder) = helper(MuxConfig::default());
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Video);
    src.cue_strategy.set(CueStrategy::All);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.add_packet(ref_packet(&src, 40 * MS, 10, 0)).unwrap();
    ch.render().unwrap();

    assert_eq!(log.borrow().len(), 2);
    assert_eq!(src.last_cue_timecode.get(), 40 * MS);
}

#[test]
fn unspecified_strategy_indexes_nothing() {
    let (mut ch, _recorder) = helper(MuxConfig::default());
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Video);
    src.cue_strategy.set(CueStrategy::Unspecified);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.render().unwrap();

    assert!(log.borrow().is_empty());
    assert_eq!(src.last_cue_timecode.get(), -1);
}

#[test]
fn sparse_strategy_spaces_audio_entries_two_seconds_apart() {
    let (mut ch, _recorder) = helper(MuxConfig::default());
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Audio);
    src.cue_strategy.set(CueStrategy::Sparse);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.add_packet(key_packet(&src, 1_000 * MS, 10)).unwrap();
    ch.add_packet(key_packet(&src, 2_000 * MS, 10)).unwrap();
    ch.render().unwrap();

    let entries = log.borrow();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].1, 0);
    assert_eq!(entries[1].1, 2_000 * MS);
}

#[test]
fn sparse_strategy_is_suppressed_while_a_video_track_exists() {
    let (mut ch, _recorder) = helper(MuxConfig::default());
    ch.set_video_track_present(true);
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Audio);
    src.cue_strategy.set(CueStrategy::Sparse);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.render().unwrap();

    assert!(log.borrow().is_empty());
}

#[test]
fn disabling_cues_suppresses_every_strategy() {
    let mut cfg = MuxConfig::default();
    cfg.write_cues = false;
    let (mut ch, _recorder) = helper(cfg);
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Video);
    src.cue_strategy.set(CueStrategy::All);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.render().unwrap();

    assert!(log.borrow().is_empty());
}

#[test]
fn a_codec_state_change_is_always_indexed() {
    let (mut ch, _recorder) = helper(MuxConfig::default());
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Video);
    src.cue_strategy.set(CueStrategy::Unspecified);

    let mut packet = key_packet(&src, 0, 10);
    packet.codec_state = Some(MemBuf::from_slice(&[9]));
    ch.add_packet(packet).unwrap();
    ch.render().unwrap();

    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn laced_continuations_are_not_indexed_twice() {
    let (mut ch, _recorder) = helper_with_lacing(MuxConfig::default(), true);
    let (cues, log) = FakeCues::new(24);
    ch.set_cue_sink(Box::new(cues));
    let src = FakeSource::new(1, TrackType::Audio);
    src.cue_strategy.set(CueStrategy::All);

    ch.add_packet(key_packet(&src, 0, 10)).unwrap();
    ch.add_packet(key_packet(&src, 20 * MS, 10)).unwrap();
    ch.add_packet(key_packet(&src, 40 * MS, 10)).unwrap();
    ch.render().unwrap();

    // One block, one entry.
    assert_eq!(log.borrow().len(), 1);
}
