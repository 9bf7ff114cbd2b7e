// Invariants of the practice engine that must hold over whole sequences of
// user actions, not just single calls.
mod common;

use common::{word, Call, Harness};
use wordrill::model::Step;
use wordrill::step::Position;

#[test]
fn advancing_never_goes_backwards_or_skips_a_step() {
    let mut h = Harness::started(vec![
        word(1, "one", "一", 0),
        word(2, "two", "二", 0),
        word(3, "three", "三", 0),
    ]);

    let mut seen: Vec<Position> = vec![h.ctl.position()];
    for i in 0..9 {
        let expected = h
            .ctl
            .session()
            .map(|s| s.word_states[h.ctl.position().word_index].word.text.clone())
            .unwrap();
        let answer = if i % 2 == 0 { "wrong".to_string() } else { expected };
        h.ctl.submit_answer(&answer);
        h.run_for(2000);
        if !h.ctl.is_exhausted() {
            seen.push(h.ctl.position());
        }
    }

    assert_eq!(seen.len(), 9);
    for pair in seen.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        assert!(next > prev, "{next:?} is not after {prev:?}");
        if next.word_index == prev.word_index {
            assert_eq!(next.step.ordinal(), prev.step.ordinal() + 1);
        } else {
            assert_eq!(next.word_index, prev.word_index + 1);
            assert_eq!(prev.step, Step::SpellFromAudio);
            assert_eq!(next.step, Step::SpellFromFull);
        }
    }
    assert_eq!(h.ctl.backend().completions().len(), 1);
    assert_eq!(h.ctl.backend().submissions().len(), 9);
}

#[test]
fn answers_match_case_insensitively_but_exactly() {
    let mut h = Harness::started(vec![word(1, "Apple", "苹果", 0)]);
    assert_eq!(h.ctl.submit_answer("apple"), Some(true));
    h.run_for(1500);
    assert_eq!(h.ctl.submit_answer("Apple "), Some(false));
    h.run_for(2000);
    assert_eq!(h.ctl.submit_answer("APPLE"), Some(true));
}

#[test]
fn active_time_never_exceeds_total_time() {
    let mut h = Harness::started(vec![word(1, "cat", "猫", 0)]);

    let check = |h: &Harness| {
        let timing = h.ctl.timing();
        let (total, active) = timing.snapshot(h.now());
        assert!(timing.active_elapsed_ms() <= timing.total_elapsed_ms());
        assert!(active <= total, "active {active} > total {total}");
    };

    h.run_for(1500);
    check(&h);
    h.ctl.pause().unwrap();
    h.run_for(2500);
    check(&h);
    h.ctl.resume().unwrap();
    h.run_for(700);
    check(&h);
    h.ctl.pause().unwrap();
    h.ctl.pause().unwrap();
    h.run_for(3000);
    check(&h);
    h.ctl.resume().unwrap();
    h.run_for(4200);
    check(&h);

    // one interval is lost at each pause boundary at most
    let active = h.ctl.timing().active_elapsed_ms();
    assert!(active >= 1500 + 700 + 4200 - 3 * 1000, "active {active}");
}

#[test]
fn autoplay_plays_three_times_with_gaps() {
    let mut h = Harness::started(vec![word(1, "cat", "猫", 0)]);

    h.run_for(1000);
    h.finish_playback(400);
    h.run_for(999);
    assert_eq!(h.ctl.speaker().spoken.len(), 1);
    h.run_for(1);
    h.finish_playback(400);
    h.run_for(1000);
    h.finish_playback(400);
    h.run_for(20_000);

    let times: Vec<u64> = h.ctl.speaker().spoken.iter().map(|(_, _, t)| *t).collect();
    assert_eq!(times, vec![1000, 2400, 3800]);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= 1000 + 400);
    }
    assert!(!h.ctl.autoplay().is_running());
}

#[test]
fn repeated_pause_and_unpaired_resume_are_noops() {
    let mut h = Harness::started(vec![word(1, "cat", "猫", 0)]);
    h.run_for(2000);

    h.ctl.resume().unwrap();
    assert_eq!(h.ctl.backend().count(|c| matches!(c, Call::Resume(_))), 0);
    assert_eq!(h.ctl.timing().active_elapsed_ms(), 2000);

    h.ctl.pause().unwrap();
    let active = h.ctl.timing().active_elapsed_ms();
    h.ctl.pause().unwrap();
    h.run_for(5000);
    assert_eq!(h.ctl.timing().active_elapsed_ms(), active);
    assert_eq!(h.ctl.backend().count(|c| matches!(c, Call::Pause(_))), 1);
}

#[test]
fn completion_is_single_flight() {
    let mut h = Harness::started(vec![word(1, "cat", "猫", 0)]);
    h.run_for(3000);

    h.ctl.complete_session(3000, 3000).unwrap();
    h.ctl.complete_session(3000, 3000).unwrap();
    h.ctl.finish().unwrap();

    assert_eq!(h.ctl.backend().completions(), vec![(3000, 3000)]);
    assert_eq!(h.ctl.next_deadline(), None);
}
