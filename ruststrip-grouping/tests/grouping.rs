#![allow(clippy::uninlined_format_args)]
use std::sync::atomic::AtomicBool;

use ruststrip_core::{Edge, Event, NoCalibration, Side, StripId};
use ruststrip_grouping::{GroupingConfig, TimeGrouper};

/// One strip per layer so every test hit owns its own TDC bucket.
fn strip(n: u8) -> StripId {
    StripId::new(0, 0, 0, n, Side::X, 0)
}

fn event_with_times(times: &[f64]) -> Event {
    let mut event = Event::new();
    for (index, &time) in times.iter().enumerate() {
        let id = strip(u8::try_from(index).expect("test uses few strips"));
        event.add_tdc(id.tdc_id(), time, Edge::Leading);
        event.add_hit(id, &NoCalibration);
    }
    event
}

fn engine(config: GroupingConfig) -> TimeGrouper {
    TimeGrouper::new(config).expect("test configuration is valid")
}

#[test]
fn test_single_cluster_forms_one_group() {
    let times = [-256.0, -255.5, -255.0, -254.5, -254.0];
    let mut event = event_with_times(&times);
    let grouper = engine(GroupingConfig::default());

    let groups = grouper.process(&mut event);
    assert_eq!(groups.len(), 20, "list is padded to capacity");
    let info = groups[0].info().expect("cluster should form a real group");
    assert!(
        (info.center + 255.0).abs() < 3.0,
        "group center {} far from cluster at -255",
        info.center
    );
    assert!(info.integral > 0.0);
    assert!(groups[1..].iter().all(|group| !group.is_real()));

    for index in 0..u8::try_from(times.len()).unwrap() {
        let hit = event.hit(&strip(index)).unwrap();
        assert_eq!(hit.group_ids(), &[0], "hit {} not in the signal group", index);
        assert_eq!(hit.group_info().len(), 1);
    }
}

#[test]
fn test_sparse_event_left_untouched() {
    let mut event = event_with_times(&[-256.0, -255.0, -254.0]);
    let grouper = engine(GroupingConfig::default());

    assert!(grouper.process(&mut event).is_empty());
    assert!(event.hits().all(|hit| !hit.has_group_ids()));
}

#[test]
fn test_event_without_leading_samples_left_untouched() {
    let mut event = Event::new();
    for index in 0..4_u8 {
        let id = strip(index);
        event.add_tdc(id.tdc_id(), -255.0, Edge::Trailing);
        event.add_hit(id, &NoCalibration);
    }
    let grouper = engine(GroupingConfig::default());

    assert!(grouper.process(&mut event).is_empty());
    assert!(event.hits().all(|hit| !hit.has_group_ids()));
}

#[test]
fn test_out_of_range_samples_get_sentinels() {
    let times = [-255.0, -255.0, -255.0, -255.0, -500.0, -100.0];
    let mut event = event_with_times(&times);
    let grouper = engine(GroupingConfig::new().with_time_range(-300.0, -200.0));

    let groups = grouper.process(&mut event);
    assert!(groups[0].is_real());

    for index in 0..4_u8 {
        assert_eq!(event.hit(&strip(index)).unwrap().group_ids(), &[0]);
    }
    // With 20 group slots, 21 flags underflow and 22 overflow.
    assert_eq!(event.hit(&strip(4)).unwrap().group_ids(), &[21]);
    assert_eq!(event.hit(&strip(5)).unwrap().group_ids(), &[22]);
}

#[test]
fn test_out_of_range_sentinels_can_be_disabled() {
    let times = [-255.0, -255.0, -255.0, -255.0, -500.0, -100.0];
    let mut event = event_with_times(&times);
    let grouper = engine(
        GroupingConfig::new()
            .with_time_range(-300.0, -200.0)
            .with_include_out_of_range(false),
    );

    grouper.process(&mut event);
    assert_eq!(event.hit(&strip(4)).unwrap().group_ids(), &[-1]);
    assert_eq!(event.hit(&strip(5)).unwrap().group_ids(), &[-1]);
}

#[test]
fn test_zero_capacity_orphans_every_hit() {
    let mut event = Event::new();
    // First strip carries two samples; orphan marking is still per hit.
    event.add_tdc(strip(0).tdc_id(), -256.0, Edge::Leading);
    event.add_tdc(strip(0).tdc_id(), -250.0, Edge::Leading);
    event.add_hit(strip(0), &NoCalibration);
    for (index, &time) in [-255.0, -254.5, -254.0].iter().enumerate() {
        let id = strip(u8::try_from(index).unwrap() + 1);
        event.add_tdc(id.tdc_id(), time, Edge::Leading);
        event.add_hit(id, &NoCalibration);
    }
    let grouper = engine(GroupingConfig::new().with_max_groups(0));

    let groups = grouper.process(&mut event);
    assert!(groups.is_empty());
    for index in 0..4_u8 {
        assert_eq!(
            event.hit(&strip(index)).unwrap().group_ids(),
            &[-1],
            "hit {} should be an orphan",
            index
        );
    }
}

#[test]
fn test_background_groups_ordered_by_size() {
    let mut times = vec![-255.0; 5];
    times.extend(vec![-100.0; 8]);
    times.extend(vec![-50.0; 6]);
    let mut event = event_with_times(&times);
    let grouper = engine(GroupingConfig::default());

    let groups = grouper.process(&mut event);
    let signal = groups[0].info().expect("signal group comes first");
    assert!(
        (signal.center + 255.0).abs() < 3.0,
        "expected signal at -255, got {}",
        signal.center
    );
    let large = groups[1].info().expect("largest background second");
    assert!((large.center + 100.0).abs() < 3.0);
    let small = groups[2].info().expect("smallest background third");
    assert!((small.center + 50.0).abs() < 3.0);
    assert!(large.integral >= small.integral);
    assert!(groups[3..].iter().all(|group| !group.is_real()));

    assert_eq!(event.hit(&strip(0)).unwrap().group_ids(), &[0]);
    assert_eq!(event.hit(&strip(5)).unwrap().group_ids(), &[1]);
    assert_eq!(event.hit(&strip(13)).unwrap().group_ids(), &[2]);
}

#[test]
fn test_signal_ordering_uses_exponential_weight() {
    let mut times = vec![-210.0; 8];
    times.extend(vec![-255.0; 6]);

    // Short lifetime: closeness to the expected center beats size.
    let mut event = event_with_times(&times);
    let grouper = engine(
        GroupingConfig::new()
            .with_time_range(-300.0, -200.0)
            .with_signal_lifetime(20.0),
    );
    let groups = grouper.process(&mut event);
    assert!(
        (groups[0].center() + 255.0).abs() < 3.0,
        "group at the expected center should win, got {}",
        groups[0].center()
    );
    assert!((groups[1].center() + 210.0).abs() < 3.0);
    assert_eq!(event.hit(&strip(8)).unwrap().group_ids(), &[0]);
    assert_eq!(event.hit(&strip(0)).unwrap().group_ids(), &[1]);

    // Disabled sort keeps extraction order, largest peak first.
    let mut event = event_with_times(&times);
    let grouper = engine(
        GroupingConfig::new()
            .with_time_range(-300.0, -200.0)
            .with_signal_lifetime(0.0),
    );
    let groups = grouper.process(&mut event);
    assert!((groups[0].center() + 210.0).abs() < 3.0);
}

#[test]
fn test_overlapping_windows_stack_ids() {
    let mut times = vec![-255.0; 8];
    times.extend(vec![-245.0; 6]);
    let mut event = event_with_times(&times);
    let grouper = engine(GroupingConfig::new().with_time_range(-300.0, -200.0));

    let groups = grouper.process(&mut event);
    assert!((groups[0].center() + 255.0).abs() < 2.0);
    assert!((groups[1].center() + 245.0).abs() < 2.0);

    // Both acceptance windows cover both clusters.
    for index in 0..14_u8 {
        let hit = event.hit(&strip(index)).unwrap();
        assert_eq!(hit.group_ids(), &[0, 1], "hit {} should lie in both windows", index);
        assert_eq!(hit.group_info().len(), 2);
    }
}

#[test]
fn test_reprocessing_replaces_assignments() {
    let mut event = event_with_times(&[-256.0, -255.5, -255.0, -254.5, -254.0]);
    let grouper = engine(GroupingConfig::default());

    grouper.process(&mut event);
    grouper.process(&mut event);
    for hit in event.hits() {
        assert_eq!(hit.group_ids(), &[0], "ids must not accumulate across runs");
    }
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let batch: Vec<Vec<f64>> = vec![
        vec![-256.0, -255.5, -255.0, -254.5, -254.0],
        vec![-255.0; 6],
        vec![-300.0, -100.0], // sparse, skipped
        {
            let mut times = vec![-255.0; 5];
            times.extend(vec![-100.0; 8]);
            times
        },
    ];
    let grouper = engine(GroupingConfig::default());

    let mut sequential_events: Vec<Event> =
        batch.iter().map(|times| event_with_times(times)).collect();
    let sequential: Vec<_> = sequential_events
        .iter_mut()
        .map(|event| grouper.process(event))
        .collect();

    let mut parallel_events: Vec<Event> =
        batch.iter().map(|times| event_with_times(times)).collect();
    let parallel = grouper.process_events(&mut parallel_events, None);

    assert_eq!(sequential, parallel);
    for (a, b) in sequential_events.iter().zip(parallel_events.iter()) {
        for (hit_a, hit_b) in a.hits().zip(b.hits()) {
            assert_eq!(hit_a.group_ids(), hit_b.group_ids());
        }
    }
}

#[test]
fn test_stop_flag_skips_pending_events() {
    let mut events: Vec<Event> = (0..3)
        .map(|_| event_with_times(&[-256.0, -255.0, -254.5, -254.0]))
        .collect();
    let stop = AtomicBool::new(true);
    let grouper = engine(GroupingConfig::default());

    let lists = grouper.process_events(&mut events, Some(&stop));
    assert!(lists.iter().all(Vec::is_empty));
    assert!(events
        .iter()
        .all(|event| event.hits().all(|hit| !hit.has_group_ids())));
}
