mod support;

use std::error::Error;

use support::{d, scheduled, task, Fixture};
use wbs::config::OutlineConfig;
use wbs::coordinator::ScheduleEdit;

#[test]
fn schedule_edit_rolls_up_the_ancestor_chain() -> Result<(), Box<dyn Error>> {
    let mut fx = Fixture::seeded(vec![
        task("Foundation", "1"),
        scheduled("Excavate", "1.1", "2026-03-02", "2026-03-04", 100.0),
        scheduled("Pour footings", "1.2", "2026-03-05", "2026-03-05", 0.0),
    ]);
    let footings = fx.id_of("Pour footings");

    fx.coordinator.set_schedule(
        footings,
        ScheduleEdit {
            end: Some(d("2026-03-06")),
            duration: Some(2),
            progress: Some(50.0),
            ..ScheduleEdit::default()
        },
    )?;

    let parent = fx.stored("Foundation");
    assert_eq!(parent.start, Some(d("2026-03-02")));
    assert_eq!(parent.end, Some(d("2026-03-06")));
    // inclusive whole-day span
    assert_eq!(parent.duration, Some(5));
    // (100 * 3 + 50 * 2) / 5
    assert!((parent.progress - 80.0).abs() < 1e-9);

    let child = fx.stored("Pour footings");
    assert_eq!(child.end, Some(d("2026-03-06")));
    assert!((child.progress - 50.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn rollup_cascades_through_every_level() -> Result<(), Box<dyn Error>> {
    let mut fx = Fixture::seeded(vec![
        task("Project", "1"),
        task("Structure", "1.1"),
        scheduled("Framing", "1.1.1", "2026-05-04", "2026-05-08", 40.0),
    ]);
    let framing = fx.id_of("Framing");

    fx.coordinator.set_schedule(
        framing,
        ScheduleEdit {
            progress: Some(60.0),
            ..ScheduleEdit::default()
        },
    )?;

    let structure = fx.stored("Structure");
    let project = fx.stored("Project");
    assert_eq!(structure.start, Some(d("2026-05-04")));
    assert_eq!(structure.duration, Some(5));
    assert!((structure.progress - 60.0).abs() < 1e-9);
    assert_eq!(project.end, Some(d("2026-05-08")));
    assert!((project.progress - 60.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn repeating_an_edit_writes_no_new_rollup() -> Result<(), Box<dyn Error>> {
    let mut fx = Fixture::seeded(vec![
        task("Foundation", "1"),
        scheduled("Excavate", "1.1", "2026-03-02", "2026-03-04", 0.0),
    ]);
    let excavate = fx.id_of("Excavate");
    let edit = ScheduleEdit {
        progress: Some(25.0),
        ..ScheduleEdit::default()
    };

    fx.coordinator.set_schedule(excavate, edit)?;
    // one write for the edit, one for the changed ancestor
    assert_eq!(fx.coordinator.store().schedule_batches_applied(), 2);

    fx.coordinator.set_schedule(excavate, edit)?;
    // the repeated edit writes, the already-converged ancestor does not
    assert_eq!(fx.coordinator.store().schedule_batches_applied(), 3);
    assert!((fx.stored("Foundation").progress - 25.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn rollup_can_be_disabled() -> Result<(), Box<dyn Error>> {
    let config = OutlineConfig::from_toml_str("[rollup]\nenabled = false")?;
    let mut fx = Fixture::seeded_with_config(
        vec![
            task("Foundation", "1"),
            scheduled("Excavate", "1.1", "2026-03-02", "2026-03-04", 0.0),
        ],
        config,
    );
    let excavate = fx.id_of("Excavate");

    fx.coordinator.set_schedule(
        excavate,
        ScheduleEdit {
            progress: Some(80.0),
            ..ScheduleEdit::default()
        },
    )?;

    let parent = fx.stored("Foundation");
    assert_eq!(parent.start, None);
    assert!((parent.progress - 0.0).abs() < 1e-9);
    assert!((fx.stored("Excavate").progress - 80.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn progress_edits_are_clamped_to_percent_range() -> Result<(), Box<dyn Error>> {
    let mut fx = Fixture::seeded(vec![scheduled(
        "Excavate",
        "1",
        "2026-03-02",
        "2026-03-04",
        0.0,
    )]);
    let excavate = fx.id_of("Excavate");

    fx.coordinator.set_schedule(
        excavate,
        ScheduleEdit {
            progress: Some(140.0),
            ..ScheduleEdit::default()
        },
    )?;
    assert!((fx.stored("Excavate").progress - 100.0).abs() < 1e-9);

    fx.coordinator.set_schedule(
        excavate,
        ScheduleEdit {
            progress: Some(-5.0),
            ..ScheduleEdit::default()
        },
    )?;
    assert!((fx.stored("Excavate").progress - 0.0).abs() < 1e-9);
    Ok(())
}
