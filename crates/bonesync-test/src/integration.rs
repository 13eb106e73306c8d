//! End-to-end replication scenarios
//!
//! Each scenario runs a full authority -> observer pipeline through the
//! link simulator and checks what observers end up showing:
//! - Exact convergence once the source stops moving
//! - Bounded error on lossy links
//! - Replicated cadence and delay changes
//! - Setup failures stay local to the failing observer

use std::time::Duration;

use bonesync_core::{BoneSyncError, BoneSyncResult, InterpolationMode, LinkSettings};
use bonesync_pose::Skeleton;

use crate::{ChaosConfig, LinkSimulator, SimulationConfig, SimulationReport, Still, SwayMotion};

/// Outcome of one scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub violations: Vec<String>,
    pub report: SimulationReport,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

fn check(violations: &mut Vec<String>, ok: bool, violation: impl FnOnce() -> String) {
    if !ok {
        violations.push(violation());
    }
}

fn check_converged(
    violations: &mut Vec<String>,
    sim: &LinkSimulator,
    report: &SimulationReport,
) -> BoneSyncResult<()> {
    for (i, observer) in report.observers.iter().enumerate() {
        check(violations, observer.linked, || format!("observer {} never linked", i));
        if observer.linked {
            let matches = sim.pose_matches(i)?;
            check(violations, matches, || format!("observer {} did not converge", i));
        }
    }
    Ok(())
}

/// Sway for two seconds over perfect links, then hold still
pub fn scenario_perfect_convergence(observers: usize) -> BoneSyncResult<ScenarioResult> {
    let mut sim = LinkSimulator::new(SimulationConfig::default())?;
    for _ in 0..observers {
        sim.add_observer()?;
    }
    let sway = SwayMotion::new(sim.source())?;
    sim.set_motion(sway);
    sim.activate()?;
    sim.run_for(Duration::from_secs(2))?;

    sim.set_motion(Still);
    sim.run_for(Duration::from_secs(1))?;

    let report = sim.report();
    let mut violations = Vec::new();
    check_converged(&mut violations, &sim, &report)?;

    let authority = &report.authority;
    // Scale never moves and the root stays put: two fields per swaying bone
    let bones = sim.source().len() as u64;
    let bound = 3 * bones + authority.frames_out.saturating_sub(1) * 2 * (bones - 1);
    check(&mut violations, authority.field_writes_out <= bound, || {
        format!(
            "{} field writes published, expected at most {}",
            authority.field_writes_out, bound
        )
    });
    for (i, observer) in report.observers.iter().enumerate() {
        check(&mut violations, observer.stats.dropped_writes == 0, || {
            format!("observer {} dropped writes", i)
        });
        check(&mut violations, observer.stats.frames_in == authority.frames_out, || {
            format!(
                "observer {} received {} of {} frames",
                i, observer.stats.frames_in, authority.frames_out
            )
        });
    }
    Ok(ScenarioResult {
        name: "perfect_convergence",
        violations,
        report,
    })
}

/// Ten seconds of sway over a hostile link; error must stay within the
/// motion's range while linked
pub fn scenario_lossy_link(seed: u64) -> BoneSyncResult<ScenarioResult> {
    let mut observer = SimulationConfig::default().observer;
    observer.interpolation = InterpolationMode::Clamp;
    let config = SimulationConfig {
        observer,
        chaos: ChaosConfig::hostile(),
        seed,
        ..Default::default()
    };
    let mut sim = LinkSimulator::new(config)?;
    sim.add_observer()?;
    let sway = SwayMotion::new(sim.source())?;
    let bound = 2.0 * sway.bob + 1e-4;
    sim.set_motion(sway);
    sim.activate()?;

    let mut worst = 0.0f32;
    for _ in 0..1000 {
        sim.step()?;
        if sim.observer(0).map_or(false, |o| o.node.is_linked()) {
            worst = worst.max(sim.max_position_error(0)?);
        }
    }

    let report = sim.report();
    let mut violations = Vec::new();
    let observer = &report.observers[0];
    check(&mut violations, observer.linked, || "observer never linked".into());
    check(&mut violations, observer.link.frames_lost > 0, || {
        "hostile link lost nothing".into()
    });
    check(&mut violations, observer.stats.dropped_writes == 0, || {
        format!("{} writes dropped", observer.stats.dropped_writes)
    });
    check(&mut violations, worst <= bound, || {
        format!("position error {} exceeds {}", worst, bound)
    });
    Ok(ScenarioResult {
        name: "lossy_link",
        violations,
        report,
    })
}

/// Every frame delivered twice; duplicates are skipped and the observer
/// still converges exactly
pub fn scenario_duplicated_frames() -> BoneSyncResult<ScenarioResult> {
    let config = SimulationConfig {
        chaos: ChaosConfig {
            duplicate_prob: 1.0,
            ..ChaosConfig::perfect()
        },
        ..Default::default()
    };
    let mut sim = LinkSimulator::new(config)?;
    sim.add_observer()?;
    let sway = SwayMotion::new(sim.source())?;
    sim.set_motion(sway);
    sim.activate()?;
    sim.run_for(Duration::from_secs(1))?;
    sim.set_motion(Still);
    sim.run_for(Duration::from_secs(1))?;

    let report = sim.report();
    let mut violations = Vec::new();
    check_converged(&mut violations, &sim, &report)?;

    let stats = &report.observers[0].stats;
    let sent = report.authority.frames_out;
    // The bootstrap frame goes out once; every later frame is doubled
    check(&mut violations, stats.frames_stale + 1 == sent, || {
        format!("{} stale frames for {} sent", stats.frames_stale, sent)
    });
    check(&mut violations, stats.dropped_writes == 0, || "writes dropped".into());
    Ok(ScenarioResult {
        name: "duplicated_frames",
        violations,
        report,
    })
}

/// Cadence change on the authority reaches every observer and slows the
/// publish rate
pub fn scenario_settings_change() -> BoneSyncResult<ScenarioResult> {
    let mut sim = LinkSimulator::new(SimulationConfig::default())?;
    sim.add_observer()?;
    sim.add_observer()?;
    let sway = SwayMotion::new(sim.source())?;
    sim.set_motion(sway);
    sim.activate()?;
    sim.run_for(Duration::from_secs(1))?;

    let slow = LinkSettings::low_bandwidth();
    sim.authority_mut().set_settings(slow)?;
    sim.step()?;

    let before = sim.authority().stats().frames_out;
    sim.run_for(Duration::from_secs(2))?;
    let sent = sim.authority().stats().frames_out - before;

    let report = sim.report();
    let mut violations = Vec::new();
    for i in 0..report.observers.len() {
        let adopted = sim
            .observer(i)
            .and_then(|o| o.node.link())
            .map(|link| link.settings());
        check(&mut violations, adopted == Some(slow), || {
            format!("observer {} runs with {:?}", i, adopted)
        });
    }
    check(&mut violations, (9..=11).contains(&sent), || {
        format!("{} frames in two seconds at a 200ms cadence", sent)
    });
    Ok(ScenarioResult {
        name: "settings_change",
        violations,
        report,
    })
}

/// One observer with extra bones fails setup once; its neighbour is
/// unaffected
pub fn scenario_bone_mismatch() -> BoneSyncResult<ScenarioResult> {
    let config = SimulationConfig::default();
    let bones = config.bones;
    let mut sim = LinkSimulator::new(config)?;
    sim.add_observer()?;
    sim.add_observer_with(Skeleton::chain(bones + 2), ChaosConfig::perfect())?;
    let sway = SwayMotion::new(sim.source())?;
    sim.set_motion(sway);
    sim.activate()?;
    sim.run_for(Duration::from_secs(1))?;
    sim.set_motion(Still);
    sim.run_for(Duration::from_secs(1))?;

    let report = sim.report();
    let mut violations = Vec::new();
    let healthy_matches = sim.pose_matches(0)?;
    check(&mut violations, healthy_matches, || {
        "healthy observer did not converge".into()
    });

    let failing = &report.observers[1];
    check(&mut violations, !failing.linked, || "mismatched observer linked".into());
    check(&mut violations, failing.errors == 1, || {
        format!("mismatch reported {} times", failing.errors)
    });

    let failure = sim.observer(1).and_then(|o| o.node.failure().cloned());
    // Both counts include the root
    let expected = BoneSyncError::BoneCountMismatch {
        expected: bones + 1,
        actual: bones + 3,
    };
    check(&mut violations, failure.as_ref() == Some(&expected), || {
        format!("unexpected failure {:?}", failure)
    });
    Ok(ScenarioResult {
        name: "bone_mismatch",
        violations,
        report,
    })
}

/// A motionless source sends the full sync frame and nothing else
pub fn scenario_idle_source() -> BoneSyncResult<ScenarioResult> {
    let mut sim = LinkSimulator::new(SimulationConfig::default())?;
    sim.add_observer()?;
    sim.activate()?;
    sim.run_for(Duration::from_secs(2))?;

    let report = sim.report();
    let mut violations = Vec::new();
    let bones = sim.source().len() as u64;
    let frames_out = report.authority.frames_out;
    let writes_in = report.observers[0].stats.field_writes_in;
    check(&mut violations, frames_out == 1, || {
        format!("{} frames sent while idle", frames_out)
    });
    check(&mut violations, writes_in == 3 * bones, || {
        format!("{} field writes received, expected {}", writes_in, 3 * bones)
    });
    check_converged(&mut violations, &sim, &report)?;
    Ok(ScenarioResult {
        name: "idle_source",
        violations,
        report,
    })
}

/// Run every scenario
pub fn run_all_scenarios(seed: u64) -> BoneSyncResult<Vec<ScenarioResult>> {
    Ok(vec![
        scenario_perfect_convergence(3)?,
        scenario_lossy_link(seed)?,
        scenario_duplicated_frames()?,
        scenario_settings_change()?,
        scenario_bone_mismatch()?,
        scenario_idle_source()?,
    ])
}
