//! Link simulator
//!
//! Runs one authority node and any number of observer nodes over chaos
//! links, all reading the same `ManualClock`. Each step:
//! 1. Advance the clock by one frame
//! 2. Drive the source skeleton
//! 3. Tick the authority and send its frames on every link
//! 4. Deliver due frames and tick every observer

use std::time::Duration;

use bytes::Bytes;

use bonesync_core::{BoneSyncError, BoneSyncResult, NodeId, PoseSnapshot, StateTime};
use bonesync_pose::{BoneMap, Skeleton};
use bonesync_runtime::{AuthorityNode, NodeConfig, ObserverNode, RuntimeStats};
use bonesync_time::{Clock, ManualClock};

use crate::{ChaosConfig, ChaosNetwork, ChaosStats, Motion, Still};

/// Simulation configuration
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Non-root bones in the source chain
    pub bones: usize,
    /// Simulated frame time of every node
    pub frame_time: Duration,
    pub authority: NodeConfig,
    pub observer: NodeConfig,
    /// Default link conditions for new observers
    pub chaos: ChaosConfig,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            bones: 8,
            frame_time: Duration::from_millis(10),
            authority: NodeConfig::authority(),
            observer: NodeConfig::observer(),
            chaos: ChaosConfig::perfect(),
            seed: 0,
        }
    }
}

/// One observer with its own skeleton and link
pub struct SimObserver {
    pub node: ObserverNode<ManualClock>,
    pub skeleton: Skeleton,
    pub network: ChaosNetwork,
    /// Errors returned by the observer's ticks
    pub errors: Vec<BoneSyncError>,
}

/// Per-observer outcome
#[derive(Clone, Debug)]
pub struct ObserverReport {
    pub linked: bool,
    pub stats: RuntimeStats,
    pub link: ChaosStats,
    pub errors: usize,
}

/// Simulation outcome
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub steps: u64,
    pub authority: RuntimeStats,
    pub observers: Vec<ObserverReport>,
}

pub struct LinkSimulator {
    config: SimulationConfig,
    clock: ManualClock,
    source: Skeleton,
    authority: AuthorityNode<ManualClock>,
    observers: Vec<SimObserver>,
    motion: Box<dyn Motion>,
    active: bool,
    steps: u64,
}

impl LinkSimulator {
    pub fn new(config: SimulationConfig) -> BoneSyncResult<Self> {
        let clock = ManualClock::new();
        let source = Skeleton::chain(config.bones);
        let authority = AuthorityNode::new(
            NodeId::new(1),
            config.authority.clone(),
            &source,
            source.root(),
            clock.clone(),
        )?;

        Ok(LinkSimulator {
            config,
            clock,
            source,
            authority,
            observers: Vec::new(),
            motion: Box::new(Still),
            active: false,
            steps: 0,
        })
    }

    /// Observer with a copy of the source's bone layout on the default link
    pub fn add_observer(&mut self) -> BoneSyncResult<usize> {
        let skeleton = Skeleton::chain(self.config.bones);
        let chaos = self.config.chaos.clone();
        self.add_observer_with(skeleton, chaos)
    }

    pub fn add_observer_with(
        &mut self,
        skeleton: Skeleton,
        chaos: ChaosConfig,
    ) -> BoneSyncResult<usize> {
        let index = self.observers.len();
        let node = ObserverNode::new(
            NodeId::new(index as u64 + 2),
            self.config.observer.clone(),
            skeleton.root(),
            self.clock.clone(),
        )?;
        let seed = self.config.seed.wrapping_add(index as u64);
        self.observers.push(SimObserver {
            node,
            skeleton,
            network: ChaosNetwork::new(chaos, seed),
            errors: Vec::new(),
        });
        Ok(index)
    }

    pub fn set_motion(&mut self, motion: impl Motion + 'static) {
        self.motion = Box::new(motion);
    }

    /// Drive the first pose and activate the authority. The full sync frame
    /// goes out on every link without loss.
    pub fn activate(&mut self) -> BoneSyncResult<()> {
        let now = self.clock.now();
        self.motion.drive(&mut self.source, now)?;
        self.authority.activate(&mut self.source)?;
        self.active = true;
        self.route(true);
        Ok(())
    }

    /// Run one frame
    pub fn step(&mut self) -> BoneSyncResult<()> {
        if !self.active {
            return Err(BoneSyncError::LinkInactive);
        }
        let dt = self.config.frame_time;
        let now = self.clock.advance(dt);
        self.steps += 1;

        self.motion.drive(&mut self.source, now)?;

        let mut arrived: Vec<Vec<Bytes>> = self
            .observers
            .iter_mut()
            .map(|o| o.network.tick(dt))
            .collect();

        self.authority.tick(&self.source)?;
        self.route(false);

        for (observer, frames) in self.observers.iter_mut().zip(arrived.iter_mut()) {
            frames.extend(observer.network.tick(Duration::ZERO));
            for frame in frames.drain(..) {
                observer.node.queue_incoming(frame);
            }
            if let Err(err) = observer.node.tick(&mut observer.skeleton) {
                observer.errors.push(err);
            }
        }
        Ok(())
    }

    /// Run whole frames covering `duration`
    pub fn run_for(&mut self, duration: Duration) -> BoneSyncResult<()> {
        let frame_micros = self.config.frame_time.as_micros().max(1);
        let steps = duration.as_micros() / frame_micros;
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    fn route(&mut self, reliable: bool) {
        while let Some(frame) = self.authority.pop_outgoing() {
            for observer in &mut self.observers {
                if reliable {
                    observer.network.send_reliable(frame.clone());
                } else {
                    observer.network.send(frame.clone());
                }
            }
        }
    }

    pub fn now(&self) -> StateTime {
        self.clock.now()
    }

    pub fn source(&self) -> &Skeleton {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut Skeleton {
        &mut self.source
    }

    pub fn authority(&self) -> &AuthorityNode<ManualClock> {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut AuthorityNode<ManualClock> {
        &mut self.authority
    }

    pub fn observer(&self, index: usize) -> Option<&SimObserver> {
        self.observers.get(index)
    }

    fn capture(&self, skeleton: &Skeleton) -> BoneSyncResult<PoseSnapshot> {
        let include_root = self.config.authority.include_root;
        let map = BoneMap::from_hierarchy(skeleton, skeleton.root(), include_root)?;
        map.capture(skeleton, self.clock.now())
    }

    /// Whether observer `index` shows exactly the source's current pose
    pub fn pose_matches(&self, index: usize) -> BoneSyncResult<bool> {
        let observer = self
            .observers
            .get(index)
            .ok_or(BoneSyncError::UnknownNode(index))?;
        Ok(self.capture(&self.source)?.bones == self.capture(&observer.skeleton)?.bones)
    }

    /// Largest bone position distance between the source and observer `index`
    pub fn max_position_error(&self, index: usize) -> BoneSyncResult<f32> {
        let observer = self
            .observers
            .get(index)
            .ok_or(BoneSyncError::UnknownNode(index))?;
        let source = self.capture(&self.source)?;
        let replica = self.capture(&observer.skeleton)?;
        Ok(source
            .bones
            .iter()
            .zip(replica.bones.iter())
            .map(|(a, b)| a.position.distance(&b.position))
            .fold(0.0, f32::max))
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            steps: self.steps,
            authority: self.authority.stats().clone(),
            observers: self
                .observers
                .iter()
                .map(|o| ObserverReport {
                    linked: o.node.is_linked(),
                    stats: o.node.stats().clone(),
                    link: o.network.stats().clone(),
                    errors: o.errors.len(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SwayMotion;

    #[test]
    fn test_step_requires_activation() {
        let mut sim = LinkSimulator::new(SimulationConfig::default()).unwrap();
        assert_eq!(sim.step().unwrap_err(), BoneSyncError::LinkInactive);
    }

    #[test]
    fn test_observer_links_on_first_step() {
        let mut sim = LinkSimulator::new(SimulationConfig::default()).unwrap();
        sim.add_observer().unwrap();
        sim.activate().unwrap();
        sim.step().unwrap();

        let report = sim.report();
        assert!(report.observers[0].linked);
        assert_eq!(report.observers[0].errors, 0);
        assert!(sim.pose_matches(0).unwrap());
    }

    #[test]
    fn test_swaying_source_is_tracked() {
        let mut sim = LinkSimulator::new(SimulationConfig::default()).unwrap();
        sim.add_observer().unwrap();
        let sway = SwayMotion::new(sim.source()).unwrap();
        sim.set_motion(sway);
        sim.activate().unwrap();

        sim.run_for(Duration::from_secs(1)).unwrap();
        assert_eq!(sim.report().steps, 100);
        assert!(sim.max_position_error(0).unwrap() > 0.0);
        assert!(sim.max_position_error(0).unwrap() <= 0.1);
    }
}
