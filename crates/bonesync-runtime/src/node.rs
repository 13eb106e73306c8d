//! BoneSync nodes - authority and observer runtime loops

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use bonesync_core::{BoneSyncError, BoneSyncResult, LinkSettings, NodeId, StateTime};
use bonesync_pose::{
    BoneId, BoneMap, Hierarchy, ObserverLink, PoseEncoder, PublishStats, ReplicaChannels,
};
use bonesync_time::Clock;
use bonesync_wire::PoseFrame;

use crate::{NodeConfig, NodeRole};

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub frames_out: u64,
    pub frames_in: u64,
    /// Outgoing frames evicted because the queue was full
    pub frames_dropped: u64,
    /// Incoming frames refused: queue full or undecodable
    pub frames_rejected: u64,
    /// Sequence numbers skipped between delivered frames
    pub frames_lost: u64,
    /// Duplicate or out-of-date frames skipped
    pub frames_stale: u64,
    pub field_writes_out: u64,
    pub field_writes_in: u64,
    pub snapshots_assembled: u64,
    pub poses_applied: u64,
    /// Delivered writes that could not be applied
    pub dropped_writes: u64,
    pub last_tick_duration: Duration,
}

fn ensure_role(config: &NodeConfig, role: NodeRole) -> BoneSyncResult<()> {
    if config.role != role {
        return Err(BoneSyncError::InvalidConfig(format!(
            "expected a {:?} config, got {:?}",
            role, config.role
        )));
    }
    Ok(())
}

/// Authority node: owns the source skeleton's encoder and the outgoing queue
pub struct AuthorityNode<C: Clock> {
    id: NodeId,
    clock: C,
    config: NodeConfig,
    encoder: PoseEncoder,
    sequence: u32,
    outgoing: VecDeque<Bytes>,
    stats: RuntimeStats,
}

impl<C: Clock> AuthorityNode<C> {
    /// Build the bone mapping of `source` from `root`; the node starts
    /// inactive
    pub fn new<H: Hierarchy + ?Sized>(
        id: NodeId,
        config: NodeConfig,
        source: &H,
        root: BoneId,
        clock: C,
    ) -> BoneSyncResult<Self> {
        ensure_role(&config, NodeRole::Authority)?;
        config.validate()?;
        let map = BoneMap::from_hierarchy(source, root, config.include_root)?;
        let encoder = PoseEncoder::new(map, config.link_settings())?;

        Ok(AuthorityNode {
            id,
            clock,
            config,
            encoder,
            sequence: 0,
            outgoing: VecDeque::new(),
            stats: RuntimeStats::default(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn encoder(&self) -> &PoseEncoder {
        &self.encoder
    }

    pub fn settings(&self) -> LinkSettings {
        self.encoder.settings()
    }

    /// Start publishing: full sync frame goes out immediately
    pub fn activate<H: Hierarchy + ?Sized>(&mut self, source: &mut H) -> BoneSyncResult<()> {
        let now = self.clock.now();
        self.encoder.activate(source, now)?;
        self.build_frame(now, true)?;
        info!(node = %self.id, bones = self.encoder.bone_count(), "authority active");
        Ok(())
    }

    /// Change cadence and delay; replicated with the next frame
    pub fn set_settings(&mut self, settings: LinkSettings) -> BoneSyncResult<()> {
        self.encoder.set_settings(settings)
    }

    /// Execute one tick. Returns what was published, if a sample was due.
    pub fn tick<H: Hierarchy + ?Sized>(
        &mut self,
        source: &H,
    ) -> BoneSyncResult<Option<PublishStats>> {
        let start = Instant::now();
        self.stats.ticks += 1;
        let now = self.clock.now();

        let published = self.encoder.tick(source, now)?;
        if self.encoder.pending_len() > 0 {
            self.build_frame(now, false)?;
        }

        self.stats.last_tick_duration = start.elapsed();
        Ok(published)
    }

    /// Get next outgoing frame (if any)
    pub fn pop_outgoing(&mut self) -> Option<Bytes> {
        self.outgoing.pop_front()
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    fn build_frame(&mut self, now: StateTime, full_sync: bool) -> BoneSyncResult<()> {
        let mut frame = if full_sync {
            PoseFrame::full_sync(self.sequence, now)
        } else {
            PoseFrame::new(self.sequence, now)
        };
        self.encoder.drain_into(&mut frame.messages);
        if frame.is_empty() {
            return Ok(());
        }

        let bytes = frame.encode()?;
        self.sequence = self.sequence.wrapping_add(1);
        self.stats.frames_out += 1;
        self.stats.field_writes_out += frame.field_write_count() as u64;

        if self.outgoing.len() >= self.config.max_outgoing_frames {
            self.outgoing.pop_front();
            self.stats.frames_dropped += 1;
            warn!(node = %self.id, "outgoing queue full, oldest frame dropped");
        }
        debug!(
            node = %self.id,
            sequence = frame.sequence,
            messages = frame.messages.len(),
            bytes = bytes.len(),
            "frame built"
        );
        self.outgoing.push_back(bytes);
        Ok(())
    }

    /// Stop publishing and disable pose evaluation on `source`
    pub fn teardown<H: Hierarchy + ?Sized>(self, source: &mut H) {
        info!(node = %self.id, frames_out = self.stats.frames_out, "authority torn down");
        self.encoder.teardown(source);
    }
}

/// Observer node: applies incoming frames and drives its link
pub struct ObserverNode<C: Clock> {
    id: NodeId,
    clock: C,
    config: NodeConfig,
    root: BoneId,
    incoming: VecDeque<Bytes>,
    /// Channels before the link starts; moved into the link afterwards
    pending: Option<ReplicaChannels>,
    link: Option<ObserverLink>,
    synced: bool,
    failure: Option<BoneSyncError>,
    last_sequence: Option<u32>,
    stats: RuntimeStats,
}

impl<C: Clock> ObserverNode<C> {
    pub fn new(id: NodeId, config: NodeConfig, root: BoneId, clock: C) -> BoneSyncResult<Self> {
        ensure_role(&config, NodeRole::Observer)?;
        config.validate()?;
        Ok(ObserverNode {
            id,
            clock,
            config,
            root,
            incoming: VecDeque::new(),
            pending: Some(ReplicaChannels::new()),
            link: None,
            synced: false,
            failure: None,
            last_sequence: None,
            stats: RuntimeStats::default(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn link(&self) -> Option<&ObserverLink> {
        self.link.as_ref()
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Setup failure, if the link could not be started
    pub fn failure(&self) -> Option<&BoneSyncError> {
        self.failure.as_ref()
    }

    /// Queue an incoming frame for the next tick
    pub fn queue_incoming(&mut self, frame: Bytes) {
        if self.incoming.len() < self.config.max_incoming_frames {
            self.incoming.push_back(frame);
        } else {
            self.stats.frames_rejected += 1;
            warn!(node = %self.id, "incoming queue full, frame rejected");
        }
    }

    /// Execute one tick.
    ///
    /// The bone count check runs on the first tick after the initial full
    /// sync; its error is returned from that tick only. Returns whether a
    /// pose was written to `target`.
    pub fn tick<H: Hierarchy + ?Sized>(&mut self, target: &mut H) -> BoneSyncResult<bool> {
        let start = Instant::now();
        self.stats.ticks += 1;
        let now = self.clock.now();

        self.ingest();

        if self.link.is_none() && self.synced && self.failure.is_none() {
            if let Some(channels) = self.pending.take() {
                self.start_link(channels, target, now)?;
            }
        }

        let mut applied = false;
        if let Some(link) = self.link.as_mut() {
            let assembled = link.assembled();
            applied = link.tick(target, now)?.is_some();
            self.stats.snapshots_assembled += link.assembled() - assembled;
            if applied {
                self.stats.poses_applied += 1;
            }
        }

        self.stats.last_tick_duration = start.elapsed();
        Ok(applied)
    }

    fn start_link<H: Hierarchy + ?Sized>(
        &mut self,
        channels: ReplicaChannels,
        target: &mut H,
        now: StateTime,
    ) -> BoneSyncResult<()> {
        match ObserverLink::start(
            channels,
            target,
            self.root,
            self.config.include_root,
            self.config.interpolation,
            now,
        ) {
            Ok(link) => {
                self.stats.snapshots_assembled += link.assembled();
                self.link = Some(link);
                Ok(())
            }
            Err(err) => {
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    fn ingest(&mut self) {
        while let Some(data) = self.incoming.pop_front() {
            let frame = match PoseFrame::decode(&data) {
                Ok(frame) => frame,
                Err(err) => {
                    self.stats.frames_rejected += 1;
                    warn!(node = %self.id, error = %err, "undecodable frame rejected");
                    continue;
                }
            };
            self.stats.frames_in += 1;

            if let Some(last) = self.last_sequence {
                let ahead = frame.sequence.wrapping_sub(last);
                // Duplicates and frames older than the newest applied one
                if ahead == 0 || ahead > u32::MAX / 2 {
                    self.stats.frames_stale += 1;
                    debug!(node = %self.id, sequence = frame.sequence, "stale frame skipped");
                    continue;
                }
                if ahead > 1 {
                    self.stats.frames_lost += u64::from(ahead - 1);
                    debug!(node = %self.id, gap = ahead - 1, sequence = frame.sequence, "frames lost");
                }
            }
            self.last_sequence = Some(frame.sequence);

            if self.failure.is_some() {
                continue;
            }
            if frame.flags.is_full_sync() {
                self.synced = true;
            }
            for message in frame.messages {
                if message.is_field_write() {
                    self.stats.field_writes_in += 1;
                }
                let applied = match (self.link.as_mut(), self.pending.as_mut()) {
                    (Some(link), _) => link.receive(message),
                    (None, Some(channels)) => channels.apply(message).map(|_| ()),
                    (None, None) => Ok(()),
                };
                if let Err(err) = applied {
                    self.stats.dropped_writes += 1;
                    warn!(node = %self.id, error = %err, "channel write dropped");
                }
            }
        }
    }

    pub fn teardown(self) {
        info!(
            node = %self.id,
            frames_in = self.stats.frames_in,
            dropped_writes = self.stats.dropped_writes,
            "observer torn down"
        );
        if let Some(link) = self.link {
            link.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonesync_core::{BoneTransform, Quat, Vec3};
    use bonesync_pose::Skeleton;
    use bonesync_state::ListWrite;
    use bonesync_time::ManualClock;
    use bonesync_wire::PoseMessage;

    fn pair(
        source_bones: usize,
        target_bones: usize,
    ) -> (
        ManualClock,
        Skeleton,
        Skeleton,
        AuthorityNode<ManualClock>,
        ObserverNode<ManualClock>,
    ) {
        let clock = ManualClock::new();
        let mut source = Skeleton::chain(source_bones);
        let target = Skeleton::chain(target_bones);
        let mut authority = AuthorityNode::new(
            NodeId::new(1),
            NodeConfig::authority(),
            &source,
            source.root(),
            clock.clone(),
        )
        .unwrap();
        authority.activate(&mut source).unwrap();
        let observer = ObserverNode::new(
            NodeId::new(2),
            NodeConfig::observer(),
            target.root(),
            clock.clone(),
        )
        .unwrap();
        (clock, source, target, authority, observer)
    }

    fn deliver(authority: &mut AuthorityNode<ManualClock>, observer: &mut ObserverNode<ManualClock>) {
        while let Some(frame) = authority.pop_outgoing() {
            observer.queue_incoming(frame);
        }
    }

    #[test]
    fn test_role_is_checked() {
        let clock = ManualClock::new();
        let err = ObserverNode::new(NodeId::new(1), NodeConfig::authority(), BoneId(0), clock)
            .err()
            .unwrap();
        assert!(matches!(err, BoneSyncError::InvalidConfig(_)));
    }

    #[test]
    fn test_activation_queues_full_sync_frame() {
        let (_clock, _source, _target, mut authority, _observer) = pair(2, 2);

        assert_eq!(authority.outgoing_len(), 1);
        let frame = PoseFrame::decode(&authority.pop_outgoing().unwrap()).unwrap();
        assert!(frame.flags.is_full_sync());
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.field_write_count(), 3 + 3 * 3);
        assert_eq!(authority.stats().field_writes_out, 12);
    }

    #[test]
    fn test_idle_authority_sends_nothing() {
        let (clock, source, _target, mut authority, _observer) = pair(2, 2);
        authority.pop_outgoing();

        for _ in 0..10 {
            clock.advance(Duration::from_millis(100));
            let published = authority.tick(&source).unwrap().unwrap();
            assert_eq!(published.field_writes, 0);
        }
        assert_eq!(authority.outgoing_len(), 0);
        assert_eq!(authority.stats().frames_out, 1);
    }

    #[test]
    fn test_observer_follows_authority() {
        let (clock, mut source, mut target, mut authority, mut observer) = pair(3, 3);
        deliver(&mut authority, &mut observer);

        // First tick starts the link and renders the baseline
        assert!(observer.tick(&mut target).unwrap());
        assert!(observer.is_linked());

        let bone = source.find("bone2").unwrap();
        let pose = BoneTransform::new(
            Vec3::new(0.1, 0.2, 0.3),
            Quat::from_euler(0.0, 0.0, 0.7),
            Vec3::splat(0.5),
        );
        source.set_local_transform(bone, pose).unwrap();

        for _ in 0..5 {
            clock.advance(Duration::from_millis(100));
            authority.tick(&source).unwrap();
            deliver(&mut authority, &mut observer);
            observer.tick(&mut target).unwrap();
        }

        let target_bone = target.find("bone2").unwrap();
        assert_eq!(target.local_transform(target_bone).unwrap(), pose);
        assert_eq!(observer.stats().frames_lost, 0);
        assert_eq!(observer.stats().snapshots_assembled, 2);
    }

    #[test]
    fn test_mismatch_reported_once() {
        let (clock, _source, mut target, mut authority, mut observer) = pair(2, 4);
        deliver(&mut authority, &mut observer);

        let err = observer.tick(&mut target).unwrap_err();
        assert!(matches!(err, BoneSyncError::BoneCountMismatch { .. }));
        assert_eq!(observer.failure(), Some(&err));

        for _ in 0..3 {
            clock.advance(Duration::from_millis(100));
            assert!(!observer.tick(&mut target).unwrap());
        }
    }

    #[test]
    fn test_observer_waits_for_full_sync() {
        let (_clock, _source, mut target, mut authority, mut observer) = pair(1, 1);
        authority.pop_outgoing();

        let mut frame = PoseFrame::new(1, StateTime::ZERO);
        frame
            .messages
            .push(PoseMessage::Position(ListWrite::Set {
                index: 0,
                value: Vec3::ONE,
            }));
        observer.queue_incoming(frame.encode().unwrap());

        assert!(!observer.tick(&mut target).unwrap());
        assert!(!observer.is_linked());
        assert_eq!(observer.stats().dropped_writes, 1);
    }

    #[test]
    fn test_duplicate_frame_is_skipped() {
        let (_clock, _source, mut target, mut authority, mut observer) = pair(1, 1);
        let full_sync = authority.pop_outgoing().unwrap();
        observer.queue_incoming(full_sync.clone());
        observer.queue_incoming(full_sync);

        assert!(observer.tick(&mut target).unwrap());
        assert_eq!(observer.stats().frames_stale, 1);
        assert_eq!(observer.link().unwrap().channels().bone_count(), 2);
    }

    #[test]
    fn test_stray_clear_after_link_is_dropped() {
        let (clock, _source, mut target, mut authority, mut observer) = pair(2, 2);
        deliver(&mut authority, &mut observer);
        assert!(observer.tick(&mut target).unwrap());

        let mut frame = PoseFrame::new(1, StateTime::ZERO);
        frame.messages.push(PoseMessage::Position(ListWrite::Clear));
        observer.queue_incoming(frame.encode().unwrap());

        clock.advance(Duration::from_millis(100));
        assert!(observer.tick(&mut target).unwrap());
        assert_eq!(observer.stats().dropped_writes, 1);
        assert_eq!(observer.link().unwrap().channels().bone_count(), 3);
    }

    #[test]
    fn test_invalid_settings_frame_is_dropped() {
        let (clock, _source, mut target, mut authority, mut observer) = pair(1, 1);
        deliver(&mut authority, &mut observer);
        observer.tick(&mut target).unwrap();

        let mut frame = PoseFrame::new(1, StateTime::ZERO);
        frame.messages.push(PoseMessage::Settings(LinkSettings::new(
            Duration::ZERO,
            f64::NAN,
        )));
        observer.queue_incoming(frame.encode().unwrap());

        clock.advance(Duration::from_millis(100));
        observer.tick(&mut target).unwrap();
        assert_eq!(observer.stats().dropped_writes, 1);
        assert_eq!(observer.link().unwrap().settings(), LinkSettings::default());
    }

    #[test]
    fn test_garbage_frame_is_rejected() {
        let (_clock, _source, mut target, _authority, mut observer) = pair(1, 1);
        observer.queue_incoming(Bytes::from_static(&[0xFF, 0x00, 0x01]));

        assert!(!observer.tick(&mut target).unwrap());
        assert_eq!(observer.stats().frames_rejected, 1);
        assert_eq!(observer.stats().frames_in, 0);
    }
}
