//! Chaos links for pose replication
//!
//! Simulates hostile network conditions on one authority -> observer link:
//! - Latency with jitter
//! - Random and burst loss
//! - Duplication
//!
//! Delivery stays in send order; per-channel write order is a transport
//! guarantee the pose channels rely on.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution type
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    /// No jitter
    None,
    /// Uniform distribution
    Uniform { min_ms: u32, max_ms: u32 },
    /// Normal distribution (mean, stddev)
    Normal { mean_ms: f64, stddev_ms: f64 },
}

impl JitterDistribution {
    /// Sample a jitter value
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(u64::from(*min_ms));
                }
                let dist = Uniform::new(*min_ms, *max_ms);
                Duration::from_millis(u64::from(dist.sample(rng)))
            }
            JitterDistribution::Normal { mean_ms, stddev_ms } => {
                // Box-Muller
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                let value = mean_ms + stddev_ms * z;
                Duration::from_millis(value.max(0.0) as u64)
            }
        }
    }
}

/// Link chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Base latency
    pub base_latency: Duration,
    /// Jitter distribution
    pub jitter: JitterDistribution,
    /// Frame loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    /// Burst loss probability
    pub burst_loss_prob: f64,
    /// Burst loss length range
    pub burst_length: (u32, u32),
    /// Duplicate probability
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(30),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 30,
            },
            loss_rate: 0.01,
            burst_loss_prob: 0.0,
            burst_length: (2, 4),
            duplicate_prob: 0.01,
        }
    }
}

impl ChaosConfig {
    /// Zero latency, nothing lost
    pub fn perfect() -> Self {
        ChaosConfig {
            base_latency: Duration::ZERO,
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            duplicate_prob: 0.0,
        }
    }

    /// Good network conditions
    pub fn good() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(20),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 10,
            },
            loss_rate: 0.001,
            burst_loss_prob: 0.0,
            burst_length: (1, 2),
            duplicate_prob: 0.001,
        }
    }

    /// Poor network conditions
    pub fn poor() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(80),
            jitter: JitterDistribution::Normal {
                mean_ms: 40.0,
                stddev_ms: 25.0,
            },
            loss_rate: 0.05,
            burst_loss_prob: 0.02,
            burst_length: (2, 5),
            duplicate_prob: 0.02,
        }
    }

    /// Hostile network conditions
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(150),
            jitter: JitterDistribution::Normal {
                mean_ms: 80.0,
                stddev_ms: 60.0,
            },
            loss_rate: 0.15,
            burst_loss_prob: 0.05,
            burst_length: (3, 8),
            duplicate_prob: 0.05,
        }
    }
}

/// Frame in flight
#[derive(Clone, Debug)]
pub struct ChaosFrame {
    /// Encoded frame
    pub data: Bytes,
    /// Scheduled delivery time (relative to start)
    pub delivery_time: Duration,
    /// Original send time
    pub send_time: Duration,
    /// Link-local sequence number
    pub seq: u64,
}

/// Link statistics
#[derive(Clone, Debug, Default)]
pub struct ChaosStats {
    pub frames_sent: u64,
    pub frames_delivered: u64,
    pub frames_lost: u64,
    pub frames_duplicated: u64,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.frames_lost as f64 / self.frames_sent as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.frames_delivered == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.frames_delivered as f64
        }
    }
}

/// One simulated authority -> observer link
pub struct ChaosNetwork {
    config: ChaosConfig,
    rng: StdRng,
    /// Frames in flight, ordered by delivery time
    in_flight: VecDeque<ChaosFrame>,
    /// Current time
    current_time: Duration,
    /// Delivery time of the newest frame in flight
    last_delivery: Duration,
    /// Burst loss counter
    burst_remaining: u32,
    /// Sequence counter
    next_seq: u64,
    /// Statistics
    stats: ChaosStats,
}

impl ChaosNetwork {
    /// Create a new chaos link with seed
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosNetwork {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            current_time: Duration::ZERO,
            last_delivery: Duration::ZERO,
            burst_remaining: 0,
            next_seq: 0,
            stats: ChaosStats::default(),
        }
    }

    /// Send a frame through the chaos link
    pub fn send(&mut self, data: Bytes) {
        self.stats.frames_sent += 1;
        if self.should_drop() {
            self.next_seq += 1;
            self.stats.frames_lost += 1;
            return;
        }
        self.enqueue(data.clone());

        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            self.enqueue(data);
            self.stats.frames_duplicated += 1;
        }
    }

    /// Send a frame that is never lost or duplicated; latency still applies
    pub fn send_reliable(&mut self, data: Bytes) {
        self.stats.frames_sent += 1;
        self.enqueue(data);
    }

    fn enqueue(&mut self, data: Bytes) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let jitter = self.config.jitter.sample(&mut self.rng);
        // Never overtake a frame already in flight
        let delivery_time = (self.current_time + self.config.base_latency + jitter)
            .max(self.last_delivery);
        self.last_delivery = delivery_time;

        self.in_flight.push_back(ChaosFrame {
            data,
            delivery_time,
            send_time: self.current_time,
            seq,
        });
    }

    /// Check if frame should be dropped
    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        if self.config.burst_loss_prob > 0.0 && self.rng.gen::<f64>() < self.config.burst_loss_prob
        {
            let (min, max) = self.config.burst_length;
            self.burst_remaining = self.rng.gen_range(min..=max.max(min));
            return true;
        }

        self.config.loss_rate > 0.0 && self.rng.gen::<f64>() < self.config.loss_rate
    }

    /// Advance time and receive delivered frames, in send order
    pub fn tick(&mut self, dt: Duration) -> Vec<Bytes> {
        self.current_time += dt;

        let mut delivered = Vec::new();
        while self
            .in_flight
            .front()
            .map_or(false, |frame| frame.delivery_time <= self.current_time)
        {
            let Some(frame) = self.in_flight.pop_front() else {
                break;
            };
            let latency = (frame.delivery_time - frame.send_time).as_millis() as u64;

            self.stats.frames_delivered += 1;
            self.stats.total_latency_ms += latency;
            self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency);

            delivered.push(frame.data);
        }

        delivered
    }

    /// Frames still in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Get current statistics
    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    /// Get current time
    pub fn current_time(&self) -> Duration {
        self.current_time
    }
}
