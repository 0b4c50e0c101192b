use super::builtin::{
    BUSY_HOLD_MILLIS, BUSY_PROBABILITY, COLLISION_HOLD_MILLIS, COLLISION_PROBABILITY, JAM_DURATION,
    MAX_BACKOFF_EXPONENT, SLOT_TIME,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    fmt,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};
use tokio::{sync::mpsc::UnboundedSender, time};

/// The process-wide random engine. Seeded once at startup and never reseeded;
/// every consumer of randomness draws from this one stream, so the medium
/// emulation and the corruption injector share a single engine.
pub type SharedRng = Arc<Mutex<SmallRng>>;

pub fn shared_rng() -> SharedRng {
    Arc::new(Mutex::new(SmallRng::from_entropy()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Busy,
    Collision,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Idle => write!(f, "Idle"),
            ChannelState::Busy => write!(f, "Busy"),
            ChannelState::Collision => write!(f, "Collision"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatistics {
    pub collisions: usize,
    pub busy: usize,
    pub total_attempts: usize,
}

impl fmt::Display for ChannelStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collisions: {} | Busy: {} | Total Attempts: {}",
            self.collisions, self.busy, self.total_attempts
        )
    }
}

/// Medium-access notifications, emitted at the transition that raised them.
/// Dispatch happens after the state lock is released, so a receiver is free
/// to call back into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsmaEvent {
    StateChanged(ChannelState),
    Collision,
    ChannelBusy,
}

struct CsmaCdInner {
    state: ChannelState,
    collision_count: usize,
    busy_count: usize,
    total_attempts: usize,
    backoff_attempts: usize,
    jam_active: bool,
    emulation_enabled: bool,
    busy_probability: f64,
    collision_probability: f64,
    events: Option<UnboundedSender<CsmaEvent>>,
}

/// The CSMA/CD channel controller. Cheap to clone; all clones share the same
/// channel state behind one readers-writer lock. Operations that schedule an
/// automatic return to idle must run inside a tokio runtime.
#[derive(Clone)]
pub struct CsmaCd {
    inner: Arc<RwLock<CsmaCdInner>>,
    rng: SharedRng,
}

impl CsmaCd {
    pub fn new(rng: SharedRng) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CsmaCdInner {
                state: ChannelState::Idle,
                collision_count: 0,
                busy_count: 0,
                total_attempts: 0,
                backoff_attempts: 0,
                jam_active: false,
                emulation_enabled: true,
                busy_probability: BUSY_PROBABILITY,
                collision_probability: COLLISION_PROBABILITY,
                events: None,
            })),
            rng,
        }
    }

    pub fn set_emulation_enabled(&self, enabled: bool) {
        self.inner.write().unwrap().emulation_enabled = enabled;
    }

    pub fn set_probabilities(&self, busy: f64, collision: f64) {
        let mut guard = self.inner.write().unwrap();
        guard.busy_probability = busy;
        guard.collision_probability = collision;
    }

    pub fn set_event_sender(&self, sender: UnboundedSender<CsmaEvent>) {
        self.inner.write().unwrap().events = Some(sender);
    }

    pub fn state(&self) -> ChannelState {
        self.inner.read().unwrap().state
    }

    pub fn statistics(&self) -> ChannelStatistics {
        let guard = self.inner.read().unwrap();
        ChannelStatistics {
            collisions: guard.collision_count,
            busy: guard.busy_count,
            total_attempts: guard.total_attempts,
        }
    }

    pub fn is_jam_active(&self) -> bool {
        self.inner.read().unwrap().jam_active
    }

    /// Carrier sense. Returns `true` when the channel is clear to transmit.
    /// Under emulation the channel spontaneously turns busy with the
    /// configured probability and clears itself after a random hold.
    pub fn listen(&self) -> bool {
        let mut guard = self.inner.write().unwrap();
        guard.total_attempts += 1;

        if guard.state == ChannelState::Busy {
            guard.busy_count += 1;
            let events = guard.events.clone();
            drop(guard);
            emit(&events, CsmaEvent::ChannelBusy);
            return false;
        }

        // Lock order is channel state before the shared engine.
        let emulated_busy =
            guard.emulation_enabled && self.rng.lock().unwrap().gen_bool(guard.busy_probability);
        if emulated_busy {
            guard.state = ChannelState::Busy;
            guard.busy_count += 1;
            let hold = Duration::from_millis(self.rng.lock().unwrap().gen_range(BUSY_HOLD_MILLIS));
            let events = guard.events.clone();
            drop(guard);
            emit(&events, CsmaEvent::StateChanged(ChannelState::Busy));
            emit(&events, CsmaEvent::ChannelBusy);
            self.idle_after(hold);
            return false;
        }

        true
    }

    /// Test-and-set claim of the idle channel.
    pub fn start_transmission(&self) -> bool {
        let mut guard = self.inner.write().unwrap();
        if guard.state != ChannelState::Idle {
            return false;
        }
        guard.state = ChannelState::Busy;
        let events = guard.events.clone();
        drop(guard);
        emit(&events, CsmaEvent::StateChanged(ChannelState::Busy));
        true
    }

    /// Emulated collision detection during an ongoing transmission. A
    /// detected collision bumps the backoff ladder and clears itself after a
    /// short random hold.
    pub fn detect_collision(&self) -> bool {
        let mut guard = self.inner.write().unwrap();
        let emulated_collision = guard.emulation_enabled
            && self
                .rng
                .lock()
                .unwrap()
                .gen_bool(guard.collision_probability);
        if emulated_collision {
            guard.state = ChannelState::Collision;
            guard.collision_count += 1;
            guard.backoff_attempts += 1;
            let hold =
                Duration::from_millis(self.rng.lock().unwrap().gen_range(COLLISION_HOLD_MILLIS));
            let events = guard.events.clone();
            drop(guard);
            emit(&events, CsmaEvent::StateChanged(ChannelState::Collision));
            emit(&events, CsmaEvent::Collision);
            self.idle_after(hold);
            return true;
        }
        false
    }

    pub fn end_transmission(&self) {
        let mut guard = self.inner.write().unwrap();
        guard.state = ChannelState::Idle;
        let events = guard.events.clone();
        drop(guard);
        emit(&events, CsmaEvent::StateChanged(ChannelState::Idle));
    }

    /// Raises the jam flag; it clears itself after roughly the jam time.
    pub fn send_jam(&self) {
        let mut guard = self.inner.write().unwrap();
        guard.jam_active = true;
        drop(guard);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            time::sleep(JAM_DURATION).await;
            inner.write().unwrap().jam_active = false;
        });
    }

    /// Binary exponential backoff: a random number of slot times in
    /// `[0, 2ᵏ − 1]` where `k` is the capped collision run length.
    pub fn backoff_delay(&self) -> Duration {
        let exponent = self
            .inner
            .read()
            .unwrap()
            .backoff_attempts
            .min(MAX_BACKOFF_EXPONENT);
        let window = (1usize << exponent) - 1;
        let slots = self.rng.lock().unwrap().gen_range(0..=window);
        SLOT_TIME * slots as u32
    }

    pub fn reset_backoff(&self) {
        self.inner.write().unwrap().backoff_attempts = 0;
    }

    fn idle_after(&self, hold: Duration) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            time::sleep(hold).await;
            let mut guard = inner.write().unwrap();
            guard.state = ChannelState::Idle;
            let events = guard.events.clone();
            drop(guard);
            emit(&events, CsmaEvent::StateChanged(ChannelState::Idle));
        });
    }
}

fn emit(events: &Option<UnboundedSender<CsmaEvent>>, event: CsmaEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}
