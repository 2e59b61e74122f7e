//! Weekly relay schedule.
//!
//! Entries fire on a minute edge: each wall-clock minute is evaluated at
//! most once, the first tick that observes it.  There is no catch-up — a
//! minute that passes while the device is off or the wall clock is unset
//! is simply gone.  Entries command channels through [`ChannelBank::set`],
//! so the lights minimum-on policy applies to scheduled writes too.
//!
//! The day mask is one bit per weekday, Sunday = bit 0.  An entry with an
//! empty mask never fires but is kept; disabling an entry is the supported
//! way to park it.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{ClockPort, EventSink, RelayPort, StoragePort};
use crate::channels::ChannelBank;
use crate::config::CHANNEL_COUNT;

const NVS_NAMESPACE: &str = "scheduler";
const NVS_KEY: &str = "entries";

const DAY_MASK_ALL: u8 = 0x7F;

/// One weekly schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// 1-based relay channel number.
    pub channel: u8,
    pub hour: u8,
    pub minute: u8,
    /// Commanded state when the entry fires.
    pub on: bool,
    pub enabled: bool,
    /// Weekday bitmask, Sunday = bit 0.
    pub days: u8,
}

impl ScheduleEntry {
    fn valid(&self) -> bool {
        (1..=CHANNEL_COUNT as u8).contains(&self.channel)
            && self.hour <= 23
            && self.minute <= 59
    }

    fn matches(&self, weekday: u8, hour: u8, minute: u8) -> bool {
        self.enabled
            && self.hour == hour
            && self.minute == minute
            && self.days & (1 << weekday) != 0
    }
}

pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    /// Minute-of-hour last evaluated; gates each minute to one pass.
    last_checked_minute: Option<u8>,
}

impl Scheduler {
    /// Load the persisted entry list (empty on first boot).
    pub fn new(storage: &impl StoragePort) -> Self {
        let mut buf = [0u8; 2048];
        let entries = storage
            .read(NVS_NAMESPACE, NVS_KEY, &mut buf)
            .ok()
            .and_then(|len| postcard::from_bytes::<Vec<ScheduleEntry>>(&buf[..len]).ok())
            .unwrap_or_default();
        Self {
            entries,
            last_checked_minute: None,
        }
    }

    /// One control cycle.  No-op until the wall clock is available.
    pub fn tick(
        &mut self,
        clock: &impl ClockPort,
        channels: &mut ChannelBank,
        relays: &mut impl RelayPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let Some(wc) = clock.wall_clock() else {
            return;
        };
        if self.last_checked_minute == Some(wc.minute) {
            return;
        }
        self.last_checked_minute = Some(wc.minute);

        for i in 0..self.entries.len() {
            let entry = self.entries[i];
            if entry.matches(wc.weekday, wc.hour, wc.minute) {
                info!(
                    "Schedule entry {} fired: CH{} {}",
                    i,
                    entry.channel,
                    if entry.on { "on" } else { "off" }
                );
                channels.set(entry.channel, entry.on, clock, relays, storage, sink);
                sink.emit(&AppEvent::ScheduleFired {
                    index: i,
                    ch: entry.channel,
                    on: entry.on,
                });
            }
        }
    }

    // ── Entry management ──────────────────────────────────────

    /// Append an entry.  Invalid channel or time rejected with `false`.
    pub fn add(&mut self, mut entry: ScheduleEntry, storage: &mut impl StoragePort) -> bool {
        if !entry.valid() {
            return false;
        }
        entry.days &= DAY_MASK_ALL;
        self.entries.push(entry);
        self.save(storage);
        true
    }

    /// Replace the entry at `index`.
    pub fn edit(
        &mut self,
        index: usize,
        mut entry: ScheduleEntry,
        storage: &mut impl StoragePort,
    ) -> bool {
        if index >= self.entries.len() || !entry.valid() {
            return false;
        }
        entry.days &= DAY_MASK_ALL;
        self.entries[index] = entry;
        self.save(storage);
        true
    }

    /// Remove the entry at `index`; later entries shift down.
    pub fn remove(&mut self, index: usize, storage: &mut impl StoragePort) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        self.entries.remove(index);
        self.save(storage);
        true
    }

    /// Enable or disable the entry at `index` in place.
    pub fn set_enabled(
        &mut self,
        index: usize,
        enabled: bool,
        storage: &mut impl StoragePort,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        entry.enabled = enabled;
        self.save(storage);
        true
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    fn save(&self, storage: &mut impl StoragePort) {
        match postcard::to_allocvec(&self.entries) {
            Ok(bytes) => {
                if let Err(e) = storage.write(NVS_NAMESPACE, NVS_KEY, &bytes) {
                    warn!("Schedule persist failed: {}", e);
                }
            }
            Err(_) => warn!("Schedule encode failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::testutil::{MemoryStorage, NullSink, RelaySpy, SimClock, SinkSpy, wall};

    fn entry(channel: u8, hour: u8, minute: u8, on: bool, days: u8) -> ScheduleEntry {
        ScheduleEntry {
            channel,
            hour,
            minute,
            on,
            enabled: true,
            days,
        }
    }

    struct Rig {
        sched: Scheduler,
        channels: ChannelBank,
        clock: SimClock,
        relays: RelaySpy,
        storage: MemoryStorage,
    }

    fn rig() -> Rig {
        let storage = MemoryStorage::new();
        Rig {
            sched: Scheduler::new(&storage),
            channels: ChannelBank::new(&SystemConfig::default()),
            clock: SimClock::new(),
            relays: RelaySpy::new(),
            storage,
        }
    }

    fn tick(r: &mut Rig) {
        let mut sink = NullSink;
        r.sched.tick(
            &r.clock,
            &mut r.channels,
            &mut r.relays,
            &mut r.storage,
            &mut sink,
        );
    }

    #[test]
    fn fires_at_most_once_per_minute() {
        let mut r = rig();
        r.sched.add(entry(4, 7, 30, true, DAY_MASK_ALL), &mut r.storage);
        r.clock.set_wall(wall(2025, 100, 3, 7, 30));

        let mut sink = SinkSpy::new();
        for _ in 0..100 {
            r.clock.advance_ms(10);
            r.sched.tick(
                &r.clock,
                &mut r.channels,
                &mut r.relays,
                &mut r.storage,
                &mut sink,
            );
        }
        let fired = sink
            .events
            .iter()
            .filter(|e| matches!(e, AppEvent::ScheduleFired { .. }))
            .count();
        assert_eq!(fired, 1);
        assert!(r.channels.get(4));
    }

    #[test]
    fn day_mask_excludes_other_weekdays() {
        let mut r = rig();
        // Monday-only entry (bit 1).
        r.sched.add(entry(4, 7, 30, true, 1 << 1), &mut r.storage);

        // Sunday 07:30: nothing.
        r.clock.set_wall(wall(2025, 100, 0, 7, 30));
        tick(&mut r);
        assert!(!r.channels.get(4));

        // Monday 07:30: fires.  New minute observation required first.
        r.clock.set_wall(wall(2025, 101, 1, 7, 29));
        tick(&mut r);
        r.clock.set_wall(wall(2025, 101, 1, 7, 30));
        tick(&mut r);
        assert!(r.channels.get(4));
    }

    #[test]
    fn disabled_entry_never_fires() {
        let mut r = rig();
        r.sched.add(entry(4, 7, 30, true, DAY_MASK_ALL), &mut r.storage);
        r.sched.set_enabled(0, false, &mut r.storage);

        r.clock.set_wall(wall(2025, 100, 3, 7, 30));
        tick(&mut r);
        assert!(!r.channels.get(4));
    }

    #[test]
    fn no_wall_clock_no_fire() {
        let mut r = rig();
        r.sched.add(entry(4, 7, 30, true, DAY_MASK_ALL), &mut r.storage);
        tick(&mut r);
        assert!(!r.channels.get(4));

        // Clock arrives mid-minute: fires on the first observation.
        r.clock.set_wall(wall(2025, 100, 3, 7, 30));
        tick(&mut r);
        assert!(r.channels.get(4));
    }

    #[test]
    fn add_validates_channel_and_time() {
        let mut r = rig();
        assert!(!r.sched.add(entry(0, 7, 30, true, DAY_MASK_ALL), &mut r.storage));
        assert!(!r.sched.add(entry(7, 7, 30, true, DAY_MASK_ALL), &mut r.storage));
        assert!(!r.sched.add(entry(4, 24, 0, true, DAY_MASK_ALL), &mut r.storage));
        assert!(!r.sched.add(entry(4, 0, 60, true, DAY_MASK_ALL), &mut r.storage));
        assert!(r.sched.entries().is_empty());
        assert!(r.sched.add(entry(4, 23, 59, true, DAY_MASK_ALL), &mut r.storage));
    }

    #[test]
    fn edit_and_remove_shift_correctly() {
        let mut r = rig();
        r.sched.add(entry(1, 6, 0, true, DAY_MASK_ALL), &mut r.storage);
        r.sched.add(entry(2, 7, 0, true, DAY_MASK_ALL), &mut r.storage);
        r.sched.add(entry(3, 8, 0, true, DAY_MASK_ALL), &mut r.storage);

        assert!(!r.sched.edit(3, entry(4, 9, 0, true, 1), &mut r.storage));
        assert!(r.sched.edit(1, entry(4, 9, 0, true, 1), &mut r.storage));
        assert_eq!(r.sched.entries()[1].channel, 4);

        assert!(r.sched.remove(0, &mut r.storage));
        assert_eq!(r.sched.entries().len(), 2);
        assert_eq!(r.sched.entries()[0].channel, 4);
        assert!(!r.sched.remove(2, &mut r.storage));
    }

    #[test]
    fn day_mask_high_bit_stripped() {
        let mut r = rig();
        assert!(r.sched.add(entry(4, 7, 30, true, 0xFF), &mut r.storage));
        assert_eq!(r.sched.entries()[0].days, DAY_MASK_ALL);
    }

    #[test]
    fn entries_survive_reload() {
        let mut r = rig();
        r.sched.add(entry(4, 7, 30, true, 0b0101010), &mut r.storage);
        r.sched.add(entry(2, 20, 0, false, DAY_MASK_ALL), &mut r.storage);

        let reloaded = Scheduler::new(&r.storage);
        assert_eq!(reloaded.entries(), r.sched.entries());
    }
}
