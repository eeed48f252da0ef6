//! Actuator handles behind one capability interface.
//!
//! Each vendor's real device type is a different native handle; the
//! harness only ever needs speed command, health read-back, and close.
//! The simulated implementations stand in for hardware during bench
//! work and tests.

use tracing::debug;

/// Raw fault words read back from a device. Encoders and controllers
/// disagree on bit meanings, so these stay opaque here and are printed
/// in hex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthFlags {
    pub faults: u32,
    pub sticky: u32,
}

impl HealthFlags {
    pub fn is_clear(&self) -> bool {
        self.faults == 0 && self.sticky == 0
    }
}

/// The one capability surface the harness needs from any device handle.
pub trait Actuator {
    fn can_id(&self) -> u8;
    fn set_speed(&mut self, speed: f64);
    fn health_flags(&self) -> HealthFlags;
    fn close(&mut self);

    /// Absolute shaft position in rotations, for devices that measure
    /// one. Motor controllers return `None`.
    fn absolute_rotations(&self) -> Option<f64> {
        None
    }
}

/// Simulated REV NEO (brushless, SparkMax-style handle).
#[derive(Debug)]
pub struct SimNeo {
    can_id: u8,
    speed: f64,
    closed: bool,
}

impl SimNeo {
    pub fn new(can_id: u8) -> Self {
        Self {
            can_id,
            speed: 0.0,
            closed: false,
        }
    }
}

impl Actuator for SimNeo {
    fn can_id(&self) -> u8 {
        self.can_id
    }

    fn set_speed(&mut self, speed: f64) {
        if !self.closed {
            self.speed = speed;
        }
    }

    fn health_flags(&self) -> HealthFlags {
        HealthFlags::default()
    }

    fn close(&mut self) {
        self.speed = 0.0;
        self.closed = true;
        debug!(can_id = self.can_id, "closed NEO handle");
    }
}

/// Simulated CTRE Kraken (TalonFX-style handle).
#[derive(Debug)]
pub struct SimKraken {
    can_id: u8,
    speed: f64,
    closed: bool,
}

impl SimKraken {
    pub fn new(can_id: u8) -> Self {
        Self {
            can_id,
            speed: 0.0,
            closed: false,
        }
    }
}

impl Actuator for SimKraken {
    fn can_id(&self) -> u8 {
        self.can_id
    }

    fn set_speed(&mut self, speed: f64) {
        if !self.closed {
            self.speed = speed;
        }
    }

    fn health_flags(&self) -> HealthFlags {
        HealthFlags::default()
    }

    fn close(&mut self) {
        self.speed = 0.0;
        self.closed = true;
        debug!(can_id = self.can_id, "closed Kraken handle");
    }
}

/// Simulated CTRE CANCoder. Not a motor: speed commands are ignored and
/// it reports an absolute position.
#[derive(Debug)]
pub struct SimCanCoder {
    can_id: u8,
    rotations: f64,
    closed: bool,
}

impl SimCanCoder {
    pub fn new(can_id: u8) -> Self {
        // Deterministic but distinct per id, good enough for bench demos.
        let rotations = f64::from(can_id % 16) / 16.0;
        Self {
            can_id,
            rotations,
            closed: false,
        }
    }
}

impl Actuator for SimCanCoder {
    fn can_id(&self) -> u8 {
        self.can_id
    }

    fn set_speed(&mut self, _speed: f64) {}

    fn health_flags(&self) -> HealthFlags {
        HealthFlags::default()
    }

    fn close(&mut self) {
        self.closed = true;
        debug!(can_id = self.can_id, "closed CANCoder handle");
    }

    fn absolute_rotations(&self) -> Option<f64> {
        if self.closed {
            None
        } else {
            Some(self.rotations)
        }
    }
}

/// One class of devices: the declared id slots and whatever handles are
/// currently instantiated for them.
pub struct ActuatorPool {
    name: &'static str,
    ids: Vec<u8>,
    slots: Vec<Option<Box<dyn Actuator>>>,
    next: usize,
    make: Box<dyn Fn(u8) -> Box<dyn Actuator>>,
}

impl ActuatorPool {
    pub fn new(
        name: &'static str,
        ids: Vec<u8>,
        make: Box<dyn Fn(u8) -> Box<dyn Actuator>>,
    ) -> Self {
        let slots = ids.iter().map(|_| None).collect();
        Self {
            name,
            ids,
            slots,
            next: 0,
            make,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ids(&self) -> &[u8] {
        &self.ids
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Instantiate the next un-added slot; returns its CAN id, or `None`
    /// when the pool is exhausted.
    pub fn add_next(&mut self) -> Option<u8> {
        if self.next >= self.slots.len() {
            return None;
        }
        let index = self.next;
        if self.slots[index].is_none() {
            self.slots[index] = Some((self.make)(self.ids[index]));
        }
        self.next += 1;
        Some(self.ids[index])
    }

    /// Instantiate every remaining slot; returns how many were added.
    pub fn add_all(&mut self) -> usize {
        let mut added = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some((self.make)(self.ids[index]));
                added += 1;
            }
        }
        self.next = self.slots.len();
        added
    }

    pub fn set_all(&mut self, speed: f64) {
        for slot in self.slots.iter_mut().flatten() {
            slot.set_speed(speed);
        }
    }

    /// Stop and close every handle, emptying the pool.
    pub fn close_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(actuator) = slot.as_mut() {
                actuator.set_speed(0.0);
                actuator.close();
            }
            *slot = None;
        }
        self.next = 0;
    }

    /// "index N CAN M ACTIVE / not added" lines for the state printout.
    pub fn state_lines(&self) -> Vec<String> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let id = self.ids[index];
                if slot.is_some() {
                    format!("  index {index} CAN {id} ACTIVE")
                } else {
                    format!("  index {index} CAN {id} not added")
                }
            })
            .collect()
    }

    /// Health lines: fault words in hex, absolute position when the
    /// device measures one.
    pub fn health_lines(&self) -> Vec<String> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let id = self.ids[index];
                match slot {
                    None => format!("  {} index {index} CAN {id} not added", self.name),
                    Some(actuator) => {
                        let flags = actuator.health_flags();
                        let mut line = format!(
                            "  {} index {index} CAN {id} faults=0x{:X} sticky=0x{:X}",
                            self.name, flags.faults, flags.sticky
                        );
                        if let Some(rotations) = actuator.absolute_rotations() {
                            line.push_str(&format!(
                                " absRot={rotations:.4} absDeg={:.1}",
                                rotations * 360.0
                            ));
                        }
                        line
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        can_id: u8,
        log: Rc<RefCell<Vec<(u8, f64)>>>,
        closed: Rc<RefCell<Vec<u8>>>,
    }

    impl Actuator for Recorder {
        fn can_id(&self) -> u8 {
            self.can_id
        }
        fn set_speed(&mut self, speed: f64) {
            self.log.borrow_mut().push((self.can_id, speed));
        }
        fn health_flags(&self) -> HealthFlags {
            HealthFlags {
                faults: 0x2,
                sticky: 0,
            }
        }
        fn close(&mut self) {
            self.closed.borrow_mut().push(self.can_id);
        }
    }

    fn recording_pool(
        ids: Vec<u8>,
    ) -> (
        ActuatorPool,
        Rc<RefCell<Vec<(u8, f64)>>>,
        Rc<RefCell<Vec<u8>>>,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let closed = Rc::new(RefCell::new(Vec::new()));
        let log_c = log.clone();
        let closed_c = closed.clone();
        let pool = ActuatorPool::new(
            "NEO",
            ids,
            Box::new(move |id| {
                Box::new(Recorder {
                    can_id: id,
                    log: log_c.clone(),
                    closed: closed_c.clone(),
                })
            }),
        );
        (pool, log, closed)
    }

    #[test]
    fn add_next_walks_slots_in_order_then_exhausts() {
        let (mut pool, _, _) = recording_pool(vec![25, 22, 10]);
        assert_eq!(pool.add_next(), Some(25));
        assert_eq!(pool.add_next(), Some(22));
        assert_eq!(pool.add_next(), Some(10));
        assert_eq!(pool.add_next(), None);
        assert_eq!(pool.active_count(), 3);
    }

    #[test]
    fn add_all_fills_remaining_slots_only() {
        let (mut pool, _, _) = recording_pool(vec![25, 22]);
        pool.add_next();
        assert_eq!(pool.add_all(), 1);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.add_next(), None);
    }

    #[test]
    fn set_all_commands_every_active_handle() {
        let (mut pool, log, _) = recording_pool(vec![25, 22]);
        pool.add_all();
        pool.set_all(0.5);
        assert_eq!(log.borrow().as_slice(), &[(25, 0.5), (22, 0.5)]);
    }

    #[test]
    fn close_all_stops_closes_and_empties() {
        let (mut pool, log, closed) = recording_pool(vec![25, 22]);
        pool.add_all();
        pool.close_all();
        // Stopped before closing.
        assert_eq!(log.borrow().as_slice(), &[(25, 0.0), (22, 0.0)]);
        assert_eq!(closed.borrow().as_slice(), &[25, 22]);
        assert_eq!(pool.active_count(), 0);
        // Pool is reusable from the start.
        assert_eq!(pool.add_next(), Some(25));
    }

    #[test]
    fn state_lines_mark_active_slots() {
        let (mut pool, _, _) = recording_pool(vec![25, 22]);
        pool.add_next();
        let lines = pool.state_lines();
        assert_eq!(lines[0], "  index 0 CAN 25 ACTIVE");
        assert_eq!(lines[1], "  index 1 CAN 22 not added");
    }

    #[test]
    fn cancoder_reports_position_motors_do_not() {
        let coder = SimCanCoder::new(12);
        assert_eq!(coder.absolute_rotations(), Some(0.75));
        let neo = SimNeo::new(10);
        assert_eq!(neo.absolute_rotations(), None);
    }

    #[test]
    fn health_lines_include_fault_words() {
        let (mut pool, _, _) = recording_pool(vec![25]);
        pool.add_all();
        assert_eq!(
            pool.health_lines()[0],
            "  NEO index 0 CAN 25 faults=0x2 sticky=0x0"
        );
    }
}
