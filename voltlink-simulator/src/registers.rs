//! The shared holding-register bank.

use std::sync::{Mutex, MutexGuard};
use voltlink_common::registers::{HR_LEN, STATUS_RUNNING};

/// Register contents at startup: a 1.2 kW inverter at 230 V, 55 degrees,
/// 70% state of charge, setpoint equal to current power.
const INITIAL: [u16; HR_LEN as usize] = [
    1001,           // device_id
    STATUS_RUNNING, // status_bits
    1200,           // power_w
    2300,           // voltage_v x10
    500,            // current_a x100
    550,            // temp_c x10
    700,            // soc_pct x10
    1200,           // setpoint_w
    0, 0, 0, 0, 0, 0, 0, 0,
];

/// Mutex-guarded register array shared between the ticker and the
/// connection handlers.
///
/// Every `get`/`set` is a single lock acquisition for that one field; no
/// caller ever holds the lock across multiple fields. This bounds lock
/// hold time, at the cost of cross-field consistency: a reader assembling
/// a block may see `power_w` from one tick and `temp_c` from the next.
/// That relaxation is part of the observable contract - only per-field
/// atomicity is guaranteed.
#[derive(Debug)]
pub struct RegisterBank {
    regs: Mutex<[u16; HR_LEN as usize]>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self {
            regs: Mutex::new(INITIAL),
        }
    }

    /// Read one register. `None` if the address is out of range.
    pub fn get(&self, addr: u16) -> Option<u16> {
        if addr >= HR_LEN {
            return None;
        }
        Some(self.lock()[addr as usize])
    }

    /// Write one register. `false` if the address is out of range.
    pub fn set(&self, addr: u16, value: u16) -> bool {
        if addr >= HR_LEN {
            return false;
        }
        self.lock()[addr as usize] = value;
        true
    }

    fn lock(&self) -> MutexGuard<'_, [u16; HR_LEN as usize]> {
        // A poisoned lock still holds a usable register array.
        self.regs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}
