//! Room inventory trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, RoomId, StayDates};

use crate::{Booking, Result, StoreError};

/// Re-opens room nights that a booking had taken.
#[async_trait]
pub trait InventoryRestorer: Send + Sync {
    /// Adds exactly one available unit to every night of `stay`.
    async fn restore(&self, room_id: RoomId, stay: StayDates) -> Result<()>;

    /// Restores the booking's nights at most once per booking.
    ///
    /// Returns false, and changes nothing, if they were already restored.
    /// Marking the booking and adding the units happen together, so a failed
    /// call can be repeated.
    async fn restore_booking(&self, booking: &Booking) -> Result<bool>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    available: HashMap<(RoomId, NaiveDate), u32>,
    restores: Vec<(RoomId, StayDates)>,
    released: HashSet<BookingId>,
    fail_on_restore: bool,
}

/// In-memory per-night room inventory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventory {
    /// Creates an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the available units for every night of `stay`.
    pub fn set_available(&self, room_id: RoomId, stay: StayDates, units: u32) {
        let mut state = self.write();
        for night in stay.each_night() {
            state.available.insert((room_id, night), units);
        }
    }

    /// Takes one unit from every night of `stay`, or nothing if any night
    /// is sold out.
    pub fn reserve(&self, room_id: RoomId, stay: StayDates) -> Result<()> {
        let mut state = self.write();
        if let Some(night) = stay
            .each_night()
            .find(|night| state.available.get(&(room_id, *night)).copied().unwrap_or(0) == 0)
        {
            return Err(StoreError::SoldOut {
                room_id: room_id.to_string(),
                night: night.to_string(),
            });
        }
        for night in stay.each_night() {
            if let Some(units) = state.available.get_mut(&(room_id, night)) {
                *units -= 1;
            }
        }
        Ok(())
    }

    /// Returns the available units for one night.
    pub fn available(&self, room_id: RoomId, night: NaiveDate) -> u32 {
        self.read()
            .available
            .get(&(room_id, night))
            .copied()
            .unwrap_or(0)
    }

    /// Returns every successful restore call, in order.
    pub fn restore_calls(&self) -> Vec<(RoomId, StayDates)> {
        self.read().restores.clone()
    }

    /// Configures the inventory to fail restore calls.
    pub fn set_fail_on_restore(&self, fail: bool) {
        self.write().fail_on_restore = fail;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryInventoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryInventoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InMemoryInventoryState {
    fn add_back(&mut self, room_id: RoomId, stay: StayDates) -> Result<()> {
        if self.fail_on_restore {
            return Err(StoreError::Unavailable(
                "inventory update rejected".to_string(),
            ));
        }

        for night in stay.each_night() {
            *self.available.entry((room_id, night)).or_insert(0) += 1;
        }
        self.restores.push((room_id, stay));
        Ok(())
    }
}

#[async_trait]
impl InventoryRestorer for InMemoryInventory {
    async fn restore(&self, room_id: RoomId, stay: StayDates) -> Result<()> {
        self.write().add_back(room_id, stay)
    }

    async fn restore_booking(&self, booking: &Booking) -> Result<bool> {
        let mut state = self.write();
        if state.released.contains(&booking.id) {
            return Ok(false);
        }
        state.add_back(booking.room_id, booking.stay)?;
        state.released.insert(booking.id);
        Ok(true)
    }
}
