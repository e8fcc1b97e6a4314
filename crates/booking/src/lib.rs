//! Booking and payment aggregates for the checkout saga.
//!
//! This crate provides:
//! - `Booking` / `Payment` with their status state machines
//! - Repository traits the saga consumes, including the transactional
//!   `CheckoutStore` that writes state changes and outbox events together
//! - `InventoryRestorer` for releasing reserved room nights
//! - In-memory and PostgreSQL implementations

pub mod booking;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod payment;
pub mod postgres;
pub mod repository;

pub use booking::{Booking, BookingStatus};
pub use error::{Result, StoreError};
pub use inventory::{InMemoryInventory, InventoryRestorer};
pub use memory::InMemoryStore;
pub use payment::{Payment, PaymentStatus, PaymentUpdate, checkout_idempotency_key};
pub use postgres::PostgresStore;
pub use repository::{BookingRepository, CheckoutStore, PaymentRepository};
