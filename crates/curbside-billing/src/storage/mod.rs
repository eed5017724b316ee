pub mod locations;
pub mod payments;
pub mod postgres;

pub use locations::{InMemoryLocationRepository, LocationRepository, SqlLocationRepository};

pub use payments::{
    InMemoryPaymentRepository, PaymentMutation, PaymentRepository, SqlPaymentRepository,
    LOCATION_METADATA_KEY,
};

pub use postgres::Database;
