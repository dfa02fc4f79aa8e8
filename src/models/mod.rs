pub mod booking;
pub mod item;
pub mod user;

pub use booking::{
    Booking, BookingDetail, BookingStatus, CustomerInfo, ItemSummary, PaymentStatus, UserSummary,
};
pub use item::Item;
pub use user::User;
