use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, CustomerInfo, PaymentStatus};

#[derive(Debug)]
pub enum BookingError {
    ItemNotFound,
    BookingNotFound,
    ItemUnavailable,
    InsufficientSpots { available: i64, requested: i64 },
    InvalidPartySize,
    NotOwner,
    AlreadyTerminal { status: BookingStatus },
    Database(anyhow::Error),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::ItemNotFound => write!(f, "item not found"),
            BookingError::BookingNotFound => write!(f, "booking not found"),
            BookingError::ItemUnavailable => write!(f, "item is not available for booking"),
            BookingError::InsufficientSpots {
                available,
                requested,
            } => write!(f, "only {available} spots available, requested {requested}"),
            BookingError::InvalidPartySize => write!(f, "number of people must be at least 1"),
            BookingError::NotOwner => write!(f, "access denied"),
            BookingError::AlreadyTerminal { status } => {
                write!(f, "cannot cancel booking with status: {}", status.as_str())
            }
            BookingError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl From<anyhow::Error> for BookingError {
    fn from(err: anyhow::Error) -> Self {
        BookingError::Database(err)
    }
}

pub struct NewBooking {
    pub item_id: String,
    pub booking_date: NaiveDate,
    pub number_of_people: i64,
    pub customer_info: CustomerInfo,
}

/// Create a booking against an item, reserving spots from its inventory.
///
/// The booking insert and the inventory write land in one transaction, so a
/// failure between them cannot leave spots reserved without a booking (or the
/// reverse).
pub fn create_booking(
    conn: &mut Connection,
    user_id: &str,
    req: &NewBooking,
) -> Result<Booking, BookingError> {
    if req.number_of_people < 1 {
        return Err(BookingError::InvalidPartySize);
    }

    let tx = conn
        .transaction()
        .map_err(|e| BookingError::Database(e.into()))?;

    let item = queries::get_item_by_id(&tx, &req.item_id)?.ok_or(BookingError::ItemNotFound)?;
    if !item.is_available {
        return Err(BookingError::ItemUnavailable);
    }
    if item.available_spots < req.number_of_people {
        return Err(BookingError::InsufficientSpots {
            available: item.available_spots,
            requested: req.number_of_people,
        });
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        item_id: item.id.clone(),
        booking_date: req.booking_date,
        number_of_people: req.number_of_people,
        total_price: item.price * req.number_of_people as f64,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        customer_info: req.customer_info.clone(),
        booking_reference: new_booking_reference(),
        created_at: now,
        updated_at: now,
    };

    queries::insert_booking(&tx, &booking)?;
    queries::set_item_spots(&tx, &item.id, item.available_spots - req.number_of_people)?;

    tx.commit().map_err(|e| BookingError::Database(e.into()))?;
    Ok(booking)
}

/// Cancel a booking on behalf of its owner and return its spots to the item.
pub fn cancel_booking(
    conn: &mut Connection,
    booking_id: &str,
    requesting_user_id: &str,
) -> Result<Booking, BookingError> {
    let tx = conn
        .transaction()
        .map_err(|e| BookingError::Database(e.into()))?;

    let mut booking =
        queries::get_booking_by_id(&tx, booking_id)?.ok_or(BookingError::BookingNotFound)?;

    if booking.user_id != requesting_user_id {
        return Err(BookingError::NotOwner);
    }
    if matches!(
        booking.status,
        BookingStatus::Completed | BookingStatus::Cancelled
    ) {
        return Err(BookingError::AlreadyTerminal {
            status: booking.status,
        });
    }

    booking.status = BookingStatus::Cancelled;
    booking.updated_at = Utc::now().naive_utc();
    queries::update_booking(&tx, &booking)?;
    restore_spots(&tx, &booking)?;

    tx.commit().map_err(|e| BookingError::Database(e.into()))?;
    Ok(booking)
}

/// Admin-side status/payment update. Setting status to cancelled restores
/// the item's spots the same way owner cancellation does. No other status
/// transition is validated.
pub fn update_booking_status(
    conn: &mut Connection,
    booking_id: &str,
    status: Option<BookingStatus>,
    payment_status: Option<PaymentStatus>,
) -> Result<Booking, BookingError> {
    let tx = conn
        .transaction()
        .map_err(|e| BookingError::Database(e.into()))?;

    let mut booking =
        queries::get_booking_by_id(&tx, booking_id)?.ok_or(BookingError::BookingNotFound)?;

    let cancelling = matches!(status, Some(BookingStatus::Cancelled));
    if let Some(status) = status {
        booking.status = status;
    }
    if let Some(payment_status) = payment_status {
        booking.payment_status = payment_status;
    }
    booking.updated_at = Utc::now().naive_utc();

    queries::update_booking(&tx, &booking)?;
    if cancelling {
        restore_spots(&tx, &booking)?;
    }

    tx.commit().map_err(|e| BookingError::Database(e.into()))?;
    Ok(booking)
}

// A restore always leaves at least one spot, so the derived availability
// flag comes back true. A booking whose item row has gone missing still
// cancels cleanly.
fn restore_spots(conn: &Connection, booking: &Booking) -> Result<(), BookingError> {
    if let Some(item) = queries::get_item_by_id(conn, &booking.item_id)? {
        queries::set_item_spots(
            conn,
            &item.id,
            item.available_spots + booking.number_of_people,
        )?;
    }
    Ok(())
}

fn new_booking_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "BK{}{}",
        Utc::now().timestamp_millis(),
        suffix[..5].to_uppercase()
    )
}
