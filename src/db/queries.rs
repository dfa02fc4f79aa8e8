use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingDetail, BookingStatus, CustomerInfo, Item, ItemSummary, PaymentStatus, User,
    UserSummary,
};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

// ── Users ──

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.username,
            user.email,
            user.password_hash,
            user.is_admin as i32,
            user.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    get_user_where(conn, "id = ?1", id)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    get_user_where(conn, "email = ?1", email)
}

fn get_user_where(conn: &Connection, clause: &str, value: &str) -> anyhow::Result<Option<User>> {
    let sql = format!(
        "SELECT id, username, email, password_hash, is_admin, created_at FROM users WHERE {clause}"
    );
    let result = conn.query_row(&sql, params![value], |row| {
        let created_at_str: String = row.get(5)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            is_admin: row.get::<_, i32>(4)? != 0,
            created_at: parse_datetime(&created_at_str),
        })
    });

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Items ──

pub fn insert_item(conn: &Connection, item: &Item) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO items (id, name, description, destination, duration_days, price, category,
                            available_spots, is_available, image_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            item.id,
            item.name,
            item.description,
            item.destination,
            item.duration_days,
            item.price,
            item.category,
            item.available_spots,
            item.is_available as i32,
            item.image_url,
            item.created_at.format(DATETIME_FMT).to_string(),
            item.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_item_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Item>> {
    let result = conn.query_row(
        "SELECT id, name, description, destination, duration_days, price, category,
                available_spots, is_available, image_url, created_at, updated_at
         FROM items WHERE id = ?1",
        params![id],
        |row| {
            let created_at_str: String = row.get(10)?;
            let updated_at_str: String = row.get(11)?;
            Ok(Item {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                destination: row.get(3)?,
                duration_days: row.get(4)?,
                price: row.get(5)?,
                category: row.get(6)?,
                available_spots: row.get(7)?,
                is_available: row.get::<_, i32>(8)? != 0,
                image_url: row.get(9)?,
                created_at: parse_datetime(&created_at_str),
                updated_at: parse_datetime(&updated_at_str),
            })
        },
    );

    match result {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Single writer for item inventory. Availability is derived from the
/// remaining spot count here and nowhere else, so the stored flag cannot
/// drift between the create and cancel paths.
pub fn set_item_spots(conn: &Connection, id: &str, spots: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE items SET available_spots = ?1, is_available = ?2, updated_at = datetime('now')
         WHERE id = ?3",
        params![spots, (spots > 0) as i32, id],
    )?;
    Ok(())
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, item_id, booking_date, number_of_people, total_price,
                               status, payment_status, customer_full_name, customer_phone,
                               customer_email, special_requests, booking_reference, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.user_id,
            booking.item_id,
            booking.booking_date.format(DATE_FMT).to_string(),
            booking.number_of_people,
            booking.total_price,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.customer_info.full_name,
            booking.customer_info.phone,
            booking.customer_info.email,
            booking.customer_info.special_requests,
            booking.booking_reference,
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, payment_status = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.item_id, b.booking_date, b.number_of_people, \
     b.total_price, b.status, b.payment_status, b.customer_full_name, b.customer_phone, \
     b.customer_email, b.special_requests, b.booking_reference, b.created_at, b.updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(3)?;
    let status_str: String = row.get(6)?;
    let payment_status_str: String = row.get(7)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        booking_date: NaiveDate::parse_from_str(&booking_date_str, DATE_FMT)
            .unwrap_or_else(|_| Utc::now().date_naive()),
        number_of_people: row.get(4)?,
        total_price: row.get(5)?,
        status: BookingStatus::parse(&status_str).unwrap_or(BookingStatus::Pending),
        payment_status: PaymentStatus::parse(&payment_status_str).unwrap_or(PaymentStatus::Pending),
        customer_info: CustomerInfo {
            full_name: row.get(8)?,
            phone: row.get(9)?,
            email: row.get(10)?,
            special_requests: row.get(11)?,
        },
        booking_reference: row.get(12)?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Booking details (joined with user/item summaries) ──

pub fn get_booking_detail(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetail>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, u.username, u.email, i.name, i.destination, i.price
         FROM bookings b
         LEFT JOIN users u ON u.id = b.user_id
         LEFT JOIN items i ON i.id = b.item_id
         WHERE b.id = ?1"
    );
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_detail_row(row)));

    match result {
        Ok(detail) => Ok(Some(detail?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_booking_detail_row(row: &rusqlite::Row) -> anyhow::Result<BookingDetail> {
    let booking = parse_booking_row(row)?;

    let username: Option<String> = row.get(15)?;
    let email: Option<String> = row.get(16)?;
    let user = match (username, email) {
        (Some(username), Some(email)) => Some(UserSummary { username, email }),
        _ => None,
    };

    let name: Option<String> = row.get(17)?;
    let destination: Option<String> = row.get(18)?;
    let price: Option<f64> = row.get(19)?;
    let item = match (name, destination, price) {
        (Some(name), Some(destination), Some(price)) => Some(ItemSummary {
            name,
            destination,
            price,
        }),
        _ => None,
    };

    Ok(BookingDetail {
        booking,
        user,
        item,
    })
}

// ── Booking lists ──

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortField {
    CreatedAt,
    BookingDate,
    TotalPrice,
    NumberOfPeople,
}

impl SortField {
    /// API sort names. Callers fall back to `createdAt` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(SortField::CreatedAt),
            "bookingDate" => Some(SortField::BookingDate),
            "totalPrice" => Some(SortField::TotalPrice),
            "numberOfPeople" => Some(SortField::NumberOfPeople),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::BookingDate => "booking_date",
            SortField::TotalPrice => "total_price",
            SortField::NumberOfPeople => "number_of_people",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s == "asc" {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BookingSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for BookingSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

fn filter_clause(filter: &BookingFilter) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut clauses = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(user_id) = &filter.user_id {
        params_vec.push(Box::new(user_id.clone()));
        clauses.push(format!("b.user_id = ?{}", params_vec.len()));
    }
    if let Some(status) = &filter.status {
        params_vec.push(Box::new(status.as_str().to_string()));
        clauses.push(format!("b.status = ?{}", params_vec.len()));
    }
    if let Some(payment_status) = &filter.payment_status {
        params_vec.push(Box::new(payment_status.as_str().to_string()));
        clauses.push(format!("b.payment_status = ?{}", params_vec.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_sql, params_vec)
}

pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    sort: &BookingSort,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<BookingDetail>> {
    let (where_sql, mut params_vec) = filter_clause(filter);
    params_vec.push(Box::new(limit));
    let limit_idx = params_vec.len();
    params_vec.push(Box::new(offset));
    let offset_idx = params_vec.len();

    // Sort column comes from the allow-list above, never from the request.
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, u.username, u.email, i.name, i.destination, i.price
         FROM bookings b
         LEFT JOIN users u ON u.id = b.user_id
         LEFT JOIN items i ON i.id = b.item_id{where_sql}
         ORDER BY b.{} {} LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        sort.field.column(),
        sort.order.keyword(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(parse_booking_detail_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<i64> {
    let (where_sql, params_vec) = filter_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM bookings b{where_sql}");

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
    Ok(count)
}

// ── Booking stats ──

pub struct StatusBreakdown {
    pub status: BookingStatus,
    pub count: i64,
    pub total_revenue: f64,
}

pub struct BookingStats {
    pub by_status: Vec<StatusBreakdown>,
    pub total_bookings: i64,
    pub total_revenue: f64,
}

pub fn get_booking_stats(conn: &Connection) -> anyhow::Result<BookingStats> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*), COALESCE(SUM(total_price), 0)
         FROM bookings GROUP BY status ORDER BY status",
    )?;
    let rows = stmt.query_map([], |row| {
        let status_str: String = row.get(0)?;
        Ok(StatusBreakdown {
            status: BookingStatus::parse(&status_str).unwrap_or(BookingStatus::Pending),
            count: row.get(1)?,
            total_revenue: row.get(2)?,
        })
    })?;

    let mut by_status = vec![];
    for row in rows {
        by_status.push(row?);
    }

    let total_bookings: i64 = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;

    // Revenue counts only bookings that have actually been paid.
    let total_revenue: f64 = conn.query_row(
        "SELECT COALESCE(SUM(total_price), 0) FROM bookings WHERE payment_status = 'paid'",
        [],
        |row| row.get(0),
    )?;

    Ok(BookingStats {
        by_status,
        total_bookings,
        total_revenue,
    })
}
