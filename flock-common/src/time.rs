//! Date and timestamp utilities

use chrono::{Local, NaiveDate, Utc};

/// Today's date in the server's local timezone
///
/// Record dates (birth, acquisition, image upload) are calendar dates
/// entered by the farmer, so they follow local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
