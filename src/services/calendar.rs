use crate::models::Booking;

pub fn generate_ics(booking: &Booking, business_name: &str) -> String {
    let dtstart = booking.date.and_time(booking.start_time).format("%Y%m%dT%H%M%S");
    let dtend = booking.date.and_time(booking.end_time).format("%Y%m%dT%H%M%S");
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%SZ");
    let uid = format!("{}@slotbook", booking.id);
    let summary = format!("Cleaning appointment with {business_name}");
    let status = match booking.status.as_str() {
        "cancelled" => "CANCELLED",
        "pending" => "TENTATIVE",
        _ => "CONFIRMED",
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Slotbook//Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}
