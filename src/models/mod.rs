pub mod user;
pub mod studio;
pub mod seat;
pub mod movie;
pub mod showtime;
pub mod booking;
pub mod booking_seat;

pub use user::{NewUser, User, UserRole};
pub use studio::{NewStudio, Studio};
pub use seat::{Seat, SeatAvailability, SeatMapEntry, SeatSpec};
pub use movie::{Movie, MovieInput, MovieStatus};
pub use showtime::{NewShowtime, Showtime, ShowtimeFilter};
pub use booking::{Booking, BookingFilter, BookingStatus, NewBooking};
pub use booking_seat::{BookingSeat, ExpiredHold, NewHold, SeatHoldState};
