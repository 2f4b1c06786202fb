pub mod bookings;
pub mod movies;
pub mod reservations;
pub mod showtimes;
pub mod studios;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(studios::routes())
        .merge(movies::routes())
        .merge(showtimes::routes())
        .merge(reservations::routes())
        .merge(bookings::routes())
        .merge(users::routes())
}
