use axum::{
    routing::{get, patch, post},
    Router,
};
use registry::AppRegistry;

use crate::handler::booking::{confirm_booking, initiate_booking, show_paid_bookings};

pub fn build_booking_routers() -> Router<AppRegistry> {
    let bookings_routers = Router::new()
        .route("/checkout", post(initiate_booking))
        .route("/:payment_intent_id", patch(confirm_booking))
        .route("/rooms/:room_id", get(show_paid_bookings));

    Router::new().nest("/bookings", bookings_routers)
}
