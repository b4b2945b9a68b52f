pub mod materialize_recurring_booking;
